//! Contract and address metadata ("semantics") consumed by every decoder.

use alloy_primitives::{b256, Address, B256};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash of empty bytecode, the code hash of every externally owned account.
pub const EMPTY_CODE_HASH: B256 = b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

/// One ABI parameter (function input/output or event field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    /// ABI type string as written in the ABI: `uint256`, `tuple[]`, `bytes32[2]`
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ParamDescriptor>,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub dynamic: bool,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::with_components(name, ty, Vec::new())
    }

    pub fn indexed(name: impl Into<String>, ty: impl Into<String>) -> Self {
        let mut p = Self::new(name, ty);
        p.indexed = true;
        p
    }

    pub fn with_components(
        name: impl Into<String>,
        ty: impl Into<String>,
        components: Vec<ParamDescriptor>,
    ) -> Self {
        let ty = ty.into();
        let dynamic = is_dynamic_type(&ty, &components);
        Self {
            name: name.into(),
            ty,
            components,
            indexed: false,
            dynamic,
        }
    }

    /// Type string with tuples expanded: `(address,uint256)[]`.
    pub fn canonical_type(&self) -> String {
        match self.ty.strip_prefix("tuple") {
            Some(suffix) => {
                let inner: Vec<String> = self.components.iter().map(|c| c.canonical_type()).collect();
                format!("({}){}", inner.join(","), suffix)
            }
            None => self.ty.clone(),
        }
    }
}

/// `string`, `bytes`, any `[]` suffix, a fixed array of a dynamic element,
/// or a tuple with a dynamic member.
fn is_dynamic_type(ty: &str, components: &[ParamDescriptor]) -> bool {
    if ty.ends_with("[]") {
        return true;
    }
    let base = ty.split('[').next().unwrap_or(ty);
    match base {
        "string" | "bytes" => true,
        "tuple" => components.iter().any(|c| c.dynamic),
        _ => false,
    }
}

/// Canonical `name(type,...)` signature from a name and its parameters.
pub fn signature_of(name: &str, params: &[ParamDescriptor]) -> String {
    let types: Vec<String> = params.iter().map(|p| p.canonical_type()).collect();
    format!("{name}({})", types.join(","))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// `0x` + 8 hex chars
    #[serde(default)]
    pub selector: String,
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<ParamDescriptor>,
    #[serde(default)]
    pub outputs: Vec<ParamDescriptor>,
}

impl FunctionSignature {
    pub fn signature(&self) -> String {
        signature_of(&self.name, &self.inputs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSignature {
    /// Topic-0 hash, `0x` + 64 hex chars
    #[serde(default)]
    pub signature: String,
    pub name: String,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub parameters: Vec<ParamDescriptor>,
}

impl EventSignature {
    pub fn canonical(&self) -> String {
        signature_of(&self.name, &self.parameters)
    }
}

/// Display hints for one parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<String>,
}

/// signature → parameter name → hint
pub type TransformationTable = IndexMap<String, IndexMap<String, Transformation>>;

/// ABI-level metadata shared by every address deploying the same bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub code_hash: B256,
    pub name: String,
    #[serde(default)]
    pub functions: IndexMap<String, FunctionSignature>,
    #[serde(default)]
    pub events: IndexMap<String, EventSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor: Option<FunctionSignature>,
    #[serde(default)]
    pub transformations: TransformationTable,
}

impl ContractMetadata {
    pub fn new(code_hash: B256, name: impl Into<String>) -> Self {
        Self {
            code_hash,
            name: name.into(),
            functions: IndexMap::new(),
            events: IndexMap::new(),
            constructor: None,
            transformations: IndexMap::new(),
        }
    }

    /// Sentinel record for externally owned accounts.
    pub fn eoa() -> Self {
        Self::new(EMPTY_CODE_HASH, "EOA")
    }

    pub fn anonymous_events(&self) -> impl Iterator<Item = &EventSignature> {
        self.events.values().filter(|e| e.anonymous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStandard {
    #[serde(rename = "ERC20")]
    Erc20,
    #[serde(rename = "ERC721")]
    Erc721,
}

impl fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenStandard::Erc20 => write!(f, "ERC20"),
            TokenStandard::Erc721 => write!(f, "ERC721"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Data {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Resolved token identity (own or adopted through a proxy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIdentity {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl From<Erc20Data> for TokenIdentity {
    fn from(d: Erc20Data) -> Self {
        Self {
            name: d.name,
            symbol: d.symbol,
            decimals: d.decimals,
        }
    }
}

/// Everything known about one address on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMetadata {
    pub chain_id: String,
    pub address: Address,
    pub name: String,
    pub is_contract: bool,
    pub contract: ContractMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<TokenStandard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erc20: Option<Erc20Data>,
}

impl AddressMetadata {
    pub fn eoa(chain_id: impl Into<String>, address: Address) -> Self {
        Self {
            chain_id: chain_id.into(),
            address,
            name: crate::address_hex(&address),
            is_contract: false,
            contract: ContractMetadata::eoa(),
            standard: None,
            erc20: None,
        }
    }

    /// A contract with nothing known beyond its code hash.
    pub fn unknown_contract(chain_id: impl Into<String>, address: Address, code_hash: B256) -> Self {
        let name = crate::address_hex(&address);
        Self {
            chain_id: chain_id.into(),
            address,
            contract: ContractMetadata::new(code_hash, name.clone()),
            name,
            is_contract: true,
            standard: None,
            erc20: None,
        }
    }

    pub fn token_identity(&self) -> Option<TokenIdentity> {
        self.erc20.clone().map(TokenIdentity::from)
    }

    /// Split into the persisted address row and its contract.
    pub fn to_stored(&self) -> StoredAddress {
        StoredAddress {
            chain_id: self.chain_id.clone(),
            address: self.address,
            name: self.name.clone(),
            is_contract: self.is_contract,
            code_hash: self.contract.code_hash,
            standard: self.standard,
            erc20: self.erc20.clone(),
        }
    }

    pub fn from_stored(stored: StoredAddress, contract: ContractMetadata) -> Self {
        Self {
            chain_id: stored.chain_id,
            address: stored.address,
            name: stored.name,
            is_contract: stored.is_contract,
            contract,
            standard: stored.standard,
            erc20: stored.erc20,
        }
    }
}

/// delegator → delegates, in pre-order discovery order
pub type DelegationMap = IndexMap<Address, IndexSet<Address>>;

/// delegator → token identity adopted from one of its delegates
pub type TokenProxyMap = IndexMap<Address, TokenIdentity>;

/// Persisted address row; references its contract by code hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAddress {
    pub chain_id: String,
    pub address: Address,
    pub name: String,
    pub is_contract: bool,
    pub code_hash: B256,
    #[serde(default)]
    pub standard: Option<TokenStandard>,
    #[serde(default)]
    pub erc20: Option<Erc20Data>,
}
