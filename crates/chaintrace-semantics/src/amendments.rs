//! Manual overrides applied on top of resolved contract metadata.
//!
//! Keyed by code hash, so a correction covers every deployment of the same
//! bytecode. Loaded from YAML (JSON is valid YAML):
//!
//! ```yaml
//! "0x5e4e...c3f8":
//!   name: FiatTokenV2_1
//!   functions:
//!     - name: transferWithAuthorization
//!       inputs: [{ name: from, type: address }, ...]
//!   transformations:
//!     "transfer(address,uint256)":
//!       value: { transformed_name: amount }
//! ```

use alloy_primitives::B256;
use chaintrace_abi::fingerprint::{event_topic, function_selector, selector_hex, topic_hex};
use chaintrace_core::semantics::{
    AddressMetadata, EventSignature, FunctionSignature, ParamDescriptor, TransformationTable,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmendmentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid code hash '{0}'")]
    InvalidCodeHash(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAmendment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Added or replaced, keyed by selector. An empty selector is derived from the signature.
    #[serde(default)]
    pub functions: Vec<FunctionSignature>,
    /// Added or replaced, keyed by topic. An empty signature is derived from the parameters.
    #[serde(default)]
    pub events: Vec<EventSignature>,
    #[serde(default)]
    pub transformations: TransformationTable,
}

impl ContractAmendment {
    fn apply_to(&self, meta: &mut AddressMetadata) {
        if let Some(name) = &self.name {
            meta.contract.name = name.clone();
            if meta.erc20.is_none() {
                meta.name = name.clone();
            }
        }
        for func in &self.functions {
            meta.contract.functions.insert(func.selector.clone(), func.clone());
        }
        for event in &self.events {
            meta.contract.events.insert(event.signature.clone(), event.clone());
        }
        for (signature, params) in &self.transformations {
            let entry = meta.contract.transformations.entry(signature.clone()).or_default();
            for (param, hint) in params {
                entry.insert(param.clone(), hint.clone());
            }
        }
    }

    /// Fill derived fields so entries written by hand match parsed ABIs.
    fn normalize(mut self) -> Self {
        for func in &mut self.functions {
            func.inputs = func.inputs.drain(..).map(normalize_param).collect();
            func.outputs = func.outputs.drain(..).map(normalize_param).collect();
            if func.selector.is_empty() {
                func.selector = selector_hex(&function_selector(&func.signature()));
            }
        }
        for event in &mut self.events {
            event.parameters = event.parameters.drain(..).map(normalize_param).collect();
            if event.signature.is_empty() {
                event.signature = topic_hex(&event_topic(&event.canonical()));
            }
        }
        self
    }
}

fn normalize_param(p: ParamDescriptor) -> ParamDescriptor {
    let components = p.components.into_iter().map(normalize_param).collect();
    let mut normalized = ParamDescriptor::with_components(p.name, p.ty, components);
    normalized.indexed = p.indexed;
    normalized
}

/// Amendment table keyed by code hash.
#[derive(Debug, Clone, Default)]
pub struct Amendments {
    by_code_hash: HashMap<B256, ContractAmendment>,
}

impl Amendments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code_hash: B256, amendment: ContractAmendment) {
        self.by_code_hash.insert(code_hash, amendment.normalize());
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, AmendmentError> {
        let raw: HashMap<String, ContractAmendment> = serde_yaml::from_str(content)?;
        let mut table = Self::new();
        for (hash, amendment) in raw {
            let code_hash = hash
                .parse::<B256>()
                .map_err(|_| AmendmentError::InvalidCodeHash(hash.clone()))?;
            table.insert(code_hash, amendment);
        }
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AmendmentError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn len(&self) -> usize {
        self.by_code_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code_hash.is_empty()
    }

    /// Metadata with the matching amendment applied; unchanged (and not
    /// copied) when none matches.
    pub fn apply(&self, meta: Arc<AddressMetadata>) -> Arc<AddressMetadata> {
        match self.by_code_hash.get(&meta.contract.code_hash) {
            None => meta,
            Some(amendment) => {
                let mut amended = (*meta).clone();
                amendment.apply_to(&mut amended);
                Arc::new(amended)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    const HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

    const YAML: &str = r#"
"0x1111111111111111111111111111111111111111111111111111111111111111":
  name: Vault
  functions:
    - name: sweep
      inputs:
        - { name: token, type: address }
  events:
    - name: Swept
      parameters:
        - { name: token, type: address, indexed: true }
        - { name: amount, type: uint256 }
  transformations:
    "sweep(address)":
      token: { transformed_name: asset }
"#;

    #[test]
    fn yaml_entries_are_normalized() {
        let table = Amendments::from_yaml_str(YAML).unwrap();
        assert_eq!(table.len(), 1);
        let meta = Arc::new(AddressMetadata::unknown_contract(
            "mainnet",
            Address::repeat_byte(1),
            HASH.parse().unwrap(),
        ));
        let amended = table.apply(meta);

        assert_eq!(amended.name, "Vault");
        let sweep = amended.contract.functions.values().next().unwrap();
        assert_eq!(sweep.selector, selector_hex(&function_selector("sweep(address)")));
        let swept = amended.contract.events.values().next().unwrap();
        assert_eq!(swept.signature, topic_hex(&event_topic("Swept(address,uint256)")));
        assert!(swept.parameters[0].indexed);
        assert_eq!(
            amended.contract.transformations["sweep(address)"]["token"].transformed_name.as_deref(),
            Some("asset")
        );
    }

    #[test]
    fn unmatched_metadata_is_returned_as_is() {
        let table = Amendments::from_yaml_str(YAML).unwrap();
        let meta = Arc::new(AddressMetadata::eoa("mainnet", Address::ZERO));
        let out = table.apply(Arc::clone(&meta));
        assert!(Arc::ptr_eq(&meta, &out));
    }

    #[test]
    fn rejects_bad_code_hash() {
        let err = Amendments::from_yaml_str("nothex:\n  name: x\n").unwrap_err();
        assert!(matches!(err, AmendmentError::InvalidCodeHash(_)));
    }
}
