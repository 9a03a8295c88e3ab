//! Decoded output model: calls, events, transfers and balances.

use crate::{
    error::ErrorRecord,
    semantics::TokenStandard,
    trace::{CallKind, TransactionMetadata},
};
use alloy_primitives::{Address, Bytes, B256, I256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded ABI value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Uint(U256),
    Int(I256),
    Bool(bool),
    /// Lower-cased `0x` + 40 hex chars
    Address(String),
    /// `bytes` and `bytesN`
    Bytes(Bytes),
    Str(String),
    Array(Vec<DecodedArgument>),
    Tuple(Vec<DecodedArgument>),
    /// Hash of an indexed dynamic event parameter; the value is unrecoverable.
    TopicHash(B256),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Uint(v) => write!(f, "{v}"),
            ArgValue::Int(v) => write!(f, "{v}"),
            ArgValue::Bool(b) => write!(f, "{b}"),
            ArgValue::Address(a) => write!(f, "{a}"),
            ArgValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            ArgValue::Str(s) => write!(f, "{s}"),
            ArgValue::TopicHash(h) => write!(f, "0x{}", hex::encode(h)),
            ArgValue::Array(items) | ArgValue::Tuple(items) => {
                let open = if matches!(self, ArgValue::Array(_)) { '[' } else { '(' };
                let close = if open == '[' { ']' } else { ')' };
                write!(f, "{open}")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.value)?;
                }
                write!(f, "{close}")
            }
        }
    }
}

impl ArgValue {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            ArgValue::Address(a) => a.parse().ok(),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            ArgValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub value: ArgValue,
    /// Presentation name from contract transformations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl DecodedArgument {
    pub fn new(name: impl Into<String>, ty: impl Into<String>, value: ArgValue) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            value,
            display_name: None,
        }
    }
}

/// An address with its resolved label and an optional role badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: Address,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

impl AddressInfo {
    pub fn new(address: Address, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            badge: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedCall {
    pub chain_id: String,
    pub tx_hash: B256,
    /// Position in the tree: empty for the root, `0001_0000` for the first
    /// child of the second child of the root.
    pub call_id: String,
    pub call_type: CallKind,
    pub from: AddressInfo,
    pub to: AddressInfo,
    pub value: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_signature: Option<String>,
    pub function_name: String,
    pub arguments: Vec<DecodedArgument>,
    pub outputs: Vec<DecodedArgument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: bool,
    pub depth: u32,
    pub children: Vec<DecodedCall>,
}

impl DecodedCall {
    /// Pre-order iterator over this call and all descendants.
    pub fn iter(&self) -> CallIter<'_> {
        CallIter { stack: vec![self] }
    }

    /// Visit every call mutably in pre-order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut DecodedCall)) {
        let mut stack: Vec<&mut DecodedCall> = vec![self];
        while let Some(call) = stack.pop() {
            f(call);
            stack.extend(call.children.iter_mut().rev());
        }
    }
}

pub struct CallIter<'a> {
    stack: Vec<&'a DecodedCall>,
}

impl<'a> Iterator for CallIter<'a> {
    type Item = &'a DecodedCall;

    fn next(&mut self) -> Option<Self::Item> {
        let call = self.stack.pop()?;
        self.stack.extend(call.children.iter().rev());
        Some(call)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub chain_id: String,
    pub tx_hash: B256,
    pub contract: AddressInfo,
    pub index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_signature: Option<String>,
    pub event_name: String,
    pub parameters: Vec<DecodedArgument>,
    /// Number of topics on the log, topic 0 included.
    #[serde(default)]
    pub topic_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    /// `None` for the chain's native token
    pub address: Option<Address>,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<TokenStandard>,
    pub decimals: u8,
}

impl TokenRef {
    pub fn native(symbol: impl Into<String>) -> Self {
        Self {
            address: None,
            symbol: symbol.into(),
            standard: None,
            decimals: 18,
        }
    }

    pub fn is_native(&self) -> bool {
        self.address.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: AddressInfo,
    pub to: AddressInfo,
    pub token: TokenRef,
    pub raw_amount: U256,
    /// Decimal-adjusted amount, e.g. `"1.5"`
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDelta {
    pub token: TokenRef,
    pub raw_delta: I256,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub holder: AddressInfo,
    pub tokens: Vec<TokenDelta>,
}

/// Pipeline stage names used in partial-failure records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Calls,
    Events,
    Transfers,
    Balances,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Calls => "calls",
            Stage::Events => "events",
            Stage::Transfers => "transfers",
            Stage::Balances => "balances",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: ErrorRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullDecodedTransaction {
    pub metadata: TransactionMetadata,
    pub events: Vec<DecodedEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls: Option<DecodedCall>,
    pub transfers: Vec<Transfer>,
    pub balances: Vec<BalanceDelta>,
    pub status: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StageFailure>,
}

/// Render a raw integer amount with `decimals` fractional digits, trimming
/// trailing zeros (`1500000, 6` → `"1.5"`).
pub fn format_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let (int_part, frac_part) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{digits:0>decimals$}"))
    };
    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        int_part
    } else {
        format!("{int_part}.{frac}")
    }
}

/// Signed variant of [`format_units`].
pub fn format_signed_units(raw: I256, decimals: u8) -> String {
    let abs = format_units(raw.unsigned_abs(), decimals);
    if raw.is_negative() {
        format!("-{abs}")
    } else {
        abs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str) -> DecodedCall {
        DecodedCall {
            chain_id: "mainnet".into(),
            tx_hash: B256::ZERO,
            call_id: id.into(),
            call_type: CallKind::Call,
            from: AddressInfo::new(Address::ZERO, "a"),
            to: AddressInfo::new(Address::ZERO, "b"),
            value: U256::ZERO,
            function_signature: None,
            function_name: "fallback".into(),
            arguments: vec![],
            outputs: vec![],
            gas_used: None,
            error: None,
            status: true,
            depth: 0,
            children: vec![],
        }
    }

    #[test]
    fn format_units_scales() {
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::from(5u64), 3), "0.005");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
        assert_eq!(format_units(U256::from(10u64).pow(U256::from(18)), 18), "1");
        assert_eq!(format_signed_units(I256::try_from(-2500i64).unwrap(), 3), "-2.5");
    }

    #[test]
    fn iterates_preorder() {
        let mut root = leaf("");
        let mut a = leaf("0000");
        a.children.push(leaf("0000_0000"));
        root.children.push(a);
        root.children.push(leaf("0001"));

        let ids: Vec<&str> = root.iter().map(|c| c.call_id.as_str()).collect();
        assert_eq!(ids, vec!["", "0000", "0000_0000", "0001"]);

        root.for_each_mut(|c| c.function_name = format!("f{}", c.call_id));
        assert_eq!(root.children[0].children[0].function_name, "f0000_0000");
    }

    #[test]
    fn arg_value_serde_is_tagged() {
        let arg = DecodedArgument::new("ok", "bool", ArgValue::Bool(true));
        let json = serde_json::to_value(&arg).unwrap();
        assert_eq!(json["value"]["type"], "bool");
        assert_eq!(json["value"]["value"], true);
        assert_eq!(json["type"], "bool");
    }
}
