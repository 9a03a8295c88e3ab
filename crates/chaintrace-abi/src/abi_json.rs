//! Standard ABI JSON → contract metadata.

use crate::fingerprint::{selector_hex, topic_hex};
use alloy_json_abi::{EventParam, JsonAbi, Param};
use alloy_primitives::B256;
use chaintrace_core::{
    error::DecodeError,
    semantics::{ContractMetadata, EventSignature, FunctionSignature, ParamDescriptor},
};
use indexmap::IndexMap;

/// Functions, events and constructor extracted from one ABI document.
#[derive(Debug, Clone, Default)]
pub struct ParsedAbi {
    /// selector hex → function
    pub functions: IndexMap<String, FunctionSignature>,
    /// topic hex → event
    pub events: IndexMap<String, EventSignature>,
    pub constructor: Option<FunctionSignature>,
}

impl ParsedAbi {
    pub fn into_contract(self, code_hash: B256, name: impl Into<String>) -> ContractMetadata {
        let mut contract = ContractMetadata::new(code_hash, name);
        contract.functions = self.functions;
        contract.events = self.events;
        contract.constructor = self.constructor;
        contract
    }
}

pub fn parse_abi(abi_json: &str) -> Result<ParsedAbi, DecodeError> {
    let abi: JsonAbi = serde_json::from_str(abi_json).map_err(|e| DecodeError::InvalidAbi {
        reason: e.to_string(),
    })?;

    let mut parsed = ParsedAbi::default();
    for func in abi.functions() {
        let sig = FunctionSignature {
            selector: selector_hex(&func.selector().0),
            name: func.name.clone(),
            inputs: func.inputs.iter().map(param_descriptor).collect(),
            outputs: func.outputs.iter().map(param_descriptor).collect(),
        };
        parsed.functions.insert(sig.selector.clone(), sig);
    }
    for event in abi.events() {
        let sig = EventSignature {
            signature: topic_hex(&event.selector()),
            name: event.name.clone(),
            anonymous: event.anonymous,
            parameters: event.inputs.iter().map(event_param_descriptor).collect(),
        };
        parsed.events.insert(sig.signature.clone(), sig);
    }
    parsed.constructor = abi.constructor().map(|ctor| FunctionSignature {
        selector: String::new(),
        name: "constructor".into(),
        inputs: ctor.inputs.iter().map(param_descriptor).collect(),
        outputs: Vec::new(),
    });
    Ok(parsed)
}

fn param_descriptor(p: &Param) -> ParamDescriptor {
    ParamDescriptor::with_components(
        p.name.clone(),
        p.ty.clone(),
        p.components.iter().map(param_descriptor).collect(),
    )
}

fn event_param_descriptor(p: &EventParam) -> ParamDescriptor {
    let mut d = ParamDescriptor::with_components(
        p.name.clone(),
        p.ty.clone(),
        p.components.iter().map(param_descriptor).collect(),
    );
    d.indexed = p.indexed;
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABI: &str = r#"[
        {"type":"constructor","inputs":[{"name":"owner","type":"address"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"submit","inputs":[{"name":"order","type":"tuple","components":[
            {"name":"maker","type":"address"},{"name":"note","type":"string"}]}],
         "outputs":[],"stateMutability":"nonpayable"},
        {"type":"event","name":"Transfer","anonymous":false,"inputs":[
            {"name":"from","type":"address","indexed":true},
            {"name":"to","type":"address","indexed":true},
            {"name":"value","type":"uint256","indexed":false}]},
        {"type":"event","name":"Log","anonymous":true,"inputs":[{"name":"who","type":"address","indexed":true}]}
    ]"#;

    #[test]
    fn parses_functions_events_constructor() {
        let parsed = parse_abi(ABI).unwrap();

        let transfer = &parsed.functions["0xa9059cbb"];
        assert_eq!(transfer.name, "transfer");
        assert_eq!(transfer.outputs[0].ty, "bool");

        let submit = parsed.functions.values().find(|f| f.name == "submit").unwrap();
        assert_eq!(submit.inputs[0].canonical_type(), "(address,string)");
        assert!(submit.inputs[0].dynamic);
        assert_eq!(submit.signature(), "submit((address,string))");

        let event = &parsed.events["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"];
        assert!(event.parameters[0].indexed);
        assert!(!event.parameters[2].indexed);
        assert_eq!(parsed.events.values().filter(|e| e.anonymous).count(), 1);

        let ctor = parsed.constructor.unwrap();
        assert_eq!(ctor.inputs[0].name, "owner");
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(parse_abi("{not json"), Err(DecodeError::InvalidAbi { .. })));
    }
}
