//! Token standard interfaces, built-in event signatures, and bytecode
//! heuristics for contracts without a verified ABI.

use crate::fingerprint::{event_topic, function_selector, selector_hex, topic_hex};
use alloy_primitives::B256;
use chaintrace_core::semantics::{
    signature_of, ContractMetadata, EventSignature, FunctionSignature, ParamDescriptor, TokenStandard,
};
use std::sync::LazyLock;

// ─── Standard interfaces ──────────────────────────────────────────────────────

pub const ERC20_FUNCTIONS: &[&str] = &[
    "totalSupply()",
    "balanceOf(address)",
    "transfer(address,uint256)",
    "transferFrom(address,address,uint256)",
    "approve(address,uint256)",
    "allowance(address,address)",
];

pub const ERC20_EVENTS: &[&str] = &[
    "Transfer(address,address,uint256)",
    "Approval(address,address,uint256)",
];

pub const ERC721_FUNCTIONS: &[&str] = &[
    "balanceOf(address)",
    "ownerOf(uint256)",
    "safeTransferFrom(address,address,uint256)",
    "safeTransferFrom(address,address,uint256,bytes)",
    "transferFrom(address,address,uint256)",
    "approve(address,uint256)",
    "setApprovalForAll(address,bool)",
    "getApproved(uint256)",
    "isApprovedForAll(address,address)",
];

pub const ERC721_EVENTS: &[&str] = &[
    "Transfer(address,address,uint256)",
    "Approval(address,address,uint256)",
    "ApprovalForAll(address,address,bool)",
];

/// ERC20 if the contract implements every required ERC20 function and event,
/// otherwise ERC721 by the same rule.
pub fn classify(contract: &ContractMetadata) -> Option<TokenStandard> {
    if implements(contract, ERC20_FUNCTIONS, ERC20_EVENTS) {
        Some(TokenStandard::Erc20)
    } else if implements(contract, ERC721_FUNCTIONS, ERC721_EVENTS) {
        Some(TokenStandard::Erc721)
    } else {
        None
    }
}

fn implements(contract: &ContractMetadata, functions: &[&str], events: &[&str]) -> bool {
    functions
        .iter()
        .all(|sig| contract.functions.contains_key(&selector_hex(&function_selector(sig))))
        && events
            .iter()
            .all(|sig| contract.events.contains_key(&topic_hex(&event_topic(sig))))
}

// ─── Token metadata queries ───────────────────────────────────────────────────

/// `name()`, `symbol()`, `decimals()` as declared by the ERC20 standard.
pub fn erc20_metadata_functions() -> [FunctionSignature; 3] {
    [
        query("name", "string"),
        query("symbol", "string"),
        query("decimals", "uint8"),
    ]
}

fn query(name: &str, output: &str) -> FunctionSignature {
    FunctionSignature {
        selector: selector_hex(&function_selector(&format!("{name}()"))),
        name: name.to_string(),
        inputs: Vec::new(),
        outputs: vec![ParamDescriptor::new("", output)],
    }
}

// ─── Well-known events ────────────────────────────────────────────────────────

struct KnownEvent {
    event: EventSignature,
    /// Topics including topic0
    topic_count: usize,
}

static KNOWN_EVENTS: LazyLock<Vec<KnownEvent>> = LazyLock::new(|| {
    use ParamDescriptor as P;
    vec![
        known(
            "Transfer",
            vec![P::indexed("src", "address"), P::indexed("dst", "address"), P::new("value", "uint256")],
        ),
        known(
            "Transfer",
            vec![P::indexed("from", "address"), P::indexed("to", "address"), P::indexed("tokenId", "uint256")],
        ),
        known(
            "Approval",
            vec![P::indexed("src", "address"), P::indexed("guy", "address"), P::new("value", "uint256")],
        ),
        known(
            "Approval",
            vec![P::indexed("owner", "address"), P::indexed("approved", "address"), P::indexed("tokenId", "uint256")],
        ),
        known(
            "ApprovalForAll",
            vec![P::indexed("owner", "address"), P::indexed("operator", "address"), P::new("approved", "bool")],
        ),
        known("Deposit", vec![P::indexed("dst", "address"), P::new("wad", "uint256")]),
        known("Withdrawal", vec![P::indexed("src", "address"), P::new("wad", "uint256")]),
    ]
});

fn known(name: &str, parameters: Vec<ParamDescriptor>) -> KnownEvent {
    let topic_count = 1 + parameters.iter().filter(|p| p.indexed).count();
    KnownEvent {
        event: EventSignature {
            signature: topic_hex(&event_topic(&signature_of(name, &parameters))),
            name: name.to_string(),
            anonymous: false,
            parameters,
        },
        topic_count,
    }
}

/// Built-in signature for `topic0` whose indexed layout matches the log
/// (ERC20 and ERC721 `Transfer` share a topic). `None` when no variant has
/// `topic_count` topics.
pub fn well_known_event(topic0: &B256, topic_count: usize) -> Option<EventSignature> {
    let topic = topic_hex(topic0);
    KNOWN_EVENTS
        .iter()
        .find(|k| k.event.signature == topic && k.topic_count == topic_count)
        .map(|k| k.event.clone())
}

// ─── Bytecode heuristics ──────────────────────────────────────────────────────

const PUSH4: u8 = 0x63;

/// ERC20 detection for unverified contracts: the dispatcher pushes the
/// `transfer`/`transferFrom`/`approve` selectors, and the `Transfer` and
/// `Approval` topics appear as constants.
pub fn looks_like_erc20(code: &[u8]) -> bool {
    let has_selector = |sig: &&str| {
        let mut pattern = vec![PUSH4];
        pattern.extend_from_slice(&function_selector(sig));
        contains(code, &pattern)
    };
    let has_topic = |sig: &&str| contains(code, event_topic(sig).as_slice());

    ["transfer(address,uint256)", "transferFrom(address,address,uint256)", "approve(address,uint256)"]
        .iter()
        .all(has_selector)
        && ERC20_EVENTS.iter().all(has_topic)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi_json::parse_abi;

    fn abi_with(functions: &[&str], events: &[&str]) -> String {
        let mut items = Vec::new();
        for sig in functions {
            let (name, args) = sig.split_once('(').unwrap();
            let inputs: Vec<String> = args
                .trim_end_matches(')')
                .split(',')
                .filter(|t| !t.is_empty())
                .map(|t| format!(r#"{{"name":"","type":"{t}"}}"#))
                .collect();
            items.push(format!(
                r#"{{"type":"function","name":"{name}","inputs":[{}],"outputs":[],"stateMutability":"view"}}"#,
                inputs.join(",")
            ));
        }
        for sig in events {
            let (name, args) = sig.split_once('(').unwrap();
            let inputs: Vec<String> = args
                .trim_end_matches(')')
                .split(',')
                .map(|t| format!(r#"{{"name":"","type":"{t}","indexed":false}}"#))
                .collect();
            items.push(format!(
                r#"{{"type":"event","name":"{name}","anonymous":false,"inputs":[{}]}}"#,
                inputs.join(",")
            ));
        }
        format!("[{}]", items.join(","))
    }

    #[test]
    fn classifies_by_superset() {
        let erc20 = parse_abi(&abi_with(ERC20_FUNCTIONS, ERC20_EVENTS))
            .unwrap()
            .into_contract(B256::ZERO, "Token");
        assert_eq!(classify(&erc20), Some(TokenStandard::Erc20));

        let erc721 = parse_abi(&abi_with(ERC721_FUNCTIONS, ERC721_EVENTS))
            .unwrap()
            .into_contract(B256::ZERO, "Nft");
        assert_eq!(classify(&erc721), Some(TokenStandard::Erc721));

        let partial = parse_abi(&abi_with(&ERC20_FUNCTIONS[..3], ERC20_EVENTS))
            .unwrap()
            .into_contract(B256::ZERO, "Half");
        assert_eq!(classify(&partial), None);
    }

    #[test]
    fn transfer_variant_follows_topic_count() {
        let topic = event_topic("Transfer(address,address,uint256)");
        let erc20 = well_known_event(&topic, 3).unwrap();
        assert!(!erc20.parameters[2].indexed);
        let erc721 = well_known_event(&topic, 4).unwrap();
        assert_eq!(erc721.parameters[2].name, "tokenId");
        assert!(erc721.parameters[2].indexed);

        let deposit = well_known_event(&event_topic("Deposit(address,uint256)"), 2).unwrap();
        assert_eq!(
            deposit.signature,
            "0xe1fffcc4923d04b559f4d29a8bfc6cda04eb5b0d3c460751c2402c5c5cc9109c"
        );
        assert!(well_known_event(&B256::ZERO, 1).is_none());
    }

    #[test]
    fn unmatched_indexed_layout_is_not_well_known() {
        // Pre-ERC20 tokens emit `Transfer` with nothing indexed.
        let topic = event_topic("Transfer(address,address,uint256)");
        assert!(well_known_event(&topic, 1).is_none());
        assert!(well_known_event(&topic, 2).is_none());
        assert!(well_known_event(&event_topic("Deposit(address,uint256)"), 1).is_none());
    }

    #[test]
    fn bytecode_heuristic() {
        let mut code = vec![0x60, 0x80];
        for sig in ["transfer(address,uint256)", "transferFrom(address,address,uint256)", "approve(address,uint256)"] {
            code.push(PUSH4);
            code.extend_from_slice(&function_selector(sig));
        }
        assert!(!looks_like_erc20(&code));
        for sig in ERC20_EVENTS {
            code.push(0x7f);
            code.extend_from_slice(event_topic(sig).as_slice());
        }
        assert!(looks_like_erc20(&code));
        assert!(!looks_like_erc20(&[]));
    }

    #[test]
    fn metadata_query_selectors() {
        let [name, symbol, decimals] = erc20_metadata_functions();
        assert_eq!(name.selector, "0x06fdde03");
        assert_eq!(symbol.selector, "0x95d89b41");
        assert_eq!(decimals.selector, "0x313ce567");
    }
}
