//! Function selectors and event topics.
//!
//! A function selector is the first 4 bytes of keccak256 of the canonical
//! signature; an event topic is the full 32-byte hash:
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// `"transfer(address,uint256)"` → `[0xa9, 0x05, 0x9c, 0xbb]`
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn event_topic(signature: &str) -> B256 {
    B256::from(keccak256(signature.as_bytes()))
}

/// `0x`-prefixed hex of a 4-byte selector.
pub fn selector_hex(selector: &[u8; 4]) -> String {
    format!("0x{}", hex::encode(selector))
}

/// `0x`-prefixed hex of a topic.
pub fn topic_hex(topic: &B256) -> String {
    format!("0x{}", hex::encode(topic.as_slice()))
}

/// Selector of raw calldata, if it has at least 4 bytes.
pub fn calldata_selector(input: &[u8]) -> Option<[u8; 4]> {
    input.get(..4).and_then(|s| s.try_into().ok())
}
