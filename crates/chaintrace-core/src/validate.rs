//! Request input validation, run before any I/O.

use crate::{
    chain::{chains, ChainId},
    error::DecoderError,
};
use alloy_primitives::{Address, B256};

/// `0x` followed by exactly 64 hex characters.
pub fn tx_hash(input: &str) -> Result<B256, DecoderError> {
    let trimmed = input.trim();
    let hex_part = trimmed.strip_prefix("0x").ok_or_else(|| invalid("tx_hash", input, "missing 0x prefix"))?;
    if hex_part.len() != 64 {
        return Err(invalid("tx_hash", input, "expected 32 bytes"));
    }
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("tx_hash", input, "non-hex characters"));
    }
    trimmed
        .parse::<B256>()
        .map_err(|e| invalid("tx_hash", input, &e.to_string()))
}

/// A chain slug known to the decoder.
pub fn chain(input: &str) -> Result<ChainId, DecoderError> {
    chains::by_slug(input).ok_or_else(|| invalid("chain_id", input, "unknown chain"))
}

pub fn address(input: &str) -> Result<Address, DecoderError> {
    let trimmed = input.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(invalid("address", input, "expected 0x + 40 hex characters"));
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| invalid("address", input, &e.to_string()))
}

fn invalid(field: &'static str, value: &str, reason: &str) -> DecoderError {
    DecoderError::InvalidInput {
        field,
        reason: format!("'{value}': {reason}"),
    }
}
