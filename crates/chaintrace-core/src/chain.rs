//! Chain identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An EVM network identifier.
///
/// The slug (`mainnet`, `sepolia`, ...) is the key under which semantics are
/// cached and persisted; the numeric chain id is informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId {
    /// Human-readable slug, e.g. "mainnet", "arbitrum"
    pub slug: String,
    /// EIP-155 chain id (1 for Ethereum mainnet)
    pub evm_chain_id: u64,
}

impl ChainId {
    pub fn evm(slug: impl Into<String>, chain_id: u64) -> Self {
        Self {
            slug: slug.into(),
            evm_chain_id: chain_id,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.slug
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug)
    }
}

/// Well-known chain IDs for convenience.
pub mod chains {
    use super::ChainId;

    pub fn mainnet() -> ChainId { ChainId::evm("mainnet", 1) }
    pub fn sepolia() -> ChainId { ChainId::evm("sepolia", 11155111) }
    pub fn goerli() -> ChainId { ChainId::evm("goerli", 5) }
    pub fn arbitrum() -> ChainId { ChainId::evm("arbitrum", 42161) }
    pub fn optimism() -> ChainId { ChainId::evm("optimism", 10) }
    pub fn base() -> ChainId { ChainId::evm("base", 8453) }
    pub fn polygon() -> ChainId { ChainId::evm("polygon", 137) }

    /// All chains known to the decoder.
    pub fn all() -> Vec<ChainId> {
        vec![mainnet(), sepolia(), goerli(), arbitrum(), optimism(), base(), polygon()]
    }

    /// Look up a known chain by slug. `ethereum` is accepted as an alias of `mainnet`.
    pub fn by_slug(slug: &str) -> Option<ChainId> {
        let slug = slug.trim().to_ascii_lowercase();
        let slug = if slug == "ethereum" { "mainnet".to_string() } else { slug };
        all().into_iter().find(|c| c.slug == slug)
    }
}
