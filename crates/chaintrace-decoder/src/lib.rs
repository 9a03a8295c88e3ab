//! # chaintrace-decoder
//!
//! Turns a transaction's raw call trace and logs into a decoded,
//! human-readable form: a labelled call tree with decoded arguments, decoded
//! events, native and token transfers, and per-holder balance changes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chaintrace_core::{fixture::StaticChainProvider, provider::AbiSource};
//! use chaintrace_decoder::{DecoderConfig, TransactionDecoder};
//! use chaintrace_semantics::{MemoryStore, RepositoryConfig, SemanticsRepository};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let node = Arc::new(StaticChainProvider::new());
//! let repo = Arc::new(SemanticsRepository::new(
//!     Arc::new(MemoryStore::new()),
//!     node.clone(),
//!     Some(node.clone() as Arc<dyn AbiSource>),
//!     RepositoryConfig::default(),
//! ));
//! let decoder = TransactionDecoder::new(node, repo, DecoderConfig::default());
//! let tx = decoder
//!     .decode_transaction("mainnet", "0x0000000000000000000000000000000000000000000000000000000000000001")
//!     .await?;
//! println!("{} calls decoded", tx.calls.iter().flat_map(|c| c.iter()).count());
//! # Ok(())
//! # }
//! ```

pub mod balances;
pub mod calls;
pub mod delegation;
pub mod enrichment;
pub mod events;
pub mod pipeline;
pub mod price;
pub mod transfers;

pub use balances::aggregate_balances;
pub use calls::CallTreeDecoder;
pub use delegation::{get_delegations, get_token_proxies, TokenIdentityLookup};
pub use enrichment::SemanticEnricher;
pub use events::EventDecoder;
pub use pipeline::{DecoderConfig, TransactionDecoder};
pub use price::CachedPriceFeed;
pub use transfers::TransferDeriver;
