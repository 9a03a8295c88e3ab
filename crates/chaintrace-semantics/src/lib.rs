//! # chaintrace-semantics
//!
//! Contract and address metadata for the ChainTrace decoder.
//!
//! [`SemanticsRepository`] memoizes lookups in a sharded single-flight cache
//! and resolves misses through a persistent [`MetadataStore`], the node, and
//! an optional verified-ABI source. Concrete stores and sources:
//!
//! - [`MemoryStore`]: always available
//! - `SqliteStore`: `sqlite` feature
//! - `EtherscanSource`: `remote` feature
//!
//! [`MetadataStore`]: chaintrace_core::provider::MetadataStore

pub mod amendments;
pub mod cache;
pub mod memory;
pub mod repository;

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub mod sqlite;

#[cfg(feature = "remote")]
pub mod etherscan;

pub use amendments::{AmendmentError, Amendments, ContractAmendment};
pub use cache::SemanticsCache;
pub use memory::MemoryStore;
pub use repository::{RepositoryConfig, SemanticsRepository};

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub use sqlite::SqliteStore;

#[cfg(feature = "remote")]
pub use etherscan::EtherscanSource;
