//! In-memory `MetadataStore`.
//!
//! Suitable for tests, the CLI and short-lived processes.
//! Thread-safe via `Arc<RwLock<Inner>>`.

use alloy_primitives::{Address, B256};
use chaintrace_core::{
    error::StoreError,
    provider::MetadataStore,
    semantics::{ContractMetadata, StoredAddress},
};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

#[derive(Default)]
struct Inner {
    /// code hash → contract
    contracts: HashMap<B256, ContractMetadata>,
    /// (chain slug, address) → address row
    addresses: HashMap<(String, Address), StoredAddress>,
}

/// Thread-safe in-memory metadata store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address_count(&self) -> usize {
        self.inner.read().map(|i| i.addresses.len()).unwrap_or(0)
    }

    pub fn contract_count(&self) -> usize {
        self.inner.read().map(|i| i.contracts.len()).unwrap_or(0)
    }
}

impl MetadataStore for MemoryStore {
    fn get_contract(&self, code_hash: &B256) -> Result<Option<ContractMetadata>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.contracts.get(code_hash).cloned())
    }

    fn put_contract(&self, contract: &ContractMetadata) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        inner.contracts.insert(contract.code_hash, contract.clone());
        Ok(())
    }

    fn get_address(&self, chain_id: &str, address: &Address) -> Result<Option<StoredAddress>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.addresses.get(&(chain_id.to_string(), *address)).cloned())
    }

    fn put_address(&self, record: &StoredAddress) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        inner
            .addresses
            .insert((record.chain_id.clone(), record.address), record.clone());
        Ok(())
    }

    fn delete_address(&self, chain_id: &str, address: &Address) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.addresses.remove(&(chain_id.to_string(), *address)).is_some())
    }
}
