//! Collaborator contracts: node data, verified ABIs, persistence, prices.
//!
//! The decoder never talks to the network directly; every external lookup
//! goes through one of these traits so tests and the CLI can substitute
//! in-memory implementations.

use crate::{
    chain::ChainId,
    error::{ProviderError, StoreError},
    semantics::{AddressMetadata, ContractMetadata, StoredAddress},
    trace::{CallTree, RawLog},
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    #[serde(default)]
    pub hash: B256,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub hash: B256,
    pub block_number: u64,
    #[serde(default)]
    pub tx_index: u64,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub gas_price: u128,
    #[serde(default)]
    pub input: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptInfo {
    #[serde(default)]
    pub gas_used: u64,
    #[serde(default = "default_status")]
    pub status: bool,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

fn default_status() -> bool {
    true
}

/// Node RPC access for one or more chains.
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    async fn get_block(&self, chain: &ChainId, number: u64) -> Result<BlockInfo, ProviderError>;

    async fn get_transaction(&self, chain: &ChainId, hash: B256) -> Result<TransactionInfo, ProviderError>;

    async fn get_receipt(&self, chain: &ChainId, hash: B256) -> Result<ReceiptInfo, ProviderError>;

    async fn get_call_trace(&self, chain: &ChainId, hash: B256) -> Result<CallTree, ProviderError>;

    /// Deployed bytecode; empty for externally owned accounts.
    async fn get_code(&self, chain: &ChainId, address: Address) -> Result<Bytes, ProviderError>;

    async fn get_code_hash(&self, chain: &ChainId, address: Address) -> Result<B256, ProviderError> {
        let code = self.get_code(chain, address).await?;
        Ok(keccak256(&code))
    }

    /// `eth_call` with raw calldata, returning the raw return data.
    async fn call_contract(&self, chain: &ChainId, to: Address, data: Bytes) -> Result<Bytes, ProviderError>;
}

/// A verified contract ABI as published by a block explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedAbi {
    pub contract_name: String,
    /// Standard ABI JSON array
    pub abi: String,
}

#[async_trait]
pub trait AbiSource: Send + Sync {
    /// `Ok(None)` when the contract is not verified.
    async fn get_verified_abi(
        &self,
        chain: &ChainId,
        address: Address,
    ) -> Result<Option<VerifiedAbi>, ProviderError>;
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn native_token_price_usd(&self, chain: &ChainId) -> Result<f64, ProviderError>;
}

/// Persistent metadata store. Contracts are keyed by code hash, addresses
/// by `(chain, address)`; both `put_*` methods are upserts.
pub trait MetadataStore: Send + Sync {
    fn get_contract(&self, code_hash: &B256) -> Result<Option<ContractMetadata>, StoreError>;

    fn put_contract(&self, contract: &ContractMetadata) -> Result<(), StoreError>;

    fn get_address(&self, chain_id: &str, address: &Address) -> Result<Option<StoredAddress>, StoreError>;

    fn put_address(&self, record: &StoredAddress) -> Result<(), StoreError>;

    /// Remove an address row, leaving its contract in place. Returns whether a row existed.
    fn delete_address(&self, chain_id: &str, address: &Address) -> Result<bool, StoreError>;

    /// Join an address row with its contract.
    fn get_raw_semantics(
        &self,
        chain_id: &str,
        address: &Address,
    ) -> Result<Option<AddressMetadata>, StoreError> {
        let Some(stored) = self.get_address(chain_id, address)? else {
            return Ok(None);
        };
        let contract = match self.get_contract(&stored.code_hash)? {
            Some(contract) => contract,
            None if !stored.is_contract => ContractMetadata::eoa(),
            None => {
                return Err(StoreError::Corrupt {
                    reason: format!("address {address} references missing contract {}", stored.code_hash),
                })
            }
        };
        Ok(Some(AddressMetadata::from_stored(stored, contract)))
    }

    fn put_semantics(&self, metadata: &AddressMetadata) -> Result<(), StoreError> {
        self.put_contract(&metadata.contract)?;
        self.put_address(&metadata.to_stored())
    }
}

/// Bound a collaborator call by `limit`, mapping expiry to [`ProviderError::Timeout`].
pub async fn with_timeout<T, F>(service: &str, limit: Duration, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            service: service.to_string(),
            ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_maps_to_provider_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, ProviderError>(1u8)
        };
        let err = with_timeout("node", Duration::from_millis(10), slow).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Timeout {
                service: "node".into(),
                ms: 10
            }
        );
        assert!(err.is_connectivity());

        let fast = async { Ok::<_, ProviderError>(7u8) };
        assert_eq!(with_timeout("node", Duration::from_secs(1), fast).await.unwrap(), 7);
    }
}
