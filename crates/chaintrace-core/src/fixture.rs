//! In-memory collaborator backed by a serde fixture bundle.
//!
//! Implements [`ChainDataProvider`], [`AbiSource`] and [`PriceFeed`] from
//! static data: the CLI decodes offline bundles with it, and the test suites
//! use it as their mock node.

use crate::{
    chain::ChainId,
    error::ProviderError,
    provider::{
        AbiSource, BlockInfo, ChainDataProvider, PriceFeed, ReceiptInfo, TransactionInfo, VerifiedAbi,
    },
    trace::{CallTree, TraceFrame},
};
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        RwLock,
    },
    time::Duration,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureTransaction {
    pub transaction: TransactionInfo,
    pub receipt: ReceiptInfo,
    pub block: BlockInfo,
    #[serde(default)]
    pub trace: Vec<TraceFrame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEntry {
    pub address: Address,
    pub code: Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiEntry {
    pub address: Address,
    pub contract_name: String,
    pub abi: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEntry {
    pub to: Address,
    pub data: Bytes,
    #[serde(default)]
    pub result: Option<Bytes>,
    #[serde(default)]
    pub revert: Option<String>,
}

/// On-disk fixture format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainFixture {
    #[serde(default)]
    pub transactions: Vec<FixtureTransaction>,
    #[serde(default)]
    pub codes: Vec<CodeEntry>,
    #[serde(default)]
    pub abis: Vec<AbiEntry>,
    #[serde(default)]
    pub calls: Vec<CallEntry>,
    #[serde(default)]
    pub native_price_usd: Option<f64>,
    /// Addresses whose lookups fail with `Unavailable`
    #[serde(default)]
    pub unavailable: Vec<Address>,
}

#[derive(Default)]
pub struct StaticChainProvider {
    transactions: HashMap<B256, FixtureTransaction>,
    blocks: HashMap<u64, BlockInfo>,
    codes: HashMap<Address, Bytes>,
    abis: HashMap<Address, VerifiedAbi>,
    calls: HashMap<(Address, Bytes), Result<Bytes, String>>,
    native_price_usd: Option<f64>,
    unavailable: RwLock<HashSet<Address>>,
    latency: Option<Duration>,
    code_requests: AtomicUsize,
    abi_requests: AtomicUsize,
}

impl StaticChainProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: ChainFixture) -> Self {
        let mut provider = Self::new();
        for tx in fixture.transactions {
            provider = provider.with_transaction(tx);
        }
        for entry in fixture.codes {
            provider = provider.with_code(entry.address, entry.code);
        }
        for entry in fixture.abis {
            provider = provider.with_abi(entry.address, entry.contract_name, entry.abi.to_string());
        }
        for entry in fixture.calls {
            let result = match entry.revert {
                Some(reason) => Err(reason),
                None => Ok(entry.result.unwrap_or_default()),
            };
            provider.calls.insert((entry.to, entry.data), result);
        }
        provider.native_price_usd = fixture.native_price_usd;
        provider.unavailable = RwLock::new(fixture.unavailable.into_iter().collect());
        provider
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_fixture(serde_json::from_str(json)?))
    }

    pub fn with_transaction(mut self, tx: FixtureTransaction) -> Self {
        self.blocks.insert(tx.block.number, tx.block.clone());
        self.transactions.insert(tx.transaction.hash, tx);
        self
    }

    pub fn with_code(mut self, address: Address, code: impl Into<Bytes>) -> Self {
        self.codes.insert(address, code.into());
        self
    }

    pub fn with_abi(mut self, address: Address, name: impl Into<String>, abi_json: impl Into<String>) -> Self {
        self.abis.insert(
            address,
            VerifiedAbi {
                contract_name: name.into(),
                abi: abi_json.into(),
            },
        );
        self
    }

    pub fn with_call_result(mut self, to: Address, data: impl Into<Bytes>, result: impl Into<Bytes>) -> Self {
        self.calls.insert((to, data.into()), Ok(result.into()));
        self
    }

    pub fn with_price(mut self, usd: f64) -> Self {
        self.native_price_usd = Some(usd);
        self
    }

    /// Delay every code and ABI lookup, to widen race windows in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_unavailable(&self, address: Address, unavailable: bool) {
        if let Ok(mut set) = self.unavailable.write() {
            if unavailable {
                set.insert(address);
            } else {
                set.remove(&address);
            }
        }
    }

    pub fn code_requests(&self) -> usize {
        self.code_requests.load(Ordering::SeqCst)
    }

    pub fn abi_requests(&self) -> usize {
        self.abi_requests.load(Ordering::SeqCst)
    }

    fn check_reachable(&self, address: Address, service: &str) -> Result<(), ProviderError> {
        let down = self
            .unavailable
            .read()
            .map(|set| set.contains(&address))
            .unwrap_or(false);
        if down {
            return Err(ProviderError::Unavailable {
                service: service.to_string(),
                reason: format!("{address} unreachable"),
            });
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn fixture_tx(&self, hash: B256) -> Result<&FixtureTransaction, ProviderError> {
        self.transactions.get(&hash).ok_or_else(|| ProviderError::NotFound {
            what: format!("transaction {hash}"),
        })
    }
}

#[async_trait]
impl ChainDataProvider for StaticChainProvider {
    async fn get_block(&self, _chain: &ChainId, number: u64) -> Result<BlockInfo, ProviderError> {
        self.blocks.get(&number).cloned().ok_or_else(|| ProviderError::NotFound {
            what: format!("block {number}"),
        })
    }

    async fn get_transaction(&self, _chain: &ChainId, hash: B256) -> Result<TransactionInfo, ProviderError> {
        Ok(self.fixture_tx(hash)?.transaction.clone())
    }

    async fn get_receipt(&self, _chain: &ChainId, hash: B256) -> Result<ReceiptInfo, ProviderError> {
        Ok(self.fixture_tx(hash)?.receipt.clone())
    }

    async fn get_call_trace(&self, _chain: &ChainId, hash: B256) -> Result<CallTree, ProviderError> {
        let tx = self.fixture_tx(hash)?;
        if tx.trace.is_empty() {
            return Err(ProviderError::NotFound {
                what: format!("trace for {hash}"),
            });
        }
        CallTree::from_frames(tx.trace.clone()).map_err(|e| ProviderError::Unavailable {
            service: "tracer".into(),
            reason: e.to_string(),
        })
    }

    async fn get_code(&self, _chain: &ChainId, address: Address) -> Result<Bytes, ProviderError> {
        self.code_requests.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_reachable(address, "node")?;
        Ok(self.codes.get(&address).cloned().unwrap_or_default())
    }

    async fn call_contract(&self, _chain: &ChainId, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        self.check_reachable(to, "node")?;
        match self.calls.get(&(to, data)) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(reason)) => Err(ProviderError::Execution { reason: reason.clone() }),
            None => Err(ProviderError::Execution {
                reason: "execution reverted".into(),
            }),
        }
    }
}

#[async_trait]
impl AbiSource for StaticChainProvider {
    async fn get_verified_abi(
        &self,
        _chain: &ChainId,
        address: Address,
    ) -> Result<Option<VerifiedAbi>, ProviderError> {
        self.abi_requests.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_reachable(address, "abi-source")?;
        Ok(self.abis.get(&address).cloned())
    }
}

#[async_trait]
impl PriceFeed for StaticChainProvider {
    async fn native_token_price_usd(&self, _chain: &ChainId) -> Result<f64, ProviderError> {
        self.native_price_usd.ok_or_else(|| ProviderError::NotFound {
            what: "native token price".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::chains;

    const FIXTURE: &str = r#"{
        "transactions": [{
            "transaction": {
                "hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
                "block_number": 100,
                "from": "0x00000000000000000000000000000000000000aa",
                "to": "0x00000000000000000000000000000000000000bb"
            },
            "receipt": { "gas_used": 21000 },
            "block": { "number": 100, "timestamp": "2023-01-01T00:00:00Z" },
            "trace": [
                { "trace_address": [], "type": "call",
                  "from": "0x00000000000000000000000000000000000000aa",
                  "to": "0x00000000000000000000000000000000000000bb" }
            ]
        }],
        "codes": [{ "address": "0x00000000000000000000000000000000000000bb", "code": "0x6001" }],
        "native_price_usd": 1800.5
    }"#;

    #[tokio::test]
    async fn loads_fixture_bundle() {
        let provider = StaticChainProvider::from_json(FIXTURE).unwrap();
        let chain = chains::mainnet();
        let hash: B256 = "0x1111111111111111111111111111111111111111111111111111111111111111"
            .parse()
            .unwrap();

        let tx = provider.get_transaction(&chain, hash).await.unwrap();
        assert_eq!(tx.block_number, 100);
        assert_eq!(provider.get_receipt(&chain, hash).await.unwrap().gas_used, 21000);
        assert_eq!(provider.get_call_trace(&chain, hash).await.unwrap().len(), 1);

        let bb: Address = "0x00000000000000000000000000000000000000bb".parse().unwrap();
        assert_eq!(provider.get_code(&chain, bb).await.unwrap().len(), 2);
        assert!(provider.get_code(&chain, Address::ZERO).await.unwrap().is_empty());
        assert_eq!(provider.code_requests(), 2);
        assert_eq!(provider.native_token_price_usd(&chain).await.unwrap(), 1800.5);

        assert!(matches!(
            provider.get_transaction(&chain, B256::ZERO).await,
            Err(ProviderError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_addresses_report_unavailable() {
        let provider = StaticChainProvider::new();
        let chain = chains::mainnet();
        let addr = Address::repeat_byte(7);
        provider.set_unavailable(addr, true);
        let err = provider.get_code(&chain, addr).await.unwrap_err();
        assert!(err.is_connectivity());
        provider.set_unavailable(addr, false);
        assert!(provider.get_code(&chain, addr).await.is_ok());
    }
}
