//! Transaction decoding orchestrator.
//!
//! `decode_transaction` fetches what the node knows about a transaction and
//! runs the ABI pass (calls, events, transfers, balances) followed by the
//! enrichment pass. A stage that fails is recorded in
//! [`FullDecodedTransaction::errors`]; stages that do not depend on it still
//! run.

use crate::{
    balances::aggregate_balances,
    calls::CallTreeDecoder,
    delegation::{get_delegations, get_token_proxies},
    enrichment::SemanticEnricher,
    events::EventDecoder,
    price::CachedPriceFeed,
    transfers::TransferDeriver,
};
use chaintrace_core::{
    chain::ChainId,
    decoded::{DecodedCall, DecodedEvent, FullDecodedTransaction, Stage, StageFailure},
    error::{DecoderError, ProviderError},
    provider::{with_timeout, ChainDataProvider, PriceFeed},
    semantics::{AddressMetadata, DelegationMap, TokenProxyMap},
    trace::{CallTree, RawLog, RawTransaction, TransactionMetadata},
    validate,
};
use chaintrace_observability::DecoderMetrics;
use chaintrace_semantics::SemanticsRepository;
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Bound on each node fetch (transaction, receipt, block, trace).
    pub upstream_timeout: Duration,
    /// How long a native price quote is reused.
    pub price_ttl: Duration,
    /// Symbol reported for native value transfers.
    pub native_symbol: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            upstream_timeout: Duration::from_secs(10),
            price_ttl: Duration::from_secs(60),
            native_symbol: "ETH".into(),
        }
    }
}

pub struct TransactionDecoder {
    provider: Arc<dyn ChainDataProvider>,
    repo: Arc<SemanticsRepository>,
    price: Option<CachedPriceFeed>,
    metrics: Option<DecoderMetrics>,
    config: DecoderConfig,
}

impl TransactionDecoder {
    pub fn new(provider: Arc<dyn ChainDataProvider>, repo: Arc<SemanticsRepository>, config: DecoderConfig) -> Self {
        Self {
            provider,
            repo,
            price: None,
            metrics: None,
            config,
        }
    }

    pub fn with_price_feed(mut self, feed: Arc<dyn PriceFeed>) -> Self {
        self.price = Some(CachedPriceFeed::new(feed, self.config.price_ttl, self.config.upstream_timeout));
        self
    }

    pub fn with_metrics(mut self, metrics: DecoderMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn repository(&self) -> &Arc<SemanticsRepository> {
        &self.repo
    }

    /// Fetch and fully decode one transaction.
    ///
    /// Inputs are validated before any I/O. A missing or unreachable
    /// transaction, receipt or block is an error; a missing trace is recorded
    /// as a failed `calls` stage.
    pub async fn decode_transaction(&self, chain_id: &str, tx_hash: &str) -> Result<FullDecodedTransaction, DecoderError> {
        let chain = validate::chain(chain_id)?;
        let hash = validate::tx_hash(tx_hash)?;
        info!(chain = %chain, tx_hash = %hash, "decoding transaction");

        let tx = self.bounded("node", self.provider.get_transaction(&chain, hash)).await?;
        let receipt = self.bounded("node", self.provider.get_receipt(&chain, hash)).await?;
        let block = self.bounded("node", self.provider.get_block(&chain, tx.block_number)).await?;

        let metadata = TransactionMetadata {
            chain_id: chain.slug.clone(),
            tx_hash: hash,
            block_number: tx.block_number,
            timestamp: block.timestamp,
            tx_index: tx.tx_index,
            sender: tx.from,
            receiver: tx.to.or(receipt.contract_address),
            value: tx.value,
            gas_used: receipt.gas_used,
            gas_price: tx.gas_price,
            success: receipt.status,
            native_price_usd: None,
        };

        let mut errors = Vec::new();
        let root_call = match self.bounded("tracer", self.provider.get_call_trace(&chain, hash)).await {
            Ok(tree) => Some(tree),
            Err(e) => {
                self.record_failure(&chain, &hash.to_string(), Stage::Calls, &DecoderError::from(e), &mut errors);
                None
            }
        };

        let raw = RawTransaction {
            metadata,
            root_call,
            logs: receipt.logs,
        };
        Ok(self.run(&chain, raw, errors).await)
    }

    /// Decode an already fetched transaction.
    pub async fn decode_raw(&self, raw: RawTransaction) -> Result<FullDecodedTransaction, DecoderError> {
        let chain = validate::chain(&raw.metadata.chain_id)?;
        Ok(self.run(&chain, raw, Vec::new()).await)
    }

    /// Decode a single call tree outside a full transaction.
    pub async fn decode_call(
        &self,
        chain: &ChainId,
        tree: &CallTree,
        metadata: &TransactionMetadata,
    ) -> Result<Option<DecodedCall>, DecoderError> {
        let (delegations, proxies) = self.proxies(chain, Some(tree)).await;
        CallTreeDecoder::new(&self.repo, chain, metadata.tx_hash)
            .decode(Some(tree), &delegations, &proxies)
            .await
    }

    /// Decode a single log outside a full transaction.
    pub async fn decode_event(
        &self,
        chain: &ChainId,
        log: &RawLog,
        metadata: &TransactionMetadata,
    ) -> Result<DecodedEvent, DecoderError> {
        EventDecoder::new(&self.repo, chain, metadata.tx_hash)
            .decode(log, &DelegationMap::new(), &TokenProxyMap::new())
            .await
    }

    /// Persisted metadata for an address, without resolving it.
    pub fn get_raw_semantics(&self, chain_id: &str, address: &str) -> Result<Option<AddressMetadata>, DecoderError> {
        let chain = validate::chain(chain_id)?;
        let address = validate::address(address)?;
        self.repo
            .get_raw_semantics(&chain, address)
            .map_err(|e| DecoderError::UpstreamUnavailable { reason: e.to_string() })
    }

    async fn run(&self, chain: &ChainId, raw: RawTransaction, mut errors: Vec<StageFailure>) -> FullDecodedTransaction {
        let started = Instant::now();
        let tx_hash = raw.metadata.tx_hash.to_string();
        let repo = self.repo.as_ref();

        let (delegations, proxies) = self.proxies(chain, raw.root_call.as_ref()).await;

        let calls = match CallTreeDecoder::new(repo, chain, raw.metadata.tx_hash)
            .decode(raw.root_call.as_ref(), &delegations, &proxies)
            .await
        {
            Ok(calls) => calls,
            Err(e) => {
                self.record_failure(chain, &tx_hash, Stage::Calls, &e, &mut errors);
                None
            }
        };

        let events = EventDecoder::new(repo, chain, raw.metadata.tx_hash)
            .decode_all(&raw.logs, &delegations, &proxies)
            .await;

        let (events, transfers, balances) = match events {
            Ok(events) => {
                let transfers = TransferDeriver::new(repo, chain, &self.config.native_symbol)
                    .derive(calls.as_ref(), &events, &proxies)
                    .await;
                let balances = aggregate_balances(&transfers);
                (events, transfers, balances)
            }
            Err(e) => {
                self.record_failure(chain, &tx_hash, Stage::Events, &e, &mut errors);
                (Vec::new(), Vec::new(), Vec::new())
            }
        };

        let mut decoded = FullDecodedTransaction {
            metadata: raw.metadata,
            events,
            calls,
            transfers,
            balances,
            status: errors.is_empty(),
            errors,
        };
        SemanticEnricher::new(repo, chain, self.price.as_ref())
            .enrich(&mut decoded)
            .await;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let call_count = decoded.calls.as_ref().map_or(0, |root| root.iter().count());
        if let Some(metrics) = &self.metrics {
            metrics.record_calls(chain.as_str(), call_count as u64);
            metrics.record_events(chain.as_str(), decoded.events.len() as u64);
            metrics.record_transaction(chain.as_str(), decoded.status, elapsed_ms);
        }
        info!(
            chain = %chain,
            tx_hash = %tx_hash,
            calls = call_count,
            events = decoded.events.len(),
            transfers = decoded.transfers.len(),
            complete = decoded.status,
            elapsed_ms,
            "transaction decoded"
        );
        decoded
    }

    async fn proxies(&self, chain: &ChainId, tree: Option<&CallTree>) -> (DelegationMap, TokenProxyMap) {
        let delegations = tree.map(get_delegations).unwrap_or_default();
        let proxies = get_token_proxies(chain, &delegations, self.repo.as_ref()).await;
        (delegations, proxies)
    }

    fn record_failure(
        &self,
        chain: &ChainId,
        tx_hash: &str,
        stage: Stage,
        error: &DecoderError,
        errors: &mut Vec<StageFailure>,
    ) {
        warn!(chain = %chain, tx_hash, stage = %stage, error = %error, "decode stage failed");
        if let Some(metrics) = &self.metrics {
            metrics.record_stage_failure(chain.as_str(), &stage.to_string());
        }
        errors.push(StageFailure {
            stage,
            error: error.to_record(),
        });
    }

    async fn bounded<T, F>(&self, service: &str, fut: F) -> Result<T, DecoderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        Ok(with_timeout(service, self.config.upstream_timeout, fut).await?)
    }
}
