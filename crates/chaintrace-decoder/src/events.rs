//! Log → decoded event.

use alloy_primitives::{Address, B256};
use chaintrace_abi::{codec::decode_event_parameters, fingerprint::topic_hex, standards::well_known_event};
use chaintrace_core::{
    address_hex,
    chain::ChainId,
    decoded::{AddressInfo, DecodedEvent},
    error::DecoderError,
    semantics::{DelegationMap, EventSignature, TokenProxyMap},
    trace::RawLog,
};
use chaintrace_semantics::SemanticsRepository;
use tracing::{debug, warn};

pub struct EventDecoder<'a> {
    repo: &'a SemanticsRepository,
    chain: &'a ChainId,
    tx_hash: B256,
}

impl<'a> EventDecoder<'a> {
    pub fn new(repo: &'a SemanticsRepository, chain: &'a ChainId, tx_hash: B256) -> Self {
        Self { repo, chain, tx_hash }
    }

    /// Decode `logs` in order, stopping at the first log that fails.
    pub async fn decode_all(
        &self,
        logs: &[RawLog],
        delegations: &DelegationMap,
        proxies: &TokenProxyMap,
    ) -> Result<Vec<DecodedEvent>, DecoderError> {
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            events.push(self.decode(log, delegations, proxies).await?);
        }
        Ok(events)
    }

    pub async fn decode(
        &self,
        log: &RawLog,
        delegations: &DelegationMap,
        proxies: &TokenProxyMap,
    ) -> Result<DecodedEvent, DecoderError> {
        let label = self.repo.get_address_label(self.chain, log.address, proxies).await;
        let contract = AddressInfo::new(log.address, label);
        let topic0 = log.topic0().map(topic_hex);

        let (event_name, parameters) = match self.resolve(log, topic0.as_deref(), delegations).await? {
            Some(abi) => {
                let parameters =
                    decode_event_parameters(&abi.parameters, &log.topics, &log.data, abi.anonymous).map_err(|e| {
                        warn!(tx_hash = %self.tx_hash, address = %log.address, log_index = log.log_index,
                            event = %abi.name, error = %e, "log does not match its ABI");
                        DecoderError::from(e)
                    })?;
                (abi.name, parameters)
            }
            None => (topic0.clone().unwrap_or_default(), Vec::new()),
        };

        Ok(DecodedEvent {
            chain_id: self.chain.slug.clone(),
            tx_hash: self.tx_hash,
            contract,
            index: log.log_index,
            event_signature: topic0,
            event_name,
            parameters,
            topic_count: log.topics.len(),
        })
    }

    async fn resolve(
        &self,
        log: &RawLog,
        topic0: Option<&str>,
        delegations: &DelegationMap,
    ) -> Result<Option<EventSignature>, DecoderError> {
        if let Some(topic0) = topic0 {
            if let Some(abi) = self.repo.get_event_abi(self.chain, log.address, topic0).await {
                return Ok(Some((*abi).clone()));
            }
        }
        if let Some(abi) = log.topic0().and_then(|t| well_known_event(t, log.topics.len())) {
            return Ok(Some(abi));
        }

        let ambiguous = match self.repo.get_anonymous_event_abi(self.chain, log.address).await {
            Ok(Some(abi)) => {
                debug!(address = %log.address, event = %abi.name, "log matched anonymous event");
                return Ok(Some(EventSignature { anonymous: true, ..abi }));
            }
            Ok(None) => None,
            Err(e) => Some(e),
        };

        if let Some(topic0) = topic0 {
            if let Some(abi) = self.from_delegates(log.address, topic0, delegations).await {
                return Ok(Some(abi));
            }
        }
        match ambiguous {
            Some(e) => Err(e),
            None => {
                debug!(address = %address_hex(&log.address), topic0 = topic0.unwrap_or(""), "no ABI for log");
                Ok(None)
            }
        }
    }

    async fn from_delegates(&self, address: Address, topic0: &str, delegations: &DelegationMap) -> Option<EventSignature> {
        for delegate in delegations.get(&address).into_iter().flatten() {
            if let Some(abi) = self.repo.get_event_abi(self.chain, *delegate, topic0).await {
                debug!(address = %address, delegate = %delegate, topic0, "event resolved through delegate");
                return Some((*abi).clone());
            }
        }
        None
    }
}
