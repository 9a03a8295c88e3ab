//! The semantics repository: memoized, single-flight metadata lookups in
//! front of a persistent store, the node, and an optional ABI source.
//!
//! Resolution on a cache miss walks, stopping at the first step that yields:
//! store → EOA (empty code) → verified ABI → bytecode heuristic → unknown
//! contract. Fresh records are persisted before they are returned. Records
//! built while a collaborator was unreachable are returned but neither
//! persisted nor memoized, so the next lookup retries.
//!
//! Every manual edit or invalidation bumps the address's write generation
//! while holding that generation's entry. A resolution persists only if the
//! generation it started under is still current, so an in-flight lookup
//! never overwrites an edit made while it ran.

use crate::{amendments::Amendments, cache::SemanticsCache};
use alloy_primitives::{keccak256, Address, Bytes, B256};
use chaintrace_abi::{
    abi_json::parse_abi,
    codec::decode_parameters,
    standards::{classify, erc20_metadata_functions, looks_like_erc20},
};
use chaintrace_core::{
    address_hex,
    chain::ChainId,
    decoded::ArgValue,
    error::{DecoderError, ProviderError, StoreError},
    provider::{with_timeout, AbiSource, ChainDataProvider, MetadataStore},
    semantics::{
        AddressMetadata, ContractMetadata, Erc20Data, EventSignature, FunctionSignature, TokenIdentity,
        TokenProxyMap, TokenStandard, Transformation,
    },
};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Explicit configuration for a [`SemanticsRepository`].
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Bound applied to each node / ABI-source call made during resolution.
    pub upstream_timeout: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            upstream_timeout: Duration::from_secs(10),
        }
    }
}

type AddressKey = (String, Address);
type SignatureKey = (String, Address, String);

/// Result of a resolution that must not be memoized.
struct Degraded(Arc<AddressMetadata>);

pub struct SemanticsRepository {
    store: Arc<dyn MetadataStore>,
    provider: Arc<dyn ChainDataProvider>,
    abi_source: Option<Arc<dyn AbiSource>>,
    amendments: Amendments,
    config: RepositoryConfig,
    addresses: SemanticsCache<AddressKey, Arc<AddressMetadata>>,
    functions: SemanticsCache<SignatureKey, Option<Arc<FunctionSignature>>>,
    events: SemanticsCache<SignatureKey, Option<Arc<EventSignature>>>,
    generations: DashMap<AddressKey, u64>,
}

impl SemanticsRepository {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        provider: Arc<dyn ChainDataProvider>,
        abi_source: Option<Arc<dyn AbiSource>>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            store,
            provider,
            abi_source,
            amendments: Amendments::new(),
            config,
            addresses: SemanticsCache::new(),
            functions: SemanticsCache::new(),
            events: SemanticsCache::new(),
            generations: DashMap::new(),
        }
    }

    pub fn with_amendments(mut self, amendments: Amendments) -> Self {
        self.amendments = amendments;
        self
    }

    // ─── Address-level lookups ────────────────────────────────────────────────

    /// Metadata for `address`, resolving it on first use. Never fails: an
    /// address that cannot be resolved comes back as an unknown record, a
    /// contract only if its code was fetched.
    pub async fn get_semantics(&self, chain: &ChainId, address: Address) -> Arc<AddressMetadata> {
        self.lookup(chain, address).await.0
    }

    /// Persisted metadata only; no resolution, no caching, no amendments.
    pub fn get_raw_semantics(
        &self,
        chain: &ChainId,
        address: Address,
    ) -> Result<Option<AddressMetadata>, StoreError> {
        self.store.get_raw_semantics(chain.as_str(), &address)
    }

    /// Amended metadata plus whether it may be memoized.
    async fn lookup(&self, chain: &ChainId, address: Address) -> (Arc<AddressMetadata>, bool) {
        let key = (chain.slug.clone(), address);
        let resolved = self
            .addresses
            .get_or_try_resolve(key, || self.resolve(chain, address))
            .await;
        match resolved {
            Ok(meta) => (self.amendments.apply(meta), true),
            Err(Degraded(meta)) => (self.amendments.apply(meta), false),
        }
    }

    pub async fn check_is_contract(&self, chain: &ChainId, address: Address) -> bool {
        self.get_semantics(chain, address).await.is_contract
    }

    pub async fn get_standard(&self, chain: &ChainId, address: Address) -> Option<TokenStandard> {
        self.get_semantics(chain, address).await.standard
    }

    pub async fn get_token_identity(&self, chain: &ChainId, address: Address) -> Option<TokenIdentity> {
        self.get_semantics(chain, address).await.token_identity()
    }

    /// Token identity of `address`, or of the implementation it proxies for.
    /// Unknown tokens default to `(address, "Unknown", 18)`.
    pub async fn get_token_data(
        &self,
        chain: &ChainId,
        address: Address,
        proxies: &TokenProxyMap,
    ) -> TokenIdentity {
        if let Some(identity) = self.get_token_identity(chain, address).await {
            return identity;
        }
        if let Some(identity) = proxies.get(&address) {
            return identity.clone();
        }
        TokenIdentity {
            name: address_hex(&address),
            symbol: "Unknown".into(),
            decimals: 18,
        }
    }

    /// Display label: ERC20 symbol, else `<proxied symbol>_proxy`, else name,
    /// else the address itself.
    pub async fn get_address_label(&self, chain: &ChainId, address: Address, proxies: &TokenProxyMap) -> String {
        let meta = self.get_semantics(chain, address).await;
        if let Some(erc20) = &meta.erc20 {
            return erc20.symbol.clone();
        }
        if let Some(proxy) = proxies.get(&address) {
            return format!("{}_proxy", proxy.symbol);
        }
        if meta.name.is_empty() {
            address_hex(&address)
        } else {
            meta.name.clone()
        }
    }

    // ─── Signature lookups ────────────────────────────────────────────────────

    /// Function by selector hex (`0xa9059cbb`).
    pub async fn get_function_abi(
        &self,
        chain: &ChainId,
        address: Address,
        selector: &str,
    ) -> Option<Arc<FunctionSignature>> {
        let key = (chain.slug.clone(), address, selector.to_string());
        self.functions
            .get_or_try_resolve(key, || async move {
                let (meta, cacheable) = self.lookup(chain, address).await;
                let found = meta.contract.functions.get(selector).cloned().map(Arc::new);
                if cacheable {
                    Ok(found)
                } else {
                    Err(found)
                }
            })
            .await
            .unwrap_or_else(|uncached| uncached)
    }

    /// Event by topic-0 hex.
    pub async fn get_event_abi(&self, chain: &ChainId, address: Address, topic0: &str) -> Option<Arc<EventSignature>> {
        let key = (chain.slug.clone(), address, topic0.to_string());
        self.events
            .get_or_try_resolve(key, || async move {
                let (meta, cacheable) = self.lookup(chain, address).await;
                let found = meta.contract.events.get(topic0).cloned().map(Arc::new);
                if cacheable {
                    Ok(found)
                } else {
                    Err(found)
                }
            })
            .await
            .unwrap_or_else(|uncached| uncached)
    }

    /// The contract's only anonymous event. More than one cannot be told
    /// apart from the log alone.
    pub async fn get_anonymous_event_abi(
        &self,
        chain: &ChainId,
        address: Address,
    ) -> Result<Option<EventSignature>, DecoderError> {
        let meta = self.get_semantics(chain, address).await;
        let mut anonymous = meta.contract.anonymous_events();
        let Some(first) = anonymous.next() else {
            return Ok(None);
        };
        let others = anonymous.count();
        if others > 0 {
            return Err(DecoderError::AmbiguousSignature {
                address: address_hex(&address),
                candidates: others + 1,
            });
        }
        Ok(Some(first.clone()))
    }

    pub async fn get_constructor_abi(&self, chain: &ChainId, address: Address) -> Option<FunctionSignature> {
        self.get_semantics(chain, address).await.contract.constructor.clone()
    }

    /// Display hints for the parameters of `signature` (`transfer(address,uint256)`).
    pub async fn get_transformations(
        &self,
        chain: &ChainId,
        address: Address,
        signature: &str,
    ) -> Option<IndexMap<String, Transformation>> {
        self.get_semantics(chain, address)
            .await
            .contract
            .transformations
            .get(signature)
            .cloned()
    }

    // ─── Maintenance ──────────────────────────────────────────────────────────

    /// Forget everything known about `address` on `chain`: its persisted row
    /// and every memoized entry. The next lookup runs the full chain again.
    pub fn invalidate(&self, chain: &ChainId, address: Address) {
        {
            let mut generation = self.generations.entry((chain.slug.clone(), address)).or_insert(0);
            if let Err(e) = self.store.delete_address(chain.as_str(), &address) {
                warn!(chain = %chain, address = %address, error = %e, "failed to delete persisted semantics");
            }
            *generation += 1;
        }
        self.evict(chain.as_str(), address);
    }

    /// Persist a manual edit, then drop the memoized entries it supersedes.
    pub fn update_semantics(&self, metadata: &AddressMetadata) -> Result<(), StoreError> {
        {
            let mut generation = self
                .generations
                .entry((metadata.chain_id.clone(), metadata.address))
                .or_insert(0);
            self.store.put_semantics(metadata)?;
            *generation += 1;
        }
        self.evict(&metadata.chain_id, metadata.address);
        Ok(())
    }

    fn generation(&self, key: &AddressKey) -> u64 {
        self.generations.get(key).map_or(0, |g| *g)
    }

    fn evict(&self, chain_id: &str, address: Address) {
        self.addresses.invalidate(&(chain_id.to_string(), address));
        let same_address = |k: &SignatureKey| k.0 == chain_id && k.1 == address;
        self.functions.invalidate_where(same_address);
        self.events.invalidate_where(same_address);
    }

    // ─── Resolution chain ─────────────────────────────────────────────────────

    async fn resolve(&self, chain: &ChainId, address: Address) -> Result<Arc<AddressMetadata>, Degraded> {
        let key = (chain.slug.clone(), address);
        let started_under = self.generation(&key);
        match self.store.get_raw_semantics(chain.as_str(), &address) {
            Ok(Some(meta)) => return Ok(Arc::new(meta)),
            Ok(None) => {}
            Err(e) => warn!(chain = %chain, address = %address, error = %e, "semantics store read failed"),
        }
        debug!(chain = %chain, address = %address, "semantics cache miss, resolving");

        let code = self
            .bounded("node", self.provider.get_code(chain, address))
            .await
            .map_err(|e| self.degraded(chain, address, None, e))?;

        let meta = if code.is_empty() {
            AddressMetadata::eoa(chain.as_str(), address)
        } else {
            let code_hash = keccak256(&code);
            let verified = self
                .from_verified_abi(chain, address, code_hash)
                .await
                .map_err(|e| self.degraded(chain, address, Some(code_hash), e))?;
            match verified {
                Some(meta) => meta,
                None => self
                    .from_bytecode(chain, address, code_hash, &code)
                    .await
                    .map_err(|e| self.degraded(chain, address, Some(code_hash), e))?,
            }
        };

        self.persist(chain, key, started_under, meta)
    }

    /// Write back a fresh record unless the address was edited or
    /// invalidated after resolution started. A superseded resolution returns
    /// whatever the store now holds, unmemoized.
    fn persist(
        &self,
        chain: &ChainId,
        key: AddressKey,
        started_under: u64,
        meta: AddressMetadata,
    ) -> Result<Arc<AddressMetadata>, Degraded> {
        let address = key.1;
        let generation = self.generations.entry(key).or_insert(0);
        if *generation != started_under {
            drop(generation);
            debug!(chain = %chain, address = %address, "semantics changed during resolution, not persisting");
            let current = match self.store.get_raw_semantics(chain.as_str(), &address) {
                Ok(Some(current)) => current,
                _ => meta,
            };
            return Err(Degraded(Arc::new(current)));
        }
        if let Err(e) = self.store.put_semantics(&meta) {
            warn!(chain = %chain, address = %address, error = %e, "failed to persist semantics");
        }
        Ok(Arc::new(meta))
    }

    /// Placeholder record for an outage. Without a `code_hash` the node never
    /// answered, so the address is not claimed to be a contract.
    fn degraded(&self, chain: &ChainId, address: Address, code_hash: Option<B256>, err: ProviderError) -> Degraded {
        warn!(chain = %chain, address = %address, error = %err, "upstream unavailable, using unknown contract");
        let mut meta = AddressMetadata::unknown_contract(chain.as_str(), address, code_hash.unwrap_or(B256::ZERO));
        meta.is_contract = code_hash.is_some();
        Degraded(Arc::new(meta))
    }

    async fn from_verified_abi(
        &self,
        chain: &ChainId,
        address: Address,
        code_hash: B256,
    ) -> Result<Option<AddressMetadata>, ProviderError> {
        let Some(source) = &self.abi_source else {
            return Ok(None);
        };
        let Some(verified) = self.bounded("abi-source", source.get_verified_abi(chain, address)).await? else {
            debug!(chain = %chain, address = %address, "no verified ABI");
            return Ok(None);
        };
        let parsed = match parse_abi(&verified.abi) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(chain = %chain, address = %address, error = %e, "verified ABI did not parse");
                return Ok(None);
            }
        };

        let contract = parsed.into_contract(code_hash, verified.contract_name.clone());
        let standard = classify(&contract);
        let erc20 = match standard {
            Some(TokenStandard::Erc20) => Some(self.verified_erc20_data(chain, address, &contract).await?),
            _ => None,
        };
        Ok(Some(AddressMetadata {
            chain_id: chain.slug.clone(),
            address,
            name: verified.contract_name,
            is_contract: true,
            contract,
            standard,
            erc20,
        }))
    }

    /// `name`/`symbol`/`decimals` decoded through the contract's declared
    /// outputs, so `bytes32` symbols work. Failed calls fall back to the
    /// contract name and 18 decimals; connectivity failures propagate.
    async fn verified_erc20_data(
        &self,
        chain: &ChainId,
        address: Address,
        contract: &ContractMetadata,
    ) -> Result<Erc20Data, ProviderError> {
        let [name_fn, symbol_fn, decimals_fn] =
            erc20_metadata_functions().map(|q| contract.functions.get(&q.selector).cloned().unwrap_or(q));

        let name = self.call_view(chain, address, &name_fn).await?.and_then(text_of);
        let symbol = self.call_view(chain, address, &symbol_fn).await?.and_then(text_of);
        let decimals = self.call_view(chain, address, &decimals_fn).await?.and_then(decimals_of);

        Ok(Erc20Data {
            name: name.unwrap_or_else(|| contract.name.clone()),
            symbol: symbol.unwrap_or_else(|| contract.name.clone()),
            decimals: decimals.unwrap_or(18),
        })
    }

    async fn from_bytecode(
        &self,
        chain: &ChainId,
        address: Address,
        code_hash: B256,
        code: &[u8],
    ) -> Result<AddressMetadata, ProviderError> {
        let mut meta = AddressMetadata::unknown_contract(chain.as_str(), address, code_hash);
        if !looks_like_erc20(code) {
            return Ok(meta);
        }

        let [name_fn, symbol_fn, decimals_fn] = erc20_metadata_functions();
        let name = self.call_view(chain, address, &name_fn).await?.and_then(text_of);
        let symbol = self.call_view(chain, address, &symbol_fn).await?.and_then(text_of);
        let decimals = self.call_view(chain, address, &decimals_fn).await?.and_then(decimals_of);

        match (name, symbol, decimals) {
            (Some(name), Some(symbol), Some(decimals)) => {
                debug!(chain = %chain, address = %address, %symbol, "bytecode matches ERC20");
                meta.name = name.clone();
                meta.standard = Some(TokenStandard::Erc20);
                meta.erc20 = Some(Erc20Data { name, symbol, decimals });
            }
            _ => debug!(chain = %chain, address = %address, "ERC20-like bytecode without token metadata"),
        }
        Ok(meta)
    }

    /// First output of a zero-argument view call. Reverts and undecodable
    /// return data yield `None`.
    async fn call_view(
        &self,
        chain: &ChainId,
        address: Address,
        func: &FunctionSignature,
    ) -> Result<Option<ArgValue>, ProviderError> {
        let Some(selector) = parse_selector(&func.selector) else {
            return Ok(None);
        };
        let call = self.provider.call_contract(chain, address, Bytes::copy_from_slice(&selector));
        let output = match self.bounded("node", call).await {
            Ok(output) => output,
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => {
                debug!(chain = %chain, address = %address, function = %func.name, error = %e, "view call failed");
                return Ok(None);
            }
        };
        Ok(decode_parameters(&func.outputs, &output)
            .ok()
            .and_then(|args| args.into_iter().next())
            .map(|arg| arg.value))
    }

    async fn bounded<T>(
        &self,
        service: &str,
        fut: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        with_timeout(service, self.config.upstream_timeout, fut).await
    }
}

fn parse_selector(selector: &str) -> Option<[u8; 4]> {
    let bytes = hex::decode(selector.strip_prefix("0x").unwrap_or(selector)).ok()?;
    bytes.try_into().ok()
}

fn text_of(value: ArgValue) -> Option<String> {
    let text = match value {
        ArgValue::Str(s) => s,
        ArgValue::Bytes(b) => {
            let end = b.iter().position(|c| *c == 0).unwrap_or(b.len());
            String::from_utf8_lossy(&b[..end]).into_owned()
        }
        _ => return None,
    };
    let text = text.trim_end_matches('\0').to_string();
    (!text.is_empty()).then_some(text)
}

fn decimals_of(value: ArgValue) -> Option<u8> {
    let raw = u64::try_from(value.as_uint()?).ok()?;
    u8::try_from(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parsing() {
        assert_eq!(parse_selector("0x06fdde03"), Some([0x06, 0xfd, 0xde, 0x03]));
        assert_eq!(parse_selector("0x06fd"), None);
        assert_eq!(parse_selector(""), None);
    }

    #[test]
    fn token_text_from_string_or_bytes32() {
        assert_eq!(text_of(ArgValue::Str("USDC".into())), Some("USDC".into()));
        let mut word = [0u8; 32];
        word[..3].copy_from_slice(b"MKR");
        assert_eq!(text_of(ArgValue::Bytes(Bytes::copy_from_slice(&word))), Some("MKR".into()));
        assert_eq!(text_of(ArgValue::Str(String::new())), None);
        assert_eq!(text_of(ArgValue::Bool(true)), None);
    }

    #[test]
    fn decimals_must_fit_u8() {
        use alloy_primitives::U256;
        assert_eq!(decimals_of(ArgValue::Uint(U256::from(6))), Some(6));
        assert_eq!(decimals_of(ArgValue::Uint(U256::from(256))), None);
    }
}
