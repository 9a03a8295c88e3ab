//! Resolution-chain tests for `SemanticsRepository` against the in-memory
//! fixture provider.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{keccak256, Address, U256};
use chaintrace_abi::fingerprint::{event_topic, function_selector, topic_hex};
use chaintrace_core::{
    chains,
    error::DecoderError,
    fixture::StaticChainProvider,
    provider::{AbiSource, ChainDataProvider, MetadataStore},
    semantics::{AddressMetadata, TokenIdentity, TokenProxyMap, TokenStandard},
};
use chaintrace_semantics::{Amendments, ContractAmendment, MemoryStore, RepositoryConfig, SemanticsRepository};
use std::{sync::Arc, time::Duration};

const ERC20_ABI: &str = r#"[
    {"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"},
    {"type":"function","name":"symbol","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"},
    {"type":"function","name":"decimals","inputs":[],"outputs":[{"name":"","type":"uint8"}],"stateMutability":"view"},
    {"type":"function","name":"totalSupply","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"function","name":"balanceOf","inputs":[{"name":"account","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"transferFrom","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"approve","inputs":[{"name":"spender","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"allowance","inputs":[{"name":"owner","type":"address"},{"name":"spender","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"event","name":"Transfer","anonymous":false,"inputs":[{"name":"from","type":"address","indexed":true},{"name":"to","type":"address","indexed":true},{"name":"value","type":"uint256","indexed":false}]},
    {"type":"event","name":"Approval","anonymous":false,"inputs":[{"name":"owner","type":"address","indexed":true},{"name":"spender","type":"address","indexed":true},{"name":"value","type":"uint256","indexed":false}]}
]"#;

const TWO_ANONYMOUS_ABI: &str = r#"[
    {"type":"event","name":"LogA","anonymous":true,"inputs":[{"name":"a","type":"uint256","indexed":false}]},
    {"type":"event","name":"LogB","anonymous":true,"inputs":[{"name":"b","type":"address","indexed":true}]}
]"#;

fn token_address() -> Address {
    "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse().unwrap()
}

fn token_code() -> Vec<u8> {
    vec![0x60, 0x80, 0x60, 0x40, 0x52, 0x01]
}

fn encode_string(s: &str) -> Vec<u8> {
    DynSolValue::Tuple(vec![DynSolValue::String(s.into())]).abi_encode_params()
}

fn encode_u8(v: u8) -> Vec<u8> {
    DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(v), 8)]).abi_encode_params()
}

fn with_token_calls(provider: StaticChainProvider, at: Address, name: &str, symbol: &str, decimals: u8) -> StaticChainProvider {
    provider
        .with_call_result(at, function_selector("name()").to_vec(), encode_string(name))
        .with_call_result(at, function_selector("symbol()").to_vec(), encode_string(symbol))
        .with_call_result(at, function_selector("decimals()").to_vec(), encode_u8(decimals))
}

fn verified_token_provider() -> StaticChainProvider {
    let provider = StaticChainProvider::new()
        .with_code(token_address(), token_code())
        .with_abi(token_address(), "FiatTokenV2", ERC20_ABI);
    with_token_calls(provider, token_address(), "USD Coin", "USDC", 6)
}

fn repository(
    provider: Arc<StaticChainProvider>,
    store: Arc<MemoryStore>,
    config: RepositoryConfig,
) -> SemanticsRepository {
    SemanticsRepository::new(
        store as Arc<dyn MetadataStore>,
        Arc::clone(&provider) as Arc<dyn ChainDataProvider>,
        Some(provider as Arc<dyn AbiSource>),
        config,
    )
}

#[tokio::test]
async fn externally_owned_account_resolves_without_abi_lookup() {
    let provider = Arc::new(StaticChainProvider::new());
    let store = Arc::new(MemoryStore::new());
    let repo = repository(Arc::clone(&provider), Arc::clone(&store), RepositoryConfig::default());

    let eoa = Address::repeat_byte(0x11);
    let meta = repo.get_semantics(&chains::mainnet(), eoa).await;
    assert!(!meta.is_contract);
    assert_eq!(meta.contract.name, "EOA");
    assert_eq!(provider.abi_requests(), 0);
    assert_eq!(store.address_count(), 1);
    assert!(!repo.check_is_contract(&chains::mainnet(), eoa).await);
}

#[tokio::test]
async fn verified_erc20_is_classified_and_queried() {
    let provider = Arc::new(verified_token_provider());
    let store = Arc::new(MemoryStore::new());
    let repo = repository(Arc::clone(&provider), Arc::clone(&store), RepositoryConfig::default());
    let chain = chains::mainnet();

    let meta = repo.get_semantics(&chain, token_address()).await;
    assert!(meta.is_contract);
    assert_eq!(meta.name, "FiatTokenV2");
    assert_eq!(meta.contract.code_hash, keccak256(token_code()));
    assert_eq!(meta.standard, Some(TokenStandard::Erc20));
    assert_eq!(
        repo.get_token_identity(&chain, token_address()).await,
        Some(TokenIdentity {
            name: "USD Coin".into(),
            symbol: "USDC".into(),
            decimals: 6
        })
    );
    assert_eq!(repo.get_address_label(&chain, token_address(), &TokenProxyMap::new()).await, "USDC");

    let transfer = repo.get_function_abi(&chain, token_address(), "0xa9059cbb").await.unwrap();
    assert_eq!(transfer.name, "transfer");
    let topic = topic_hex(&event_topic("Transfer(address,address,uint256)"));
    assert_eq!(repo.get_event_abi(&chain, token_address(), &topic).await.unwrap().name, "Transfer");
    assert!(repo.get_function_abi(&chain, token_address(), "0xdeadbeef").await.is_none());

    // Written back: contract by code hash, then address.
    let stored = repo.get_raw_semantics(&chain, token_address()).unwrap().unwrap();
    assert_eq!(stored.erc20.unwrap().symbol, "USDC");
}

#[tokio::test]
async fn failed_metadata_calls_fall_back_to_contract_name() {
    let provider = Arc::new(
        StaticChainProvider::new()
            .with_code(token_address(), token_code())
            .with_abi(token_address(), "MysteryToken", ERC20_ABI),
    );
    let repo = repository(provider, Arc::new(MemoryStore::new()), RepositoryConfig::default());

    let identity = repo.get_token_identity(&chains::mainnet(), token_address()).await.unwrap();
    assert_eq!(identity.name, "MysteryToken");
    assert_eq!(identity.symbol, "MysteryToken");
    assert_eq!(identity.decimals, 18);
}

#[tokio::test]
async fn concurrent_lookups_resolve_once() {
    let provider = Arc::new(verified_token_provider().with_latency(Duration::from_millis(50)));
    let repo = Arc::new(repository(
        Arc::clone(&provider),
        Arc::new(MemoryStore::new()),
        RepositoryConfig::default(),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.get_semantics(&chains::mainnet(), token_address()).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().standard, Some(TokenStandard::Erc20));
    }
    assert_eq!(provider.code_requests(), 1);
    assert_eq!(provider.abi_requests(), 1);
}

#[tokio::test]
async fn store_hits_skip_the_network() {
    let provider = Arc::new(verified_token_provider());
    let store = Arc::new(MemoryStore::new());
    let chain = chains::mainnet();

    let first = repository(Arc::clone(&provider), Arc::clone(&store), RepositoryConfig::default());
    first.get_semantics(&chain, token_address()).await;
    assert_eq!(provider.code_requests(), 1);

    // A fresh repository (cold cache) over the same store.
    let second = repository(Arc::clone(&provider), store, RepositoryConfig::default());
    let meta = second.get_semantics(&chain, token_address()).await;
    assert_eq!(meta.erc20.as_ref().unwrap().decimals, 6);
    assert_eq!(provider.code_requests(), 1);
}

#[tokio::test]
async fn invalidation_reruns_the_resolution_chain() {
    let provider = Arc::new(verified_token_provider());
    let repo = repository(Arc::clone(&provider), Arc::new(MemoryStore::new()), RepositoryConfig::default());
    let chain = chains::mainnet();

    repo.get_semantics(&chain, token_address()).await;
    repo.get_function_abi(&chain, token_address(), "0xa9059cbb").await;
    assert_eq!((provider.code_requests(), provider.abi_requests()), (1, 1));

    repo.get_semantics(&chain, token_address()).await;
    assert_eq!(provider.code_requests(), 1);

    repo.invalidate(&chain, token_address());
    repo.get_function_abi(&chain, token_address(), "0xa9059cbb").await.unwrap();
    assert_eq!((provider.code_requests(), provider.abi_requests()), (2, 2));
}

#[tokio::test]
async fn upstream_outage_degrades_without_persisting() {
    let provider = Arc::new(verified_token_provider());
    let store = Arc::new(MemoryStore::new());
    let repo = repository(Arc::clone(&provider), Arc::clone(&store), RepositoryConfig::default());
    let chain = chains::mainnet();

    provider.set_unavailable(token_address(), true);
    let degraded = repo.get_semantics(&chain, token_address()).await;
    assert!(!degraded.is_contract);
    assert!(degraded.standard.is_none());
    assert!(degraded.contract.functions.is_empty());
    assert!(repo.get_function_abi(&chain, token_address(), "0xa9059cbb").await.is_none());
    assert_eq!(store.address_count(), 0);

    provider.set_unavailable(token_address(), false);
    let recovered = repo.get_semantics(&chain, token_address()).await;
    assert_eq!(recovered.standard, Some(TokenStandard::Erc20));
    assert!(repo.get_function_abi(&chain, token_address(), "0xa9059cbb").await.is_some());
    assert_eq!(store.address_count(), 1);
}

#[tokio::test]
async fn slow_upstream_times_out_to_unknown_contract() {
    let provider = Arc::new(verified_token_provider().with_latency(Duration::from_millis(200)));
    let store = Arc::new(MemoryStore::new());
    let repo = repository(
        provider,
        Arc::clone(&store),
        RepositoryConfig {
            upstream_timeout: Duration::from_millis(20),
        },
    );

    let meta = repo.get_semantics(&chains::mainnet(), token_address()).await;
    assert!(meta.erc20.is_none());
    assert!(!meta.is_contract);
    assert_eq!(store.address_count(), 0);
}

#[tokio::test]
async fn abi_source_outage_keeps_fetched_code_as_contract() {
    let contract = Address::repeat_byte(0x44);
    let provider = Arc::new(StaticChainProvider::new().with_code(contract, vec![0x60, 0x80]));
    let config = RepositoryConfig::default();
    let store = Arc::new(MemoryStore::new());
    let offline_abi = Arc::new(StaticChainProvider::new());
    offline_abi.set_unavailable(contract, true);
    let repo = SemanticsRepository::new(
        Arc::clone(&store) as Arc<dyn MetadataStore>,
        Arc::clone(&provider) as Arc<dyn ChainDataProvider>,
        Some(offline_abi as Arc<dyn AbiSource>),
        config,
    );

    let meta = repo.get_semantics(&chains::mainnet(), contract).await;
    assert!(meta.is_contract);
    assert_eq!(meta.contract.code_hash, keccak256([0x60, 0x80]));
    assert_eq!(store.address_count(), 0);
}

#[tokio::test]
async fn manual_edit_during_resolution_is_not_overwritten() {
    let provider = Arc::new(verified_token_provider().with_latency(Duration::from_millis(100)));
    let store = Arc::new(MemoryStore::new());
    let repo = Arc::new(repository(Arc::clone(&provider), Arc::clone(&store), RepositoryConfig::default()));
    let chain = chains::mainnet();

    let in_flight = tokio::spawn({
        let repo = Arc::clone(&repo);
        let chain = chain.clone();
        async move { repo.get_semantics(&chain, token_address()).await }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    let mut edited = AddressMetadata::unknown_contract(chain.as_str(), token_address(), keccak256(token_code()));
    edited.name = "Manually Edited".into();
    repo.update_semantics(&edited).unwrap();

    let seen = in_flight.await.unwrap();
    assert_eq!(seen.name, "Manually Edited");
    let persisted = repo.get_raw_semantics(&chain, token_address()).unwrap().unwrap();
    assert_eq!(persisted.name, "Manually Edited");
    assert_eq!(repo.get_semantics(&chain, token_address()).await.name, "Manually Edited");
}

#[tokio::test]
async fn invalidation_during_resolution_leaves_nothing_persisted() {
    let provider = Arc::new(verified_token_provider().with_latency(Duration::from_millis(100)));
    let store = Arc::new(MemoryStore::new());
    let repo = Arc::new(repository(Arc::clone(&provider), Arc::clone(&store), RepositoryConfig::default()));
    let chain = chains::mainnet();

    let in_flight = tokio::spawn({
        let repo = Arc::clone(&repo);
        let chain = chain.clone();
        async move { repo.get_semantics(&chain, token_address()).await }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    repo.invalidate(&chain, token_address());

    let seen = in_flight.await.unwrap();
    assert_eq!(seen.name, "FiatTokenV2");
    assert!(repo.get_raw_semantics(&chain, token_address()).unwrap().is_none());
    assert_eq!(store.address_count(), 0);

    // A fresh lookup after the invalidation persists normally.
    repo.get_semantics(&chain, token_address()).await;
    assert_eq!(store.address_count(), 1);
}

#[tokio::test]
async fn bytecode_heuristic_detects_unverified_tokens() {
    let mut code = vec![0x60, 0x80];
    for sig in ["transfer(address,uint256)", "transferFrom(address,address,uint256)", "approve(address,uint256)"] {
        code.push(0x63);
        code.extend_from_slice(&function_selector(sig));
    }
    for sig in ["Transfer(address,address,uint256)", "Approval(address,address,uint256)"] {
        code.push(0x7f);
        code.extend_from_slice(event_topic(sig).as_slice());
    }
    let token = Address::repeat_byte(0x70);
    let silent = Address::repeat_byte(0x71);
    let provider = StaticChainProvider::new()
        .with_code(token, code.clone())
        .with_code(silent, code);
    let provider = Arc::new(with_token_calls(provider, token, "Wrapped Thing", "WTH", 8));
    let repo = repository(provider, Arc::new(MemoryStore::new()), RepositoryConfig::default());
    let chain = chains::mainnet();

    let meta = repo.get_semantics(&chain, token).await;
    assert_eq!(meta.standard, Some(TokenStandard::Erc20));
    assert_eq!(meta.erc20.as_ref().unwrap().symbol, "WTH");
    assert_eq!(meta.erc20.as_ref().unwrap().decimals, 8);

    // Same bytecode, but the metadata calls revert: not a token.
    let meta = repo.get_semantics(&chain, silent).await;
    assert!(meta.standard.is_none());
    assert_eq!(meta.name, chaintrace_core::address_hex(&silent));
}

#[tokio::test]
async fn token_data_and_labels_follow_proxies() {
    let provider = Arc::new(StaticChainProvider::new().with_code(Address::repeat_byte(0x50), vec![0x01]));
    let repo = repository(provider, Arc::new(MemoryStore::new()), RepositoryConfig::default());
    let chain = chains::mainnet();
    let proxy = Address::repeat_byte(0x50);

    let unknown = repo.get_token_data(&chain, proxy, &TokenProxyMap::new()).await;
    assert_eq!(unknown.symbol, "Unknown");
    assert_eq!(unknown.decimals, 18);
    assert_eq!(unknown.name, chaintrace_core::address_hex(&proxy));

    let mut proxies = TokenProxyMap::new();
    proxies.insert(
        proxy,
        TokenIdentity {
            name: "USD Coin".into(),
            symbol: "USDC".into(),
            decimals: 6,
        },
    );
    assert_eq!(repo.get_token_data(&chain, proxy, &proxies).await.decimals, 6);
    assert_eq!(repo.get_address_label(&chain, proxy, &proxies).await, "USDC_proxy");
}

#[tokio::test]
async fn amendments_apply_on_every_return() {
    let provider = Arc::new(verified_token_provider());
    let store = Arc::new(MemoryStore::new());
    let mut amendments = Amendments::new();
    amendments.insert(
        keccak256(token_code()),
        ContractAmendment {
            name: Some("Centre FiatToken".into()),
            ..Default::default()
        },
    );
    let repo = repository(Arc::clone(&provider), Arc::clone(&store), RepositoryConfig::default())
        .with_amendments(amendments);
    let chain = chains::mainnet();

    let miss = repo.get_semantics(&chain, token_address()).await;
    let hit = repo.get_semantics(&chain, token_address()).await;
    assert_eq!(miss.contract.name, "Centre FiatToken");
    assert_eq!(hit.contract.name, "Centre FiatToken");
    assert_eq!(provider.code_requests(), 1);

    // The store keeps the unamended record.
    let raw = repo.get_raw_semantics(&chain, token_address()).unwrap().unwrap();
    assert_eq!(raw.contract.name, "FiatTokenV2");
}

#[tokio::test]
async fn manual_updates_replace_cached_metadata() {
    let provider = Arc::new(verified_token_provider());
    let repo = repository(Arc::clone(&provider), Arc::new(MemoryStore::new()), RepositoryConfig::default());
    let chain = chains::mainnet();

    let mut meta = (*repo.get_semantics(&chain, token_address()).await).clone();
    meta.name = "Circle USD".into();
    repo.update_semantics(&meta).unwrap();

    assert_eq!(repo.get_semantics(&chain, token_address()).await.name, "Circle USD");
    assert_eq!(provider.code_requests(), 1);
}

#[tokio::test]
async fn more_than_one_anonymous_event_is_ambiguous() {
    let contract = Address::repeat_byte(0x33);
    let provider = Arc::new(
        StaticChainProvider::new()
            .with_code(contract, vec![0x01])
            .with_abi(contract, "Logger", TWO_ANONYMOUS_ABI),
    );
    let repo = repository(provider, Arc::new(MemoryStore::new()), RepositoryConfig::default());

    let err = repo.get_anonymous_event_abi(&chains::mainnet(), contract).await.unwrap_err();
    assert!(matches!(err, DecoderError::AmbiguousSignature { candidates: 2, .. }));
    assert!(repo.get_anonymous_event_abi(&chains::mainnet(), token_address()).await.unwrap().is_none());
}
