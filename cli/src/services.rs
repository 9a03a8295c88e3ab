//! Wiring of store, node, ABI source and decoder from the CLI configuration.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use chaintrace_core::{
    fixture::{ChainFixture, StaticChainProvider},
    provider::{AbiSource, ChainDataProvider, MetadataStore, PriceFeed},
};
use chaintrace_decoder::{DecoderConfig, TransactionDecoder};
use chaintrace_observability::DecoderMetrics;
use chaintrace_semantics::{Amendments, EtherscanSource, MemoryStore, RepositoryConfig, SemanticsRepository, SqliteStore};
use std::{path::Path, sync::Arc};
use tracing::info;

pub struct Services {
    pub node: Arc<StaticChainProvider>,
    pub repo: Arc<SemanticsRepository>,
    /// Transaction hashes contained in the loaded bundle, in file order.
    pub bundled_hashes: Vec<String>,
}

/// Offline chain data from a fixture bundle; an empty node without one.
pub fn load_fixture(path: Option<&Path>) -> Result<(StaticChainProvider, Vec<String>)> {
    let Some(path) = path else {
        return Ok((StaticChainProvider::new(), Vec::new()));
    };
    let content = std::fs::read_to_string(path).with_context(|| format!("reading fixture {}", path.display()))?;
    let fixture: ChainFixture =
        serde_json::from_str(&content).with_context(|| format!("parsing fixture {}", path.display()))?;
    let hashes = fixture
        .transactions
        .iter()
        .map(|tx| tx.transaction.hash.to_string())
        .collect();
    Ok((StaticChainProvider::from_fixture(fixture), hashes))
}

fn store(config: &AppConfig) -> Result<Arc<dyn MetadataStore>> {
    match &config.sqlite_path {
        Some(path) => {
            let store = SqliteStore::open(path).with_context(|| format!("opening semantics db {}", path.display()))?;
            info!(path = %path.display(), "using sqlite semantics store");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Etherscan when configured with a key, else the bundle's own ABIs.
fn abi_source(config: &AppConfig, node: &Arc<StaticChainProvider>) -> Result<Arc<dyn AbiSource>> {
    let Some(etherscan) = config.etherscan.as_ref().filter(|e| e.api_key.is_some()) else {
        return Ok(Arc::clone(node) as Arc<dyn AbiSource>);
    };
    let mut source = EtherscanSource::new(etherscan.api_key.clone(), config.upstream_timeout())
        .context("building Etherscan client")?;
    for (chain, url) in &etherscan.base_urls {
        source = source.with_base_url(chain.clone(), url.clone());
    }
    info!("using Etherscan ABI source");
    Ok(Arc::new(source))
}

pub fn build(config: &AppConfig, fixture: Option<&Path>) -> Result<Services> {
    let (node, bundled_hashes) = load_fixture(fixture)?;
    let node = Arc::new(node);

    let mut repo = SemanticsRepository::new(
        store(config)?,
        Arc::clone(&node) as Arc<dyn ChainDataProvider>,
        Some(abi_source(config, &node)?),
        RepositoryConfig {
            upstream_timeout: config.upstream_timeout(),
        },
    );
    if let Some(path) = &config.amendments_path {
        let amendments =
            Amendments::load(path).with_context(|| format!("loading amendments {}", path.display()))?;
        info!(count = amendments.len(), "loaded contract amendments");
        repo = repo.with_amendments(amendments);
    }

    Ok(Services {
        node,
        repo: Arc::new(repo),
        bundled_hashes,
    })
}

impl Services {
    pub fn decoder(&self, config: &AppConfig) -> TransactionDecoder {
        let decoder_config = DecoderConfig {
            upstream_timeout: config.upstream_timeout(),
            price_ttl: config.price_ttl(),
            ..DecoderConfig::default()
        };
        TransactionDecoder::new(
            Arc::clone(&self.node) as Arc<dyn ChainDataProvider>,
            Arc::clone(&self.repo),
            decoder_config,
        )
        .with_price_feed(Arc::clone(&self.node) as Arc<dyn PriceFeed>)
        .with_metrics(DecoderMetrics::global())
    }
}
