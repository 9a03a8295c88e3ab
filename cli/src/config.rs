//! `chaintrace.yaml`: optional CLI configuration.
//!
//! ```yaml
//! log:
//!   level: info
//!   components: { chaintrace_semantics: debug }
//!   json: false
//! sqlite_path: ./semantics.db
//! etherscan:
//!   api_key: ABC123
//!   base_urls: { mainnet: "https://api.etherscan.io/api" }
//! upstream_timeout_secs: 10
//! price_ttl_secs: 60
//! amendments_path: ./amendments.yaml
//! ```

use anyhow::{Context, Result};
use chaintrace_observability::LogConfig;
use serde::Deserialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

pub const ETHERSCAN_KEY_ENV: &str = "CHAINTRACE_ETHERSCAN_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EtherscanConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// chain slug → explorer API endpoint
    #[serde(default)]
    pub base_urls: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    #[serde(default)]
    pub etherscan: Option<EtherscanConfig>,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "default_price_ttl")]
    pub price_ttl_secs: u64,
    #[serde(default)]
    pub amendments_path: Option<PathBuf>,
}

fn default_upstream_timeout() -> u64 {
    10
}

fn default_price_ttl() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            sqlite_path: None,
            etherscan: None,
            upstream_timeout_secs: default_upstream_timeout(),
            price_ttl_secs: default_price_ttl(),
            amendments_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("parsing configuration")
    }

    /// Load `path` if given (defaults otherwise), then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::from_yaml_str(&content).with_context(|| format!("in {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(std::env::var(ETHERSCAN_KEY_ENV).ok());
        Ok(config)
    }

    fn apply_env(&mut self, etherscan_key: Option<String>) {
        if let Some(key) = etherscan_key.filter(|k| !k.is_empty()) {
            self.etherscan.get_or_insert_with(EtherscanConfig::default).api_key = Some(key);
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }
}
