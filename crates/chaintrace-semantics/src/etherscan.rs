//! Verified ABIs from Etherscan-compatible block explorers.
//!
//! # Feature Flag
//! This module requires the `remote` feature flag (enables `reqwest`).
//!
//! ```toml
//! chaintrace-semantics = { version = "0.1", features = ["remote"] }
//! ```

use alloy_primitives::Address;
use async_trait::async_trait;
use chaintrace_core::{
    address_hex,
    chain::ChainId,
    error::ProviderError,
    provider::{AbiSource, VerifiedAbi},
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};
use tracing::debug;

const SERVICE: &str = "etherscan";
const NOT_VERIFIED: &str = "Contract source code not verified";

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    /// An array of source entries on success, an error string otherwise.
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    #[serde(rename = "ABI", default)]
    abi: String,
    #[serde(rename = "ContractName", default)]
    contract_name: String,
}

/// Explorer API endpoints by chain slug.
pub fn default_base_urls() -> HashMap<String, String> {
    [
        ("mainnet", "https://api.etherscan.io/api"),
        ("sepolia", "https://api-sepolia.etherscan.io/api"),
        ("goerli", "https://api-goerli.etherscan.io/api"),
        ("arbitrum", "https://api.arbiscan.io/api"),
        ("optimism", "https://api-optimistic.etherscan.io/api"),
        ("base", "https://api.basescan.org/api"),
        ("polygon", "https://api.polygonscan.com/api"),
    ]
    .into_iter()
    .map(|(slug, url)| (slug.to_string(), url.to_string()))
    .collect()
}

pub struct EtherscanSource {
    client: Client,
    base_urls: HashMap<String, String>,
    api_key: Option<String>,
}

impl EtherscanSource {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("chaintrace/0.1")
            .build()
            .map_err(|e| ProviderError::Unavailable {
                service: SERVICE.into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_urls: default_base_urls(),
            api_key,
        })
    }

    /// Override or add the explorer endpoint for one chain.
    pub fn with_base_url(mut self, chain_slug: impl Into<String>, url: impl Into<String>) -> Self {
        self.base_urls.insert(chain_slug.into(), url.into());
        self
    }

    fn unavailable(reason: impl Into<String>) -> ProviderError {
        ProviderError::Unavailable {
            service: SERVICE.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AbiSource for EtherscanSource {
    async fn get_verified_abi(
        &self,
        chain: &ChainId,
        address: Address,
    ) -> Result<Option<VerifiedAbi>, ProviderError> {
        let Some(base) = self.base_urls.get(chain.as_str()) else {
            debug!(chain = %chain, "no explorer configured for chain");
            return Ok(None);
        };
        let address = address_hex(&address);
        let mut query = vec![
            ("module", "contract"),
            ("action", "getsourcecode"),
            ("address", address.as_str()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.as_str()));
        }

        let resp = self
            .client
            .get(base)
            .query(&query)
            .send()
            .await
            .map_err(|e| Self::unavailable(e.to_string()))?;
        match resp.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(Self::unavailable("rate limited")),
            other => return Err(Self::unavailable(format!("HTTP {other}"))),
        }
        let body: EtherscanResponse = resp.json().await.map_err(|e| Self::unavailable(e.to_string()))?;
        parse_response(body)
    }
}

fn parse_response(body: EtherscanResponse) -> Result<Option<VerifiedAbi>, ProviderError> {
    if body.status != "1" {
        let detail = body.result.as_str().unwrap_or(&body.message).to_string();
        if detail.contains(NOT_VERIFIED) {
            return Ok(None);
        }
        if detail.to_ascii_lowercase().contains("rate limit") {
            return Err(EtherscanSource::unavailable(format!("rate limited: {detail}")));
        }
        return Err(EtherscanSource::unavailable(detail));
    }
    let entries: Vec<SourceEntry> =
        serde_json::from_value(body.result).map_err(|e| EtherscanSource::unavailable(e.to_string()))?;
    let Some(entry) = entries.into_iter().next() else {
        return Ok(None);
    };
    if entry.abi.is_empty() || entry.abi == NOT_VERIFIED {
        return Ok(None);
    }
    Ok(Some(VerifiedAbi {
        contract_name: entry.contract_name,
        abi: entry.abi,
    }))
}
