//! Native token price with a per-chain TTL cache.

use chaintrace_core::{
    chain::ChainId,
    provider::{with_timeout, PriceFeed},
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct CachedPriceFeed {
    feed: Arc<dyn PriceFeed>,
    ttl: Duration,
    timeout: Duration,
    quotes: Mutex<HashMap<String, (Instant, f64)>>,
}

impl CachedPriceFeed {
    pub fn new(feed: Arc<dyn PriceFeed>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            feed,
            ttl,
            timeout,
            quotes: Mutex::new(HashMap::new()),
        }
    }

    /// USD price of the chain's native token; `None` when the feed fails.
    /// Failures are not cached.
    pub async fn native_price_usd(&self, chain: &ChainId) -> Option<f64> {
        let mut quotes = self.quotes.lock().await;
        if let Some((fetched, price)) = quotes.get(chain.as_str()) {
            if fetched.elapsed() < self.ttl {
                return Some(*price);
            }
        }
        debug!(chain = %chain, "refreshing native price");
        match with_timeout("price", self.timeout, self.feed.native_token_price_usd(chain)).await {
            Ok(price) => {
                quotes.insert(chain.slug.clone(), (Instant::now(), price));
                Some(price)
            }
            Err(e) => {
                warn!(chain = %chain, error = %e, "native price unavailable");
                None
            }
        }
    }
}
