//! Single-flight memoization over a sharded concurrent map.
//!
//! Each key owns an `Arc<OnceCell<V>>`. The shard lock is held only long
//! enough to clone that `Arc`; initialisation then runs on the cell, so
//! concurrent requests for one key await a single resolver while other keys
//! proceed untouched.

use dashmap::DashMap;
use std::{future::Future, hash::Hash, sync::Arc};
use tokio::sync::OnceCell;

pub struct SemanticsCache<K, V> {
    entries: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> Default for SemanticsCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> SemanticsCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved value for `key`, if initialisation has completed.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Return the cached value or run `resolve` exactly once among all
    /// concurrent callers. An `Err` leaves the cell empty, so the next caller
    /// resolves again.
    pub async fn get_or_try_resolve<F, Fut, E>(&self, key: K, resolve: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let cell = Arc::clone(&*self.entries.entry(key).or_default());
        cell.get_or_try_init(resolve).await.cloned()
    }

    /// Drop `key`. Returns whether an entry existed.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry whose key matches `pred`.
    pub fn invalidate_where(&self, pred: impl Fn(&K) -> bool) {
        self.entries.retain(|key, _| !pred(key));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
