//! Stale-while-revalidate caching decorator.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::QueryExecutor;
use crate::backend::Request;
use crate::cache::{CacheStats, QueryCache};
use crate::cancel::CancellationToken;
use crate::config::NetworkConfig;
use crate::error::Result;

/// Decorates another executor with a bounded LRU result cache.
///
/// Fresh entries are served without touching the backend. Stale entries are
/// still served immediately; the probe that finds one schedules a detached
/// refresh task which fetches new values under its own timeout, so no caller
/// ever waits on a refresh. Failed foreground fetches are negatively cached
/// as an empty result.
///
/// `capacity` at or below zero disables caching; every call then passes
/// straight through.
pub struct CachingExecutor<E> {
    inner: Arc<E>,
    cache: Option<Arc<QueryCache>>,
    shutdown: CancellationToken,
}

impl<E: QueryExecutor + 'static> CachingExecutor<E> {
    /// Wrap `inner` with a cache bounded to `capacity` entries.
    pub fn new(inner: E, capacity: i64) -> Self {
        let cache = if capacity > 0 {
            Some(Arc::new(QueryCache::new(capacity as usize)))
        } else {
            None
        };
        Self {
            inner: Arc::new(inner),
            cache,
            shutdown: CancellationToken::new(),
        }
    }

    /// Counters for the underlying cache; all zero when caching is disabled.
    pub fn stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }

    /// Drop every cached entry without closing the executor.
    ///
    /// The escape hatch for callers that mutated the backing table and need
    /// read-after-write consistency before the staleness window elapses.
    /// Refreshes claimed before the purge settle without writing.
    pub fn purge(&self) {
        if let Some(cache) = &self.cache {
            cache.purge();
        }
    }

    fn spawn_refresh(
        &self,
        cache: &Arc<QueryCache>,
        cache_key: &str,
        request: &Request,
        generation: u64,
    ) {
        let cache = Arc::clone(cache);
        let inner = Arc::clone(&self.inner);
        let token = self.shutdown.child_token();
        let key = cache_key.to_owned();
        let request = request.clone();
        tokio::spawn(async move {
            let outcome =
                timeout(NetworkConfig::REFRESH_TIMEOUT, inner.query(&key, &request)).await;
            if token.is_cancelled() {
                debug!("Dropping refresh for '{}' after shutdown", key);
                return;
            }
            match outcome {
                Ok(Ok(values)) => {
                    cache.refresh_complete(&key, values, generation);
                    debug!("Refreshed cached result for '{}'", key);
                }
                Ok(Err(err)) => {
                    cache.refresh_failed(&key, generation);
                    warn!("Background refresh for '{}' failed: {}", key, err);
                }
                Err(_) => {
                    cache.refresh_failed(&key, generation);
                    warn!(
                        "Background refresh for '{}' timed out after {:?}",
                        key,
                        NetworkConfig::REFRESH_TIMEOUT
                    );
                }
            }
        });
    }
}

#[async_trait]
impl<E: QueryExecutor + 'static> QueryExecutor for CachingExecutor<E> {
    async fn query(&self, cache_key: &str, request: &Request) -> Result<Vec<String>> {
        let Some(cache) = &self.cache else {
            return self.inner.query(cache_key, request).await;
        };

        if let Some(hit) = cache.probe(cache_key) {
            if hit.refresh_due {
                debug!("Cached result for '{}' is stale, scheduling refresh", cache_key);
                self.spawn_refresh(cache, cache_key, request, hit.generation);
            }
            return Ok(hit.values);
        }

        // Miss: fetch in the caller's scope. The outcome is cached either
        // way; a failed fetch leaves an empty entry so a broken backend is
        // not hammered once per caller.
        match self.inner.query(cache_key, request).await {
            Ok(values) => {
                cache.store(cache_key, values.clone());
                Ok(values)
            }
            Err(err) => {
                cache.store(cache_key, Vec::new());
                Err(err)
            }
        }
    }

    async fn exec(&self, request: &Request) -> Result<Vec<u64>> {
        self.inner.exec(request).await
    }

    fn close(&self) {
        self.shutdown.cancel();
        if let Some(cache) = &self.cache {
            cache.close();
        }
        self.inner.close();
    }
}
