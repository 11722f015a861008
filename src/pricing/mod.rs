//! Rate resolution: cache probe, cross-process single-flight, breaker-
//! guarded upstream fetch, dual-tier write.
//!
//! For any key, at most one instance fetches from the upstream per miss
//! episode: losers of the lock race either observe the winner's write at
//! the double-check or give up within the lock wait budget. The only
//! tolerated duplicate fetch is a holder outliving the lock hold TTL.

pub mod keys;

pub use keys::{Hotel, Period, RateQuery, Room};

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::rate_api::{RateApiError, RateSource};
use crate::store::lock::{DistributedLock, LockError};
use crate::store::{Namespace, Store, StoreError};
use crate::utils::fmt_duration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// TTLs for the two cache tiers. `stale` must outlive `fresh`, or degraded
/// mode has nothing to fall back on.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub fresh: Duration,
    pub stale: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Upstream(#[from] RateApiError),
    #[error("circuit breaker is open")]
    BreakerOpen,
    #[error("rate is being fetched by another instance")]
    Busy,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResolveError {
    /// Whether the edge should consult the stale tier before surfacing
    /// this error. Lock contention and store failures are not upstream
    /// outages; serving stale for them would mask real trouble.
    pub fn stale_eligible(&self) -> bool {
        matches!(self, ResolveError::Upstream(_) | ResolveError::BreakerOpen)
    }
}

pub struct PricingCoordinator {
    store: Arc<dyn Store>,
    source: Arc<dyn RateSource>,
    breaker: Arc<CircuitBreaker>,
    lock: DistributedLock,
    ttls: CacheTtls,
}

impl PricingCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn RateSource>,
        breaker: Arc<CircuitBreaker>,
        lock: DistributedLock,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            store,
            source,
            breaker,
            lock,
            ttls,
        }
    }

    /// Resolve the current rate for a query tuple.
    ///
    /// Fast path: a fresh cache hit returns immediately, with no logging
    /// and no lock traffic. Miss path: acquire the per-key lock, re-check
    /// the cache, then fetch through the breaker and write both tiers.
    pub async fn resolve(&self, query: &RateQuery) -> Result<String, ResolveError> {
        let key = query.cache_key();

        if let Some(value) = self.store.get(Namespace::Fresh, &key).await? {
            return Ok(value);
        }
        debug!(key, "fresh cache miss");

        let guard = match self.lock.acquire(&query.lock_name()).await {
            Ok(guard) => guard,
            Err(LockError::Unavailable(name)) => {
                warn!(lock = %name, "lock wait budget exhausted");
                // The holder may have finished while we were polling.
                return match self.store.get(Namespace::Fresh, &key).await? {
                    Some(value) => Ok(value),
                    None => Err(ResolveError::Busy),
                };
            }
            Err(LockError::Store(e)) => return Err(e.into()),
        };

        let result = self.fetch_and_fill(query, &key).await;
        guard.release().await;
        result
    }

    /// Read the stale tier for a query tuple. Used by the edge's degraded
    /// mode after `resolve` fails with an upstream or breaker error.
    pub async fn stale(&self, query: &RateQuery) -> Result<Option<String>, StoreError> {
        self.store.get(Namespace::Stale, &query.cache_key()).await
    }

    async fn fetch_and_fill(&self, query: &RateQuery, key: &str) -> Result<String, ResolveError> {
        // Double-check under the lock: the previous holder may have
        // refreshed the key while we waited.
        if let Some(value) = self.store.get(Namespace::Fresh, key).await? {
            debug!(key, "refreshed by another instance while waiting");
            return Ok(value);
        }

        info!(key, "fetching rate from upstream");
        let started = tokio::time::Instant::now();
        let value = match self.breaker.call(self.source.fetch_rate(query)).await {
            Ok(value) => value,
            Err(BreakerError::Open) => {
                debug!(key, "breaker open, upstream not called");
                return Err(ResolveError::BreakerOpen);
            }
            Err(BreakerError::Inner(e)) => {
                warn!(key, error = %e, "upstream fetch failed");
                return Err(ResolveError::Upstream(e));
            }
        };
        info!(key, duration = fmt_duration(started.elapsed()), "upstream fetch succeeded");

        // Both tiers are written before the value is returned; stale must
        // never lag fresh, or degraded mode loses its safety net.
        self.store
            .put(Namespace::Fresh, key, &value, self.ttls.fresh)
            .await?;
        self.store
            .put(Namespace::Stale, key, &value, self.ttls.stale)
            .await?;

        Ok(value)
    }
}
