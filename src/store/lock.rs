//! Cross-process named locks over the shared store.
//!
//! Acquisition polls a set-if-absent claim until the wait budget runs out.
//! The hold TTL bounds how long a crashed holder can block other waiters;
//! a live holder that outruns it simply loses the lock, which the
//! coordinator tolerates because its cache double-check makes the
//! resulting duplicate fetch rare and non-corrupting.

use super::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use ulid::Ulid;

#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Auto-release TTL guarding against holder death.
    pub hold_ttl: Duration,
    /// How long `acquire` keeps polling before giving up.
    pub wait_budget: Duration,
    /// Poll cadence between claim attempts.
    pub poll_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock '{0}' unavailable within the wait budget")]
    Unavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct DistributedLock {
    store: Arc<dyn Store>,
    config: LockConfig,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn Store>, config: LockConfig) -> Self {
        Self { store, config }
    }

    /// Claim the named lock, polling until the wait budget is exhausted.
    pub async fn acquire(&self, name: &str) -> Result<LockGuard, LockError> {
        let token = Ulid::new().to_string();
        let started = Instant::now();
        let deadline = started + self.config.wait_budget;

        loop {
            if self
                .store
                .try_acquire(name, &token, self.config.hold_ttl)
                .await?
            {
                debug!(lock = name, waited = ?started.elapsed(), "lock acquired");
                return Ok(LockGuard {
                    store: self.store.clone(),
                    name: name.to_string(),
                    token,
                    released: false,
                });
            }

            if Instant::now() + self.config.poll_interval > deadline {
                return Err(LockError::Unavailable(name.to_string()));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// A held lock. Call [`release`](LockGuard::release) on the normal path;
/// if the guard is dropped instead (handler aborted, future cancelled),
/// a best-effort release is spawned so waiters do not sit out the full
/// hold TTL.
pub struct LockGuard {
    store: Arc<dyn Store>,
    name: String,
    token: String,
    released: bool,
}

impl LockGuard {
    pub async fn release(mut self) {
        self.released = true;
        match self.store.release(&self.name, &self.token).await {
            Ok(true) => debug!(lock = %self.name, "lock released"),
            // Expired under us: another waiter may already own it.
            Ok(false) => debug!(lock = %self.name, "lock expired before release"),
            Err(e) => warn!(lock = %self.name, error = %e, "failed to release lock"),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = self.store.clone();
        let name = std::mem::take(&mut self.name);
        let token = std::mem::take(&mut self.token);
        // Outside a runtime there is nothing to spawn on; the hold TTL
        // still bounds the leak.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = store.release(&name, &token).await;
            });
        }
    }
}
