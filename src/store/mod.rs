//! Shared key-value store behind the cache and the cross-process lock.
//!
//! The store is the single shared mutable resource in the system. TTLs are
//! enforced by the store itself, never by callers, so clock skew between
//! instances cannot shorten or extend an entry's life. When the store is
//! unreachable the caller gets an error; locking is never bypassed, because
//! doing so would silently restore the thundering-herd pathology.

pub mod lock;
pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use async_trait::async_trait;
use std::time::Duration;

/// The two TTL tiers kept for every cached rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Values that still satisfy the upstream freshness contract.
    Fresh,
    /// Longer-lived copies served during degraded mode.
    Stale,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Fresh => "fresh:",
            Namespace::Stale => "stale:",
        }
    }

    pub fn qualify(&self, key: &str) -> String {
        format!("{}{}", self.prefix(), key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("shared store error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("shared store unavailable: {0}")]
    Unavailable(String),
}

/// Backend abstraction over the shared store.
///
/// Two implementations exist: [`RedisStore`] for multi-instance deployments
/// and [`MemoryStore`] for single-process use and tests. Both enforce TTLs
/// on read and give the lock primitives set-if-absent semantics with an
/// owner token checked on release.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read a value, honoring its TTL. `None` means absent or expired.
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value with a TTL. Concurrent writers are last-writer-wins.
    async fn put(
        &self,
        ns: Namespace,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Claim the named lock for `ttl` if nobody holds it. Returns whether
    /// the claim succeeded. The token identifies the owner for release.
    async fn try_acquire(&self, name: &str, token: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Release the named lock if `token` still owns it. Returns `false`
    /// when the lock already expired or was claimed by someone else.
    async fn release(&self, name: &str, token: &str) -> Result<bool, StoreError>;

    /// Liveness check against the backend.
    async fn ping(&self) -> Result<(), StoreError>;
}
