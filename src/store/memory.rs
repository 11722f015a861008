//! In-process implementation of the shared store.
//!
//! Same TTL and lock semantics as the Redis backend, minus the process
//! boundary. Used when `REDIS_URL` is not configured (single-instance
//! deployments) and throughout the test suite.

use super::{Namespace, Store, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

struct Stored {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Stored>,
    locks: DashMap<String, Stored>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<String>, StoreError> {
        let qualified = ns.qualify(key);
        if let Some(entry) = self.entries.get(&qualified) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Expired entries are dropped lazily on the next read.
        self.entries
            .remove_if(&qualified, |_, e| e.expires_at <= Instant::now());
        Ok(None)
    }

    async fn put(
        &self,
        ns: Namespace,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries.insert(
            ns.qualify(key),
            Stored {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn try_acquire(
        &self,
        name: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.locks.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return Ok(false);
                }
                occupied.insert(Stored {
                    value: token.to_string(),
                    expires_at: now + ttl,
                });
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Stored {
                    value: token.to_string(),
                    expires_at: now + ttl,
                });
                Ok(true)
            }
        }
    }

    async fn release(&self, name: &str, token: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let removed = self
            .locks
            .remove_if(name, |_, held| held.value == token && held.expires_at > now);
        Ok(removed.is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
