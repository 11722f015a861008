//! Environment-driven configuration.
//!
//! Every tunable is a plain environment variable extracted through figment,
//! so deployments override only what they need. Defaults match the upstream
//! contract: rates are valid for five minutes, and the stale tier outlives
//! the fresh tier to support degraded mode.

use crate::breaker::BreakerConfig;
use crate::pricing::CacheTtls;
use crate::store::lock::LockConfig;
use serde::Deserialize;
use std::time::Duration;

fn default_rate_api_url() -> String {
    "http://rate-api:3001".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    5
}

fn default_fresh_ttl_secs() -> u64 {
    5 * 60
}

fn default_stale_ttl_secs() -> u64 {
    30 * 60
}

fn default_lock_hold_secs() -> u64 {
    10
}

fn default_lock_wait_secs() -> u64 {
    5
}

fn default_lock_poll_ms() -> u64 {
    100
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_window_secs() -> u64 {
    30
}

fn default_breaker_min_observations() -> u32 {
    5
}

fn default_breaker_sleep_secs() -> u64 {
    30
}

fn default_breaker_success_threshold() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the upstream pricing API.
    #[serde(default = "default_rate_api_url")]
    pub rate_api_url: String,
    /// Shared API token sent as the `token` header, if the upstream requires one.
    #[serde(default)]
    pub rate_api_token: Option<String>,
    /// Address of the shared key-value store. When unset, an in-process
    /// store is used; suitable only for single-instance deployments.
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Hard per-call deadline for upstream requests.
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    /// TTL of the fresh cache tier. The upstream contract guarantees rates
    /// for five minutes; do not raise this past that window.
    #[serde(default = "default_fresh_ttl_secs")]
    pub fresh_ttl_secs: u64,
    /// TTL of the stale cache tier used for degraded mode.
    #[serde(default = "default_stale_ttl_secs")]
    pub stale_ttl_secs: u64,
    /// Auto-release TTL on the per-key fetch lock. Must exceed the upstream
    /// deadline with margin, or holders lose the lock mid-fetch.
    #[serde(default = "default_lock_hold_secs")]
    pub lock_hold_secs: u64,
    /// How long a resolver waits for the fetch lock before giving up.
    #[serde(default = "default_lock_wait_secs")]
    pub lock_wait_secs: u64,
    /// Poll cadence while waiting for the fetch lock.
    #[serde(default = "default_lock_poll_ms")]
    pub lock_poll_ms: u64,
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_breaker_window_secs")]
    pub breaker_window_secs: u64,
    #[serde(default = "default_breaker_min_observations")]
    pub breaker_min_observations: u32,
    #[serde(default = "default_breaker_sleep_secs")]
    pub breaker_sleep_secs: u64,
    #[serde(default = "default_breaker_success_threshold")]
    pub breaker_success_threshold: u32,
}

impl Config {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            fresh: Duration::from_secs(self.fresh_ttl_secs),
            stale: Duration::from_secs(self.stale_ttl_secs),
        }
    }

    pub fn lock(&self) -> LockConfig {
        LockConfig {
            hold_ttl: Duration::from_secs(self.lock_hold_secs),
            wait_budget: Duration::from_secs(self.lock_wait_secs),
            poll_interval: Duration::from_millis(self.lock_poll_ms),
        }
    }

    pub fn breaker(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            window: Duration::from_secs(self.breaker_window_secs),
            min_observations: self.breaker_min_observations,
            sleep_window: Duration::from_secs(self.breaker_sleep_secs),
            success_threshold: self.breaker_success_threshold,
        }
    }
}
