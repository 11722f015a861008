//! Shared fixtures: a scripted upstream source and an app wired onto the
//! in-process store.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use concierge::breaker::{BreakerConfig, CircuitBreaker};
use concierge::pricing::{CacheTtls, PricingCoordinator, RateQuery};
use concierge::rate_api::{RateApiError, RateSource};
use concierge::state::AppState;
use concierge::store::lock::{DistributedLock, LockConfig};
use concierge::store::MemoryStore;
use concierge::web::create_router;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tower::ServiceExt;

type Responder = Box<dyn Fn(&RateQuery) -> Result<String, RateApiError> + Send + Sync>;

/// A scripted stand-in for the upstream pricing API.
pub struct StubRateSource {
    calls: AtomicU32,
    delay: Option<Duration>,
    responder: Responder,
}

impl StubRateSource {
    pub fn with(
        responder: impl Fn(&RateQuery) -> Result<String, RateApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay: None,
            responder: Box::new(responder),
        })
    }

    /// Always returns the same rate.
    pub fn fixed(rate: &'static str) -> Arc<Self> {
        Self::with(move |_| Ok(rate.to_string()))
    }

    /// Returns the same rate after a delay, to widen the single-flight
    /// race window.
    pub fn slow(rate: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay: Some(delay),
            responder: Box::new(move |_| Ok(rate.to_string())),
        })
    }

    /// Always fails with the error the closure builds.
    pub fn failing(err: impl Fn() -> RateApiError + Send + Sync + 'static) -> Arc<Self> {
        Self::with(move |_| Err(err()))
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for StubRateSource {
    async fn fetch_rate(&self, query: &RateQuery) -> Result<String, RateApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(query)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub source: Arc<StubRateSource>,
}

/// Lock tuning for tests: production cadence scaled down so contention
/// resolves in milliseconds.
pub fn fast_lock() -> LockConfig {
    LockConfig {
        hold_ttl: Duration::from_secs(10),
        wait_budget: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
    }
}

pub fn test_app(source: Arc<StubRateSource>) -> TestApp {
    test_app_with(source, fast_lock())
}

pub fn test_app_with(source: Arc<StubRateSource>, lock: LockConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()));
    let coordinator = Arc::new(PricingCoordinator::new(
        store.clone(),
        source.clone(),
        breaker.clone(),
        DistributedLock::new(store.clone(), lock),
        CacheTtls {
            fresh: Duration::from_secs(300),
            stale: Duration::from_secs(1800),
        },
    ));
    let router = create_router(AppState::new(coordinator, store.clone(), breaker));
    TestApp {
        router,
        store,
        source,
    }
}

/// Issue a GET against the router and decode the JSON body.
pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::get(uri)
                .body(Body::empty())
                .expect("request construction"),
        )
        .await
        .expect("router never errors");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, json)
}
