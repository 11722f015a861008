//! Application state shared across request handlers.
//!
//! The breaker and the store client are process-wide singletons by
//! lifecycle, but they are constructed once in `App::new` and passed in
//! explicitly so tests can substitute their own.

use crate::breaker::CircuitBreaker;
use crate::pricing::PricingCoordinator;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Cache-coherence and single-flight orchestration for rate lookups.
    pub coordinator: Arc<PricingCoordinator>,
    /// Shared key-value store, exposed for health checks.
    pub store: Arc<dyn Store>,
    /// Upstream circuit breaker, exposed for health checks.
    pub breaker: Arc<CircuitBreaker>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<PricingCoordinator>,
        store: Arc<dyn Store>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            coordinator,
            store,
            breaker,
        }
    }
}
