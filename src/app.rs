use crate::breaker::CircuitBreaker;
use crate::config::Config;
use crate::pricing::PricingCoordinator;
use crate::rate_api::RateApi;
use crate::state::AppState;
use crate::store::lock::DistributedLock;
use crate::store::{MemoryStore, RedisStore, Store};
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

/// Main application struct containing all necessary components.
pub struct App {
    config: Config,
    state: AppState,
}

impl App {
    /// Create a new App instance with all necessary components initialized.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect the shared store. Multi-instance deployments must point
        // REDIS_URL at the same store, or single-flight is per-process only.
        let store: Arc<dyn Store> = match &config.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url)
                    .await
                    .context("Failed to connect to the shared store")?;
                Arc::new(store)
            }
            None => {
                warn!("REDIS_URL not set; using in-process store (single instance only)");
                Arc::new(MemoryStore::new())
            }
        };
        store
            .ping()
            .await
            .context("Shared store did not answer ping")?;

        let rate_api = RateApi::new(
            config.rate_api_url.clone(),
            config.rate_api_token.clone(),
            config.upstream_timeout(),
        )
        .context("Failed to create pricing API client")?;

        info!(
            rate_api_url = %config.rate_api_url,
            upstream_timeout = fmt_duration(config.upstream_timeout()),
            fresh_ttl = fmt_duration(config.cache_ttls().fresh),
            stale_ttl = fmt_duration(config.cache_ttls().stale),
            lock_hold = fmt_duration(config.lock().hold_ttl),
            "pricing pipeline configured"
        );

        let breaker = Arc::new(CircuitBreaker::new(config.breaker()));
        let coordinator = Arc::new(PricingCoordinator::new(
            store.clone(),
            Arc::new(rate_api),
            breaker.clone(),
            DistributedLock::new(store.clone(), config.lock()),
            config.cache_ttls(),
        ));

        let state = AppState::new(coordinator, store, breaker);
        Ok(App { config, state })
    }

    /// Run the HTTP server until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let router = create_router(self.state);
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .context("Failed to bind listener")?;

        info!(port = self.config.port, "listening for connections");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("Shutdown complete");
        Ok(())
    }
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
