//! Error types for the pricing API client.

use crate::breaker::BreakerClassify;

/// A single upstream call's failure, classified by what it says about the
/// caller, the contract, and the upstream's health.
#[derive(Debug, thiserror::Error)]
pub enum RateApiError {
    /// The per-call deadline elapsed before a response arrived.
    #[error("upstream request hit the {0:?} timeout")]
    Timeout(std::time::Duration),
    /// The upstream rejected the request (HTTP 4xx).
    #[error("upstream rejected the request ({status}): {message}")]
    Client { status: u16, message: String },
    /// The upstream failed internally (HTTP 5xx).
    #[error("upstream server error ({status})")]
    Server { status: u16 },
    /// DNS, socket, or connection failure before any HTTP exchange.
    #[error("network failure reaching upstream: {0}")]
    Network(String),
    /// HTTP 200 whose body does not match the contract shape.
    #[error("malformed upstream response: {0}")]
    Protocol(String),
    /// Anything that fits none of the above.
    #[error("upstream call failed: {0}")]
    Generic(String),
}

impl BreakerClassify for RateApiError {
    /// Only infrastructure failures are evidence of upstream ill-health.
    /// `Client` and `Protocol` mean the upstream answered; counting them
    /// would trip the breaker on our own contract bugs.
    fn counts_against_breaker(&self) -> bool {
        matches!(
            self,
            RateApiError::Timeout(_) | RateApiError::Server { .. } | RateApiError::Network(_)
        )
    }
}
