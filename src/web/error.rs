//! API error responses and the mapping from core failures to HTTP status.

use crate::pricing::ResolveError;
use crate::rate_api::RateApiError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// An HTTP-facing error: status code plus a client-safe message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Map a resolution failure to its HTTP shape, per the propagation policy:
/// upstream timeouts are gateway timeouts, upstream outages and an open
/// breaker are 503s, contract breakage is a 502, lock contention without a
/// cached value asks the client to retry, and a dead store is a plain 500
/// rather than a silent loss of single-flight protection.
impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Upstream(RateApiError::Timeout(_)) => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                "Pricing service timeout, please retry",
            ),
            ResolveError::Upstream(RateApiError::Server { .. })
            | ResolveError::Upstream(RateApiError::Network(_)) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Pricing service unavailable",
            ),
            ResolveError::BreakerOpen => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Pricing service unavailable",
            ),
            ResolveError::Upstream(RateApiError::Client { message, .. }) => {
                Self::new(StatusCode::BAD_GATEWAY, message)
            }
            ResolveError::Upstream(RateApiError::Protocol(_)) => Self::new(
                StatusCode::BAD_GATEWAY,
                "Invalid response from pricing service",
            ),
            ResolveError::Upstream(RateApiError::Generic(_)) => Self::new(
                StatusCode::BAD_GATEWAY,
                "Pricing service request failed",
            ),
            ResolveError::Busy => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily busy, please retry",
            ),
            ResolveError::Store(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Shared store unavailable",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::time::Duration;

    #[test]
    fn status_mapping_follows_propagation_policy() {
        let cases: Vec<(ResolveError, StatusCode)> = vec![
            (
                ResolveError::Upstream(RateApiError::Timeout(Duration::from_secs(5))),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ResolveError::Upstream(RateApiError::Server { status: 500 }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ResolveError::Upstream(RateApiError::Network("refused".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ResolveError::BreakerOpen, StatusCode::SERVICE_UNAVAILABLE),
            (
                ResolveError::Upstream(RateApiError::Client {
                    status: 422,
                    message: "unknown hotel".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ResolveError::Upstream(RateApiError::Protocol("no rates".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (ResolveError::Busy, StatusCode::SERVICE_UNAVAILABLE),
            (
                ResolveError::Store(StoreError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
