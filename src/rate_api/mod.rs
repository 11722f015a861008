//! HTTP client for the upstream pricing API.
//!
//! One POST per call, hard per-call deadline, no retries. Retry and
//! backoff policy belongs to the circuit breaker and the coordinator;
//! this layer only classifies outcomes into [`RateApiError`] kinds.

pub mod errors;
pub mod json;

pub use errors::RateApiError;

use crate::pricing::keys::RateQuery;
use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, warn};

/// Something that can produce the current rate for a query tuple.
///
/// The production implementation is [`RateApi`]; tests substitute scripted
/// sources to exercise the coordinator without a network.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rate(&self, query: &RateQuery) -> Result<String, RateApiError>;
}

#[derive(serde::Serialize)]
struct RateRequest<'a> {
    attributes: [&'a RateQuery; 1],
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: Vec<RateEntry>,
}

/// One rate in the upstream response. The upstream sends more fields;
/// only `rate` is part of the contract we forward.
#[derive(Debug, Deserialize)]
struct RateEntry {
    rate: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    error: Option<String>,
}

/// Client for the pricing API.
pub struct RateApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl RateApi {
    pub fn new(
        base_url: String,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(timeout)
            .user_agent(concat!("concierge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    /// Chain reqwest error causes so DNS/TLS/socket failures stay visible.
    fn format_transport_error(err: &reqwest::Error) -> String {
        let mut message = err.to_string();
        let mut source = err.source();

        while let Some(cause) = source {
            let cause_msg = cause.to_string();
            if !cause_msg.is_empty() && !message.contains(&cause_msg) {
                message.push_str(": ");
                message.push_str(&cause_msg);
            }
            source = cause.source();
        }

        message
    }

    fn classify_transport(&self, err: reqwest::Error) -> RateApiError {
        if err.is_timeout() {
            RateApiError::Timeout(self.timeout)
        } else if err.is_connect() {
            RateApiError::Network(Self::format_transport_error(&err))
        } else {
            RateApiError::Generic(Self::format_transport_error(&err))
        }
    }
}

#[async_trait]
impl RateSource for RateApi {
    async fn fetch_rate(&self, query: &RateQuery) -> Result<String, RateApiError> {
        let url = format!("{}/pricing", self.base_url);
        debug!(period = %query.period, hotel = %query.hotel, room = %query.room, "requesting upstream rate");

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&RateRequest { attributes: [query] });
        if let Some(token) = &self.token {
            request = request.header("token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if status.is_success() {
            let parsed: RatesResponse = json::parse_json_with_context(&body)
                .map_err(|e| RateApiError::Protocol(e.to_string()))?;
            return match parsed.rates.into_iter().next() {
                Some(entry) if !entry.rate.is_empty() => Ok(entry.rate),
                Some(_) => Err(RateApiError::Protocol("empty rate in response".into())),
                None => Err(RateApiError::Protocol("no rates in response".into())),
            };
        }

        if status.is_client_error() {
            let message = serde_json::from_str::<UpstreamErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| status.to_string());
            warn!(status = status.as_u16(), message, "upstream rejected pricing request");
            return Err(RateApiError::Client {
                status: status.as_u16(),
                message,
            });
        }

        if status.is_server_error() {
            return Err(RateApiError::Server {
                status: status.as_u16(),
            });
        }

        Err(RateApiError::Generic(format!("unexpected status {status}")))
    }
}
