//! The pricing endpoint: validation, resolution, degraded mode.

use crate::pricing::{Hotel, Period, RateQuery, Room};
use crate::state::AppState;
use crate::web::error::ApiError;
use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Warning attached to responses served from the stale tier.
const STALE_WARNING: &str = "Using cached rate due to temporary service issue";

#[derive(Debug, Deserialize)]
pub struct PricingParams {
    period: Option<String>,
    hotel: Option<String>,
    room: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub rate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

fn parse_params(params: PricingParams) -> Result<RateQuery, ApiError> {
    let (Some(period), Some(hotel), Some(room)) = (params.period, params.hotel, params.room)
    else {
        return Err(ApiError::bad_request("Missing required parameters"));
    };

    let period = period
        .parse::<Period>()
        .map_err(|_| ApiError::bad_request(format!("Invalid period: {period}")))?;
    let hotel = hotel
        .parse::<Hotel>()
        .map_err(|_| ApiError::bad_request(format!("Invalid hotel: {hotel}")))?;
    let room = room
        .parse::<Room>()
        .map_err(|_| ApiError::bad_request(format!("Invalid room: {room}")))?;

    Ok(RateQuery {
        period,
        hotel,
        room,
    })
}

/// `GET /pricing?period=<P>&hotel=<H>&room=<R>`
///
/// Serves the current rate from cache or a coordinated upstream fetch.
/// When the fresh path fails with an upstream or breaker error, falls
/// back to the stale tier with a warning before surfacing the error.
pub(super) async fn get_rate(
    State(state): State<AppState>,
    Query(params): Query<PricingParams>,
) -> Result<Json<RateResponse>, ApiError> {
    let query = parse_params(params)?;

    match state.coordinator.resolve(&query).await {
        Ok(rate) => Ok(Json(RateResponse {
            rate,
            warning: None,
        })),
        Err(err) if err.stale_eligible() => {
            // Degraded mode: a stale rate with a warning beats an error
            // while the upstream recovers.
            if let Ok(Some(rate)) = state.coordinator.stale(&query).await {
                warn!(key = query.cache_key(), error = %err, "serving stale rate");
                return Ok(Json(RateResponse {
                    rate,
                    warning: Some(STALE_WARNING),
                }));
            }
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}
