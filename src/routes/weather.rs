//! Weather source-comparison endpoint.
//!
//! GET /api/v1/weather/sources — readings from every reachable weather source
//! for the configured location, best rank first.

use axum::extract::State;
use axum::Json;

use crate::errors::AppError;
use crate::routes::prediction::AppState;
use crate::services::aggregator::AggregateResult;
use crate::services::sources::{Coordinate, WeatherReading};

/// Get weather data from all available sources for comparison.
#[utoipa::path(
    get,
    path = "/api/v1/weather/sources",
    tag = "Weather",
    responses(
        (status = 200, description = "Weather readings per source", body = AggregateResult<WeatherReading>),
        (status = 502, description = "All weather sources failed", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_weather_sources(
    State(state): State<AppState>,
) -> Result<Json<AggregateResult<WeatherReading>>, AppError> {
    let coord = Coordinate::new(state.config.location_lat, state.config.location_lon)
        .map_err(|e| AppError::InternalError(format!("configured location invalid: {}", e)))?;

    let result = state.aggregator.get_weather(coord).await?;
    Ok(Json(result))
}
