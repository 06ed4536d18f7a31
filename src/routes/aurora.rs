//! Aurora source-comparison endpoint.
//!
//! GET /api/v1/aurora/sources — readings from every reachable aurora source
//! for the configured location, best rank first.

use axum::extract::State;
use axum::Json;

use crate::errors::AppError;
use crate::routes::prediction::AppState;
use crate::services::aggregator::AggregateResult;
use crate::services::sources::{AuroraReading, Coordinate};

/// Get aurora data from all available sources for comparison.
#[utoipa::path(
    get,
    path = "/api/v1/aurora/sources",
    tag = "Aurora",
    responses(
        (status = 200, description = "Aurora readings per source", body = AggregateResult<AuroraReading>),
        (status = 502, description = "All aurora sources failed", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_aurora_sources(
    State(state): State<AppState>,
) -> Result<Json<AggregateResult<AuroraReading>>, AppError> {
    let coord = Coordinate::new(state.config.location_lat, state.config.location_lon)
        .map_err(|e| AppError::InternalError(format!("configured location invalid: {}", e)))?;

    let result = state.aggregator.get_aurora(coord).await?;
    Ok(Json(result))
}
