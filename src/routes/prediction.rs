//! Prediction HTTP endpoints.
//!
//! - GET /api/v1/prediction/current?lat&lon&at_time
//! - GET /api/v1/prediction/forecast?hours&lat&lon

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::aggregator::{AggregateResult, AppAggregator};
use crate::services::astro::{moon_penalty, sun_penalty};
use crate::services::score::{calculate_visibility_score, ScoreBreakdown};
use crate::services::sources::{AuroraReading, Coordinate, WeatherReading};

/// Maximum forecast horizon in hours.
const MAX_FORECAST_HOURS: u32 = 72;

/// Default forecast horizon in hours.
const DEFAULT_FORECAST_HOURS: u32 = 24;

/// Score bonus for evening hours (18:00–23:59 UTC) in the synthetic forecast.
const EVENING_SCORE_BONUS: f64 = 5.0;

/// Score bonus for night hours (00:00–06:59 UTC) in the synthetic forecast.
const NIGHT_SCORE_BONUS: f64 = 10.0;

/// Shared application state for prediction endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) aggregator: Arc<AppAggregator>,
    pub(crate) config: AppConfig,
}

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct PredictionQuery {
    /// Latitude in [-90, 90]; defaults to the configured location
    pub lat: Option<f64>,
    /// Longitude in [-180, 180]; defaults to the configured location
    pub lon: Option<f64>,
    /// UTC instant for the astronomical penalties (RFC 3339); defaults to now
    pub at_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ForecastQuery {
    /// Number of hours to cover, 1–72 (default 24)
    pub hours: Option<u32>,
    /// Latitude in [-90, 90]; defaults to the configured location
    pub lat: Option<f64>,
    /// Longitude in [-180, 180]; defaults to the configured location
    pub lon: Option<f64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Geographic location echo.
#[derive(Debug, Serialize, ToSchema)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
}

/// Complete prediction: score, breakdown, recommendation and the per-source
/// readings that produced them.
#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionResponse {
    /// When this prediction was generated
    pub timestamp: DateTime<Utc>,
    pub location: Location,
    /// Total visibility score, 0–100
    pub total_score: f64,
    pub breakdown: ScoreBreakdown,
    /// Human-readable recommendation
    pub recommendation: String,
    pub aurora: AggregateResult<AuroraReading>,
    pub weather: AggregateResult<WeatherReading>,
}

/// Single synthetic forecast slot.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastItem {
    pub timestamp: DateTime<Utc>,
    /// Projected visibility score, 0–100
    pub visibility_score: f64,
    pub kp_index: f64,
    pub cloud_cover_pct: f64,
}

/// Hourly forecast surface. A deterministic transformation of the current
/// snapshot, not an independent per-hour prediction.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastResponse {
    pub location: Location,
    pub forecast: Vec<ForecastItem>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Resolve the query coordinate, rejecting out-of-range values before any
/// fetch is attempted.
fn resolve_coordinate(
    lat: Option<f64>,
    lon: Option<f64>,
    config: &AppConfig,
) -> Result<Coordinate, AppError> {
    let lat = lat.unwrap_or(config.location_lat);
    let lon = lon.unwrap_or(config.location_lon);
    Coordinate::new(lat, lon).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Get the current aurora visibility prediction.
///
/// Aggregates all configured aurora and weather sources (with fallback and
/// caching), computes the astronomical penalties for the requested instant,
/// and returns the combined score with its full breakdown.
#[utoipa::path(
    get,
    path = "/api/v1/prediction/current",
    tag = "Prediction",
    params(PredictionQuery),
    responses(
        (status = 200, description = "Current visibility prediction", body = PredictionResponse),
        (status = 400, description = "Coordinate out of range", body = crate::errors::ErrorResponse),
        (status = 502, description = "All sources for a signal family failed", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_current_prediction(
    State(state): State<AppState>,
    Query(params): Query<PredictionQuery>,
) -> Result<Json<PredictionResponse>, AppError> {
    let coord = resolve_coordinate(params.lat, params.lon, &state.config)?;
    let at_time = params.at_time.unwrap_or_else(Utc::now);

    // The two families are independent; fetch them concurrently
    let (aurora, weather) = futures::join!(
        state.aggregator.get_aurora(coord),
        state.aggregator.get_weather(coord)
    );
    let aurora = aurora?;
    let weather = weather?;

    // One shared instant so the moon and sun are never evaluated against
    // different times
    let moon = moon_penalty(coord, at_time);
    let sun = sun_penalty(coord, at_time);

    let score =
        calculate_visibility_score(&aurora.primary.reading, &weather.primary.reading, moon, sun);

    Ok(Json(PredictionResponse {
        timestamp: at_time,
        location: Location {
            lat: coord.lat(),
            lon: coord.lon(),
            name: state.config.location_name.clone(),
        },
        total_score: score.total_score,
        breakdown: score.breakdown,
        recommendation: score.recommendation,
        aurora,
        weather,
    }))
}

/// Get an hourly visibility outlook.
///
/// Derived from the current snapshot with a fixed evening/night adjustment —
/// the upstream feeds are only sampled once, exactly as for `/current`.
#[utoipa::path(
    get,
    path = "/api/v1/prediction/forecast",
    tag = "Prediction",
    params(ForecastQuery),
    responses(
        (status = 200, description = "Hourly visibility outlook", body = ForecastResponse),
        (status = 400, description = "Invalid parameters", body = crate::errors::ErrorResponse),
        (status = 502, description = "All sources for a signal family failed", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_forecast(
    State(state): State<AppState>,
    Query(params): Query<ForecastQuery>,
) -> Result<Json<ForecastResponse>, AppError> {
    let hours = params.hours.unwrap_or(DEFAULT_FORECAST_HOURS);
    if hours == 0 || hours > MAX_FORECAST_HOURS {
        return Err(AppError::BadRequest(format!(
            "hours must be between 1 and {}",
            MAX_FORECAST_HOURS
        )));
    }

    let coord = resolve_coordinate(params.lat, params.lon, &state.config)?;
    let now = Utc::now();

    let (aurora, weather) = futures::join!(
        state.aggregator.get_aurora(coord),
        state.aggregator.get_weather(coord)
    );
    let aurora = aurora?;
    let weather = weather?;

    let moon = moon_penalty(coord, now);
    let sun = sun_penalty(coord, now);
    let current =
        calculate_visibility_score(&aurora.primary.reading, &weather.primary.reading, moon, sun);

    let forecast = (0..hours)
        .map(|hour| {
            let timestamp = now + Duration::hours(hour as i64);
            ForecastItem {
                timestamp,
                visibility_score: (current.total_score + hour_bonus(timestamp.hour())).min(100.0),
                kp_index: aurora.primary.reading.kp_index,
                cloud_cover_pct: weather.primary.reading.cloud_cover_pct,
            }
        })
        .collect();

    Ok(Json(ForecastResponse {
        location: Location {
            lat: coord.lat(),
            lon: coord.lon(),
            name: state.config.location_name.clone(),
        },
        forecast,
    }))
}

/// Fixed score adjustment per hour of day: nights score best, evenings next.
fn hour_bonus(hour: u32) -> f64 {
    match hour {
        0..=6 => NIGHT_SCORE_BONUS,
        18..=23 => EVENING_SCORE_BONUS,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            location_lat: 55.7,
            location_lon: 13.4,
            location_name: "Test".into(),
            cache_ttl_aurora_secs: 300,
            cache_ttl_weather_secs: 1800,
            aurora_sources: vec![],
            weather_sources: vec![],
            metno_user_agent: "test/0.1".into(),
            port: 8080,
        }
    }

    #[test]
    fn test_resolve_coordinate_defaults() {
        let coord = resolve_coordinate(None, None, &test_config()).unwrap();
        assert_eq!(coord.lat(), 55.7);
        assert_eq!(coord.lon(), 13.4);
    }

    #[test]
    fn test_resolve_coordinate_explicit() {
        let coord = resolve_coordinate(Some(68.3), Some(18.8), &test_config()).unwrap();
        assert_eq!(coord.lat(), 68.3);
        assert_eq!(coord.lon(), 18.8);
    }

    #[test]
    fn test_resolve_coordinate_out_of_range_rejected() {
        assert!(resolve_coordinate(Some(91.0), None, &test_config()).is_err());
        assert!(resolve_coordinate(None, Some(-181.0), &test_config()).is_err());
        assert!(resolve_coordinate(Some(f64::NAN), None, &test_config()).is_err());
    }

    #[test]
    fn test_hour_bonus_bands() {
        assert_eq!(hour_bonus(0), 10.0);
        assert_eq!(hour_bonus(6), 10.0);
        assert_eq!(hour_bonus(7), 0.0);
        assert_eq!(hour_bonus(12), 0.0);
        assert_eq!(hour_bonus(17), 0.0);
        assert_eq!(hour_bonus(18), 5.0);
        assert_eq!(hour_bonus(23), 5.0);
    }
}
