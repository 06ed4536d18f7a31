//! Source capability set: readings, errors, and the fetch interface.
//!
//! Every external feed is wrapped by an adapter that produces a normalized
//! reading for a coordinate or fails with a `SourceError`. The aggregator only
//! ever sees this surface; transport and payload details stay in the adapters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::services::auroras_live::AurorasLiveClient;
use crate::services::metno::MetNoClient;
use crate::services::noaa::NoaaClient;
use crate::services::openmeteo::OpenMeteoClient;
use crate::services::smhi::SmhiClient;

/// A validated geographic query point. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

/// Rejection of an out-of-range coordinate, before any fetch happens.
#[derive(Debug, thiserror::Error)]
#[error("coordinate out of range: lat={lat}, lon={lon} (expected lat in [-90, 90], lon in [-180, 180])")]
pub struct InvalidCoordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, InvalidCoordinate> {
        // Negated comparisons so NaN fails both bounds checks
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

/// Normalized aurora-activity reading from a single source.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuroraReading {
    /// Source id (e.g. "noaa_swpc", "auroras_live")
    pub source: String,
    /// Planetary K index, 0–9
    pub kp_index: f64,
    /// Aurora probability percentage at the queried point, when the source provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    /// When the source last updated this data
    pub observed_at: DateTime<Utc>,
}

/// Normalized weather reading from a single source.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WeatherReading {
    /// Source id (e.g. "met_no", "smhi", "open_meteo")
    pub source: String,
    /// Total cloud cover percentage, 0–100
    pub cloud_cover_pct: f64,
    /// Horizontal visibility in kilometres
    pub visibility_km: f64,
    /// Precipitation intensity in mm/h
    pub precipitation_mm_per_h: f64,
    /// Air temperature in Celsius, when the source provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    /// When the source last updated this data
    pub observed_at: DateTime<Utc>,
}

/// Adapter-level failure. Transport faults, timeouts, non-success statuses and
/// malformed payloads all end up here; the aggregator treats them uniformly as
/// "this rank produced nothing" and moves down the chain.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network failure, timeout, or non-success HTTP status.
    #[error("{source_id} unavailable: {reason}")]
    Unavailable {
        source_id: &'static str,
        reason: String,
    },

    /// Response arrived but its payload could not be interpreted.
    #[error("{source_id} returned malformed data: {reason}")]
    Data {
        source_id: &'static str,
        reason: String,
    },
}

impl SourceError {
    pub fn unavailable(source_id: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            source_id,
            reason: reason.into(),
        }
    }

    pub fn data(source_id: &'static str, reason: impl Into<String>) -> Self {
        Self::Data {
            source_id,
            reason: reason.into(),
        }
    }
}

/// Capability interface shared by both signal families.
///
/// Implemented by the per-family provider enums below, and by test doubles in
/// the aggregator's tests. The explicit `Send` bound on the returned future
/// keeps aggregation usable from multi-threaded handler tasks.
pub trait FetchSource: Send + Sync {
    type Reading: Clone + Send + Sync + 'static;

    fn source_id(&self) -> &'static str;

    fn fetch(
        &self,
        coord: Coordinate,
    ) -> impl Future<Output = Result<Self::Reading, SourceError>> + Send;
}

/// Aurora source adapters, one variant per feed.
pub enum AuroraProvider {
    Noaa(NoaaClient),
    AurorasLive(AurorasLiveClient),
}

impl FetchSource for AuroraProvider {
    type Reading = AuroraReading;

    fn source_id(&self) -> &'static str {
        match self {
            AuroraProvider::Noaa(c) => c.source_id(),
            AuroraProvider::AurorasLive(c) => c.source_id(),
        }
    }

    async fn fetch(&self, coord: Coordinate) -> Result<AuroraReading, SourceError> {
        match self {
            AuroraProvider::Noaa(c) => c.fetch(coord).await,
            AuroraProvider::AurorasLive(c) => c.fetch(coord).await,
        }
    }
}

/// Weather source adapters, one variant per feed.
pub enum WeatherProvider {
    MetNo(MetNoClient),
    Smhi(SmhiClient),
    OpenMeteo(OpenMeteoClient),
}

impl FetchSource for WeatherProvider {
    type Reading = WeatherReading;

    fn source_id(&self) -> &'static str {
        match self {
            WeatherProvider::MetNo(c) => c.source_id(),
            WeatherProvider::Smhi(c) => c.source_id(),
            WeatherProvider::OpenMeteo(c) => c.source_id(),
        }
    }

    async fn fetch(&self, coord: Coordinate) -> Result<WeatherReading, SourceError> {
        match self {
            WeatherProvider::MetNo(c) => c.fetch(coord).await,
            WeatherProvider::Smhi(c) => c.fetch(coord).await,
            WeatherProvider::OpenMeteo(c) => c.fetch(coord).await,
        }
    }
}

/// Build the aurora provider chain in the configured priority order.
/// Unknown source ids are logged and skipped.
pub fn build_aurora_providers(
    config: &AppConfig,
    http: &reqwest::Client,
) -> Vec<AuroraProvider> {
    config
        .aurora_sources
        .iter()
        .filter_map(|id| match id.as_str() {
            "noaa_swpc" => Some(AuroraProvider::Noaa(NoaaClient::new(http.clone()))),
            "auroras_live" => Some(AuroraProvider::AurorasLive(AurorasLiveClient::new(
                http.clone(),
            ))),
            other => {
                tracing::warn!("unknown aurora source '{}' in configuration, skipping", other);
                None
            }
        })
        .collect()
}

/// Build the weather provider chain in the configured priority order.
/// Unknown source ids are logged and skipped.
pub fn build_weather_providers(
    config: &AppConfig,
    http: &reqwest::Client,
) -> Vec<WeatherProvider> {
    config
        .weather_sources
        .iter()
        .filter_map(|id| match id.as_str() {
            "met_no" => Some(WeatherProvider::MetNo(MetNoClient::new(
                http.clone(),
                &config.metno_user_agent,
            ))),
            "smhi" => Some(WeatherProvider::Smhi(SmhiClient::new(http.clone()))),
            "open_meteo" => Some(WeatherProvider::OpenMeteo(OpenMeteoClient::new(
                http.clone(),
            ))),
            other => {
                tracing::warn!(
                    "unknown weather source '{}' in configuration, skipping",
                    other
                );
                None
            }
        })
        .collect()
}
