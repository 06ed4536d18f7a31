//! Open-Meteo forecast client.
//!
//! Tertiary weather source with global coverage. Hourly values arrive as
//! parallel arrays; the first slot is the current hour. Visibility is
//! reported in metres and converted to kilometres here.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::helpers::round1;
use crate::services::sources::{Coordinate, SourceError, WeatherReading};

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

const SOURCE_ID: &str = "open_meteo";

/// Per-call timeout for the weather family.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

// --- Open-Meteo JSON response types ---

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    hourly: OpenMeteoHourly,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OpenMeteoHourly {
    /// Naive timestamps in the requested timezone (UTC here)
    time: Vec<String>,
    cloud_cover: Vec<f64>,
    /// Metres
    visibility: Vec<f64>,
    /// mm/h
    precipitation: Vec<f64>,
    temperature_2m: Vec<f64>,
}

impl OpenMeteoClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: OPEN_METEO_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (integration tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    pub async fn fetch(&self, coord: Coordinate) -> Result<WeatherReading, SourceError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", coord.lat().to_string()),
                ("longitude", coord.lon().to_string()),
                (
                    "hourly",
                    "cloud_cover,visibility,precipitation,temperature_2m".to_string(),
                ),
                ("forecast_days", "1".to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| SourceError::unavailable(SOURCE_ID, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::unavailable(
                SOURCE_ID,
                format!("HTTP {}", response.status()),
            ));
        }

        let payload: OpenMeteoResponse = response
            .json()
            .await
            .map_err(|e| SourceError::data(SOURCE_ID, format!("JSON parse error: {}", e)))?;

        let hourly = &payload.hourly;
        if hourly.time.is_empty() {
            return Err(SourceError::data(SOURCE_ID, "empty hourly series"));
        }

        let observed_at = parse_timestamp(&hourly.time[0]);
        let cloud_cover_pct = hourly.cloud_cover.first().copied().unwrap_or(0.0);
        let visibility_km = hourly.visibility.first().copied().unwrap_or(10_000.0) / 1000.0;
        let precipitation = hourly.precipitation.first().copied().unwrap_or(0.0);
        let temperature_c = hourly.temperature_2m.first().copied();

        tracing::info!(
            "Open-Meteo data fetched: cloud={}%, vis={:.1}km, precip={}mm at ({}, {})",
            cloud_cover_pct,
            visibility_km,
            precipitation,
            coord.lat(),
            coord.lon()
        );

        Ok(WeatherReading {
            source: SOURCE_ID.to_string(),
            cloud_cover_pct: round1(cloud_cover_pct),
            visibility_km: round1(visibility_km),
            precipitation_mm_per_h: precipitation,
            temperature_c,
            observed_at,
        })
    }
}

/// Parse a naive "2026-02-01T22:00" UTC timestamp, falling back to now.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or_else(|_| {
            tracing::warn!("could not parse Open-Meteo timestamp '{}'", raw);
            Utc::now()
        })
}
