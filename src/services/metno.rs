//! MET Norway Locationforecast 2.0 client.
//!
//! Primary weather source. Reads the first (current) timeseries entry of the
//! compact feed. MET Norway's terms of service require an identifying
//! User-Agent on every request.
//! See: https://api.met.no/weatherapi/locationforecast/2.0/documentation

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;

use crate::helpers::round1;
use crate::services::sources::{Coordinate, SourceError, WeatherReading};

const METNO_URL: &str = "https://api.met.no/weatherapi/locationforecast/2.0/compact";

const SOURCE_ID: &str = "met_no";

/// Per-call timeout for the weather family.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// The compact feed carries no visibility parameter; assume decent visibility
/// rather than dropping the reading. Same default SMHI applies for a missing
/// `vis` value.
const DEFAULT_VISIBILITY_KM: f64 = 10.0;

/// Client for the MET Norway Locationforecast API.
#[derive(Debug, Clone)]
pub struct MetNoClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

// --- met.no JSON response types ---

#[derive(Debug, Deserialize)]
struct MetNoResponse {
    properties: MetNoProperties,
}

#[derive(Debug, Deserialize)]
struct MetNoProperties {
    timeseries: Vec<MetNoTimeseries>,
}

#[derive(Debug, Deserialize)]
struct MetNoTimeseries {
    time: String,
    data: MetNoData,
}

#[derive(Debug, Deserialize)]
struct MetNoData {
    instant: MetNoInstant,
    next_1_hours: Option<MetNoPeriod>,
}

#[derive(Debug, Deserialize)]
struct MetNoInstant {
    details: MetNoInstantDetails,
}

#[derive(Debug, Deserialize)]
struct MetNoInstantDetails {
    air_temperature: Option<f64>,
    cloud_area_fraction: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetNoPeriod {
    details: Option<MetNoPeriodDetails>,
}

#[derive(Debug, Deserialize)]
struct MetNoPeriodDetails {
    precipitation_amount: Option<f64>,
}

impl MetNoClient {
    pub fn new(client: reqwest::Client, user_agent: &str) -> Self {
        Self {
            client,
            base_url: METNO_URL.to_string(),
            user_agent: user_agent.to_string(),
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
        let user_agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| SourceError::data(SOURCE_ID, format!("invalid User-Agent: {}", e)))?;

        let response = self
            .client
            .get(&self.base_url)
            .header(USER_AGENT, user_agent)
            .query(&[("lat", coord.lat()), ("lon", coord.lon())])
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

        let payload: MetNoResponse = response
            .json()
            .await
            .map_err(|e| SourceError::data(SOURCE_ID, format!("JSON parse error: {}", e)))?;

        let current = payload
            .properties
            .timeseries
            .first()
            .ok_or_else(|| SourceError::data(SOURCE_ID, "empty timeseries"))?;

        let observed_at = parse_timestamp(&current.time);

        let instant = &current.data.instant.details;
        let cloud_cover_pct = instant.cloud_area_fraction.unwrap_or(0.0);
        let temperature_c = instant.air_temperature;
        let precipitation = current
            .data
            .next_1_hours
            .as_ref()
            .and_then(|p| p.details.as_ref())
            .and_then(|d| d.precipitation_amount)
            .unwrap_or(0.0);

        tracing::info!(
            "met.no data fetched: cloud={}%, precip={}mm at ({}, {})",
            cloud_cover_pct,
            precipitation,
            coord.lat(),
            coord.lon()
        );

        Ok(WeatherReading {
            source: SOURCE_ID.to_string(),
            cloud_cover_pct: round1(cloud_cover_pct),
            visibility_km: DEFAULT_VISIBILITY_KM,
            precipitation_mm_per_h: precipitation,
            temperature_c,
            observed_at,
        })
    }
}

/// Parse the entry's RFC 3339 timestamp, falling back to now.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|_| {
        tracing::warn!("could not parse met.no timestamp '{}'", raw);
        Utc::now()
    })
}
