//! SMHI point-forecast client.
//!
//! Secondary weather source, 2.5 km resolution over the Nordics. Values come
//! as a flat parameter table per timestamp; cloud cover is reported in oktas
//! (eighths of the sky) and converted to a percentage here.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::helpers::round1;
use crate::services::sources::{Coordinate, SourceError, WeatherReading};

const SMHI_URL: &str =
    "https://opendata-download-metfcst.smhi.se/api/category/pmp3g/version/2";

const SOURCE_ID: &str = "smhi";

/// Per-call timeout for the weather family.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Oktas assumed when `tcc_mean` is absent (4/8 ≈ half-covered sky).
const DEFAULT_CLOUD_OKTAS: f64 = 4.0;

/// Visibility assumed when `vis` is absent.
const DEFAULT_VISIBILITY_KM: f64 = 10.0;

/// Client for the SMHI open-data point forecast.
#[derive(Debug, Clone)]
pub struct SmhiClient {
    client: reqwest::Client,
    base_url: String,
}

// --- SMHI JSON response types ---

#[derive(Debug, Deserialize)]
struct SmhiResponse {
    #[serde(rename = "timeSeries")]
    time_series: Vec<SmhiTimeseries>,
}

#[derive(Debug, Deserialize)]
struct SmhiTimeseries {
    #[serde(rename = "validTime")]
    valid_time: String,
    parameters: Vec<SmhiParameter>,
}

#[derive(Debug, Deserialize)]
struct SmhiParameter {
    name: String,
    values: Vec<f64>,
}

impl SmhiClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: SMHI_URL.to_string(),
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
        let url = format!(
            "{}/geotype/point/lon/{}/lat/{}/data.json",
            self.base_url,
            coord.lon(),
            coord.lat()
        );

        let response = self
            .client
            .get(&url)
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

        // SMHI serves an HTML error page with status 200 for some bad paths
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.contains("json") {
            return Err(SourceError::data(
                SOURCE_ID,
                format!("non-JSON content type: {}", content_type),
            ));
        }

        let payload: SmhiResponse = response
            .json()
            .await
            .map_err(|e| SourceError::data(SOURCE_ID, format!("JSON parse error: {}", e)))?;

        let current = payload
            .time_series
            .first()
            .ok_or_else(|| SourceError::data(SOURCE_ID, "empty timeseries"))?;

        let observed_at = parse_timestamp(&current.valid_time);

        let params: HashMap<&str, f64> = current
            .parameters
            .iter()
            .filter_map(|p| p.values.first().map(|v| (p.name.as_str(), *v)))
            .collect();

        let oktas = params.get("tcc_mean").copied().unwrap_or(DEFAULT_CLOUD_OKTAS);
        let cloud_cover_pct = (oktas / 8.0) * 100.0;
        let visibility_km = params.get("vis").copied().unwrap_or(DEFAULT_VISIBILITY_KM);
        let precipitation = params.get("pmean").copied().unwrap_or(0.0);
        let temperature_c = params.get("t").copied();

        tracing::info!(
            "SMHI data fetched: cloud={}/8 oktas ({:.1}%), vis={}km, precip={}mm/h at ({}, {})",
            oktas,
            cloud_cover_pct,
            visibility_km,
            precipitation,
            coord.lat(),
            coord.lon()
        );

        Ok(WeatherReading {
            source: SOURCE_ID.to_string(),
            cloud_cover_pct: round1(cloud_cover_pct),
            visibility_km,
            precipitation_mm_per_h: precipitation,
            temperature_c,
            observed_at,
        })
    }
}

/// Parse the entry's RFC 3339 timestamp, falling back to now.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|_| {
        tracing::warn!("could not parse SMHI timestamp '{}'", raw);
        Utc::now()
    })
}
