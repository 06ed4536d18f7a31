//! NOAA SWPC OVATION aurora forecast client.
//!
//! The feed publishes a global 360×181 one-degree grid of aurora
//! probabilities as flat `[lon, lat, value]` triples. The adapter rebuilds
//! the lattice, interpolates the probability at the queried point, and
//! derives a KP-index estimate from it.
//! See: https://services.swpc.noaa.gov/json/ovation_aurora_latest.json

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::helpers::round1;
use crate::services::geo::AuroraGrid;
use crate::services::sources::{AuroraReading, Coordinate, SourceError};

const OVATION_URL: &str = "https://services.swpc.noaa.gov/json/ovation_aurora_latest.json";

const SOURCE_ID: &str = "noaa_swpc";

/// Per-call timeout for the aurora family.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the NOAA Space Weather Prediction Center OVATION feed.
#[derive(Debug, Clone)]
pub struct NoaaClient {
    client: reqwest::Client,
    base_url: String,
}

// --- OVATION JSON response types ---

#[derive(Debug, Deserialize)]
struct OvationResponse {
    #[serde(rename = "Observation Time")]
    observation_time: Option<String>,
    /// Flat list of [lon (°E, 0..359), lat (-90..90), probability (0..100)]
    coordinates: Vec<[f64; 3]>,
}

impl NoaaClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: OVATION_URL.to_string(),
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

    pub async fn fetch(&self, coord: Coordinate) -> Result<AuroraReading, SourceError> {
        let response = self
            .client
            .get(&self.base_url)
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

        let payload: OvationResponse = response
            .json()
            .await
            .map_err(|e| SourceError::data(SOURCE_ID, format!("JSON parse error: {}", e)))?;

        if payload.coordinates.is_empty() {
            return Err(SourceError::data(SOURCE_ID, "empty coordinate grid"));
        }

        let observed_at = parse_observation_time(payload.observation_time.as_deref());

        let mut grid = AuroraGrid::new();
        for [lon, lat, value] in &payload.coordinates {
            grid.set(*lon, *lat, *value);
        }
        tracing::debug!("OVATION grid rebuilt with {} samples", grid.sample_count());

        let probability = grid
            .interpolate(coord.lat(), coord.lon())
            .map_err(|e| SourceError::data(SOURCE_ID, e.to_string()))?;

        let kp_index = estimate_kp_from_probability(probability, coord.lat());

        tracing::info!(
            "NOAA data fetched: KP={:.1}, probability={:.1}% at ({}, {})",
            kp_index,
            probability,
            coord.lat(),
            coord.lon()
        );

        Ok(AuroraReading {
            source: SOURCE_ID.to_string(),
            kp_index,
            probability: Some(round1(probability)),
            observed_at,
        })
    }
}

/// Parse the feed's "2026-02-01T21:12:00Z" observation stamp; fall back to
/// now when the field is missing or malformed.
fn parse_observation_time(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ").ok())
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or_else(|| {
            tracing::warn!("could not parse NOAA observation time {:?}", raw);
            Utc::now()
        })
}

/// Estimate a KP index from the local aurora probability.
///
/// Piecewise mapping (probability % → KP): <10 → 0–2, <30 → 2–4, <60 → 4–6,
/// else 6–9. Mid-latitude sites (<60°) need stronger activity for the same
/// overhead probability, so they get a +0.5 offset. Capped at 9.
fn estimate_kp_from_probability(probability: f64, lat: f64) -> f64 {
    let base_kp = if probability < 10.0 {
        probability / 10.0 * 2.0
    } else if probability < 30.0 {
        2.0 + (probability - 10.0) / 20.0 * 2.0
    } else if probability < 60.0 {
        4.0 + (probability - 30.0) / 30.0 * 2.0
    } else {
        6.0 + (probability - 60.0) / 40.0 * 3.0
    };

    let lat_adjustment = if lat.abs() < 60.0 { 0.5 } else { 0.0 };

    round1((base_kp + lat_adjustment).min(9.0))
}
