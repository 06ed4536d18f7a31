//! Auroras.live API client.
//!
//! Secondary aurora source: returns the current planetary K index directly,
//! plus a site probability when available. The feed is loosely typed (numbers
//! sometimes arrive as strings), so the numeric fields go through a tolerant
//! coercion.

use chrono::Utc;
use std::time::Duration;

use crate::helpers::{opt_round1, round1};
use crate::services::sources::{AuroraReading, Coordinate, SourceError};

const AURORAS_LIVE_URL: &str = "https://api.auroras.live/v1/";

const SOURCE_ID: &str = "auroras_live";

/// Per-call timeout for the aurora family.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Auroras.live API.
#[derive(Debug, Clone)]
pub struct AurorasLiveClient {
    client: reqwest::Client,
    base_url: String,
}

impl AurorasLiveClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: AURORAS_LIVE_URL.to_string(),
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
            .query(&[
                ("type", "all".to_string()),
                ("lat", coord.lat().to_string()),
                ("long", coord.lon().to_string()),
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

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::data(SOURCE_ID, format!("JSON parse error: {}", e)))?;

        let kp_index = payload
            .get("kp")
            .and_then(coerce_f64)
            .ok_or_else(|| SourceError::data(SOURCE_ID, "missing or non-numeric 'kp' field"))?;

        let probability = payload.get("probability").and_then(coerce_f64);

        tracing::info!(
            "Auroras.live data fetched: KP={:.1}, probability={:?} at ({}, {})",
            kp_index,
            probability,
            coord.lat(),
            coord.lon()
        );

        Ok(AuroraReading {
            source: SOURCE_ID.to_string(),
            kp_index: round1(kp_index.clamp(0.0, 9.0)),
            probability: opt_round1(probability),
            // The feed carries no update stamp; the fetch instant stands in
            observed_at: Utc::now(),
        })
    }
}

/// Accept both JSON numbers and numeric strings.
fn coerce_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
