use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// API version
    pub version: String,
    /// Service name
    pub service: String,
    /// Server time (UTC)
    pub timestamp: DateTime<Utc>,
}

/// Health check endpoint.
///
/// The service holds no connections of its own (the cache is in-memory), so
/// a reachable process is a healthy process.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "aurora-visibility-api".to_string(),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await;
        assert_eq!(response.0.status, "ok");
        assert_eq!(response.0.service, "aurora-visibility-api");
    }
}
