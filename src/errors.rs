use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("All {family} sources unavailable")]
    AllSourcesUnavailable { family: &'static str },

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::AllSourcesUnavailable { family } => {
                tracing::error!("all {} sources unavailable", family);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("All {} data sources are currently unavailable", family),
                )
            }
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<crate::services::aggregator::AllSourcesUnavailable> for AppError {
    fn from(err: crate::services::aggregator::AllSourcesUnavailable) -> Self {
        AppError::AllSourcesUnavailable { family: err.family }
    }
}
