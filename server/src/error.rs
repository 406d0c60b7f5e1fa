//! Error handling for the sync endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failures a request handler can produce.
///
/// Engine errors are client mistakes (bad scope keys, empty or
/// oversized batches) and turn into 400s carrying the validation
/// message. Database errors are logged server-side and answered with a
/// generic 500.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Engine(#[from] opsboard_engine::Error),
}

/// Wire shape for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Engine(err) => {
                tracing::warn!("Rejected request: {}", err);
                (StatusCode::BAD_REQUEST, err.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
