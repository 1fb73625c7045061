use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use tasklist_types::api::MessageResponse;

/// Everything a handler can fail with. All variants render as an HTTP status
/// plus a `{"message": ...}` body; no structured error codes beyond that.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("missing refresh token")]
    MissingToken,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials.".to_string())
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized.".to_string()),
            ApiError::MissingToken => {
                (StatusCode::BAD_REQUEST, "Missing refresh token.".to_string())
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found.".to_string()),
            ApiError::Internal(cause) => {
                // Duplicate-key violations and a database outage both land
                // here; the client sees the same generic message either way,
                // the real cause goes to the log.
                error!("internal error: {cause:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.".to_string())
            }
        };

        (status, Json(MessageResponse { message })).into_response()
    }
}

pub(crate) fn join_err(e: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
}
