// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dupe_manager_core::ScanError;
use dupe_manager_db::DbError;
use serde::Serialize;
use thiserror::Error;

use crate::jobs::ExecutorError;
use crate::live::{RelayError, ResolveError};

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Live updates unavailable")]
    ChannelUnavailable,

    #[error("Database error: {0}")]
    Database(DbError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(id) => ApiError::JobNotFound(id),
            other => ApiError::Database(other),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::InvalidInput(scan) => scan.into(),
            ExecutorError::Store(db) => db.into(),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(id) => ApiError::JobNotFound(id),
            ResolveError::Store(db) => ApiError::Database(db),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::ChannelUnavailable => ApiError::ChannelUnavailable,
            RelayError::Live(live) => ApiError::Internal(live.to_string()),
            RelayError::Store(db) => db.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::JobNotFound(id) => {
                tracing::debug!(job_id = %id, "Job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Job not found", format!("Job ID: {id}")),
                )
            }
            ApiError::InvalidInput(msg) => {
                tracing::warn!(message = %msg, "Invalid input");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Invalid input", msg.clone()),
                )
            }
            ApiError::ChannelUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("Live updates unavailable"),
            ),
            ApiError::Database(db_err) => {
                tracing::error!(error = %db_err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Database error", db_err.to_string()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Internal server error", msg.clone()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_maps_to_404() {
        let (status, body) = body_of(DbError::NotFound("abc".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Job not found");
        assert_eq!(body.details.as_deref(), Some("Job ID: abc"));
    }

    #[tokio::test]
    async fn test_invalid_root_maps_to_400() {
        let err: ApiError = ScanError::invalid_root("/nope").into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Invalid input");
    }

    #[tokio::test]
    async fn test_channel_unavailable_maps_to_503() {
        let (status, body) = body_of(RelayError::ChannelUnavailable.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.details.is_none());
    }
}
