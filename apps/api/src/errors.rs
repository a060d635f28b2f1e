use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::history::store::StoreError;
use crate::oracle::OracleError;
use crate::rate_limit::{RateLimitStatus, RateLimitStoreError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded")]
    RateLimited(RateLimitStatus),

    #[error("Change oracle timed out")]
    OracleTimeout,

    #[error("Change oracle failed: {0}")]
    OracleFailure(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => AppError::Conflict(err.to_string()),
            StoreError::Database(e) => AppError::Database(e),
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<RateLimitStoreError> for AppError {
    fn from(err: RateLimitStoreError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<OracleError> for AppError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout => AppError::OracleTimeout,
            other => AppError::OracleFailure(other.to_string()),
        }
    }
}

impl AppError {
    /// Whether the same request may succeed if retried unchanged.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited(_) | AppError::OracleTimeout | AppError::Conflict(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.retryable();
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::RateLimited(status) => {
                let body = Json(json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": "Too many requests; retry after the window resets",
                        "retryable": true,
                        "remaining": 0,
                        "reset_time": status.reset_time
                    }
                }));
                return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            }
            AppError::OracleTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "ORACLE_TIMEOUT",
                "The suggestion service did not respond in time".to_string(),
            ),
            AppError::OracleFailure(msg) => {
                tracing::warn!("Oracle failure: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "ORACLE_FAILURE",
                    "The suggestion service could not produce changes for this input".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "retryable": retryable
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::OracleTimeout, StatusCode::GATEWAY_TIMEOUT),
            (AppError::OracleFailure("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_rate_limited_is_429_and_retryable() {
        let err = AppError::RateLimited(RateLimitStatus {
            allowed: false,
            remaining: 0,
            reset_time: 1_700_000_000_000,
        });
        assert!(err.retryable());
        assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_oracle_errors_map_by_kind() {
        assert!(matches!(AppError::from(OracleError::Timeout), AppError::OracleTimeout));
        let failure = AppError::from(OracleError::InvalidBatch("empty".into()));
        assert!(matches!(failure, AppError::OracleFailure(_)));
        assert!(!failure.retryable());
    }

    #[test]
    fn test_store_conflict_maps_to_conflict() {
        let err = AppError::from(StoreError::Conflict {
            expected: -1,
            actual: 0,
        });
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.retryable());
    }
}
