//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::services::error::AnalyticsError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Invalid request (validation error)
    BadRequest(String),
    /// Internal server error
    Internal(String),
    /// Repository error
    Repository(RepositoryError),
    /// Analytics pipeline error
    Analytics(AnalyticsError),
}

impl AppError {
    /// Status code and body for this error.
    pub fn to_api_error(&self) -> (StatusCode, ApiError) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
            AppError::Repository(e) => repository_status(e),
            AppError::Analytics(e) => analytics_status(e),
        }
    }
}

fn repository_status(e: &RepositoryError) -> (StatusCode, ApiError) {
    let msg = e.to_string();
    match e {
        RepositoryError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg))
        }
        RepositoryError::ValidationError { .. } => {
            (StatusCode::BAD_REQUEST, ApiError::new("VALIDATION_ERROR", msg))
        }
        RepositoryError::ConnectionError { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::new("REPOSITORY_UNAVAILABLE", msg),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("REPOSITORY_ERROR", msg),
        ),
    }
}

fn analytics_status(e: &AnalyticsError) -> (StatusCode, ApiError) {
    let msg = e.to_string();
    match e {
        AnalyticsError::MissingField { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::new("MISSING_FIELD", msg),
        ),
        AnalyticsError::InsufficientData { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::new("INSUFFICIENT_DATA", msg),
        ),
        AnalyticsError::InvalidConfig { .. } => {
            (StatusCode::BAD_REQUEST, ApiError::new("INVALID_CONFIG", msg))
        }
        AnalyticsError::ExternalFetchError { .. } => (
            StatusCode::BAD_GATEWAY,
            ApiError::new("FEED_UNAVAILABLE", msg),
        ),
        AnalyticsError::NonFinite { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("NON_FINITE", msg),
        ),
        AnalyticsError::RunFailed { run, source } => {
            let (status, error) = analytics_status(source);
            (status, error.with_details(format!("run {}", run)))
        }
        AnalyticsError::Repository(inner) => repository_status(inner),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.to_api_error();
        (status, Json(error)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        AppError::Analytics(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                AppError::from(RepositoryError::not_found("station 5")),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(RepositoryError::connection("store offline")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::from(RepositoryError::configuration("bad snapshot dir")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::from(AnalyticsError::insufficient_data("too short")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(AnalyticsError::invalid_config("window 0")),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(AnalyticsError::external_fetch("timeout")),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_api_error().0, expected);
        }
    }

    #[test]
    fn test_run_failed_keeps_source_status() {
        let err = AppError::from(AnalyticsError::run_failed(
            3,
            AnalyticsError::non_finite("prediction is NaN"),
        ));
        let (status, body) = err.to_api_error();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "NON_FINITE");
        assert_eq!(body.details.as_deref(), Some("run 3"));
    }
}
