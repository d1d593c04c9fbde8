//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::OptimizerError;

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
    /// Engine or service error
    Optimizer(OptimizerError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
            AppError::Optimizer(e) => {
                let (status, code) = match &e {
                    OptimizerError::Precondition { .. } => {
                        (StatusCode::BAD_REQUEST, "PRECONDITION_FAILED")
                    }
                    OptimizerError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    OptimizerError::InvalidAssignment { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_ASSIGNMENT")
                    }
                    OptimizerError::RunInProgress { .. } => {
                        (StatusCode::CONFLICT, "RUN_IN_PROGRESS")
                    }
                    OptimizerError::Internal { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                let details = e.context().to_string();
                let message = match &e {
                    OptimizerError::Precondition { message, .. }
                    | OptimizerError::NotFound { message, .. }
                    | OptimizerError::InvalidAssignment { message, .. }
                    | OptimizerError::RunInProgress { message, .. }
                    | OptimizerError::Internal { message, .. } => message.clone(),
                };
                (status, ApiError::new(code, message).with_details(details))
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<OptimizerError> for AppError {
    fn from(err: OptimizerError) -> Self {
        AppError::Optimizer(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorContext;

    #[test]
    fn test_run_in_progress_maps_to_conflict() {
        let err = AppError::from(OptimizerError::run_in_progress(
            "busy",
            ErrorContext::new("start_run"),
        ));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_assignment_maps_to_unprocessable() {
        let err = AppError::from(OptimizerError::invalid_assignment(
            "job is already assigned",
            ErrorContext::new("assign"),
        ));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
