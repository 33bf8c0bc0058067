//! Error handling module for the moderator backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::graph::GraphError;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const REVISION_MISMATCH: &str = "REVISION_MISMATCH";
    pub const PROVISIONING_FATAL: &str = "PROVISIONING_FATAL";
    pub const PROVISIONING_PARTIAL: &str = "PROVISIONING_PARTIAL";
    pub const PROVISIONING_TIMEOUT: &str = "PROVISIONING_TIMEOUT";
    pub const ARCHIVAL_FAILURE: &str = "ARCHIVAL_FAILURE";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Stored breakout state changed since it was read
    Conflict {
        message: String,
        current_revision: i64,
    },
    /// Team creation or channel resolution failed; nothing was persisted
    ProvisioningFatal(String),
    /// Some batched sub-requests failed while partial failures are not tolerated
    ProvisioningPartial { message: String, failed: usize },
    /// Team creation did not finish within the poll budget
    ProvisioningTimeout(String),
    /// Remote archive call failed; stored state left untouched
    ArchivalFailure(String),
    /// Graph returned an unexpected error
    Upstream(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ProvisioningFatal(_) => StatusCode::BAD_GATEWAY,
            AppError::ProvisioningPartial { .. } => StatusCode::BAD_GATEWAY,
            AppError::ProvisioningTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ArchivalFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict { .. } => codes::REVISION_MISMATCH,
            AppError::ProvisioningFatal(_) => codes::PROVISIONING_FATAL,
            AppError::ProvisioningPartial { .. } => codes::PROVISIONING_PARTIAL,
            AppError::ProvisioningTimeout(_) => codes::PROVISIONING_TIMEOUT,
            AppError::ArchivalFailure(_) => codes::ARCHIVAL_FAILURE,
            AppError::Upstream(_) => codes::UPSTREAM_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Conflict { message, .. } => message.clone(),
            AppError::ProvisioningFatal(msg) => msg.clone(),
            AppError::ProvisioningPartial { message, .. } => message.clone(),
            AppError::ProvisioningTimeout(msg) => msg.clone(),
            AppError::ArchivalFailure(msg) => msg.clone(),
            AppError::Upstream(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Conflict {
                current_revision, ..
            } => Some(serde_json::json!({ "currentRevision": current_revision })),
            AppError::ProvisioningPartial { failed, .. } => {
                Some(serde_json::json!({ "failed": failed }))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<GraphError> for AppError {
    fn from(err: GraphError) -> Self {
        if err.is_not_found() {
            return AppError::NotFound(err.to_string());
        }
        if err.is_unauthorized() {
            return AppError::Unauthorized(err.to_string());
        }
        tracing::error!("Graph error: {:?}", err);
        AppError::Upstream(format!("Graph error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details: error.details(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_carries_current_revision() {
        let err = AppError::Conflict {
            message: "stale".to_string(),
            current_revision: 7,
        };
        let body = ErrorResponse::new(&err);

        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(body.error.code, codes::REVISION_MISMATCH);
        assert_eq!(body.error.details.unwrap()["currentRevision"], 7);
    }

    #[test]
    fn test_timeout_is_distinct_from_fatal() {
        let timeout = AppError::ProvisioningTimeout("slow".to_string());
        let fatal = AppError::ProvisioningFatal("failed".to_string());

        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(fatal.status_code(), StatusCode::BAD_GATEWAY);
        assert_ne!(timeout.error_code(), fatal.error_code());
    }

    #[test]
    fn test_graph_not_found_maps_to_not_found() {
        let err: AppError = GraphError::Status {
            status: 404,
            code: "ErrorItemNotFound".to_string(),
            message: "gone".to_string(),
        }
        .into();

        assert!(matches!(err, AppError::NotFound(_)));
    }
}
