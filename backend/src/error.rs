//! Error types and error handling for the application
//!
//! This module defines the error taxonomy shared by the setup workflow and the
//! config reconciliation engine. All errors implement `IntoResponse` so the HTTP
//! layer renders them consistently.

use crate::gateway::GatewayError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input, rejected before any task or mutation runs
    #[error("{0}")]
    Validation(String),

    /// The request collides with state owned by someone else (e.g. a service-owned config var)
    #[error("{0}")]
    Conflict(String),

    /// Unknown app, space or setup run
    #[error("{0}")]
    NotFound(String),

    /// A platform collaborator call failed
    ///
    /// `attempted` lists the config var keys whose mutation was actually issued
    /// before the failure surfaced; it is empty for single-call failures.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Human-readable failure description
        message: String,
        /// Keys whose mutation was issued
        attempted: Vec<String>,
    },

    /// Internal server error (catch-all for unexpected errors, persistence failures)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status associated with this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short error code used in setup failure summaries
    pub fn code(&self) -> String {
        self.status().as_u16().to_string()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Upstream {
            message: err.to_string(),
            attempted: Vec::new(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(anyhow::anyhow!("Database error: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = match &self {
            AppError::Upstream { attempted, .. } => json!({
                "error": self.to_string(),
                "status": status.as_u16(),
                "attempted": attempted,
            }),
            _ => json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::Conflict("dup".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound("gone".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_gateway_error_becomes_upstream() {
        let err: AppError = GatewayError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }
        .into();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "502");
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_upstream_response_lists_attempted_keys() {
        let response = AppError::Upstream {
            message: "config set rejected".to_string(),
            attempted: vec!["A".to_string(), "B".to_string()],
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
