//! Error types for tokenforge-server
//!
//! Handler failures are converted into a 500 response carrying the error and
//! its cause chain:
//!
//! ```json
//! {"status_code": 500, "error": "...", "stack_trace": ["...", "caused by: ..."]}
//! ```
//!
//! The cause chain is exposed to clients; this service is meant for
//! development and test deployments.

use std::error::Error as _;
use std::io;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tokenforge_auth::AuthError;
use tracing::error;

use crate::config::ConfigError;

/// Result type for server operations
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Server error type
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Key, issuance or verification failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Listener or socket failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A blocking or background task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),
}

impl ServerError {
    /// Debug representation of this error followed by each underlying cause
    pub fn stack_trace(&self) -> Vec<String> {
        let mut lines = vec![format!("{self:?}")];
        let mut source = self.source();
        while let Some(cause) = source {
            lines.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        lines
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request handling failed");

        let body = json!({
            "status_code": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            "error": self.to_string(),
            "stack_trace": self.stack_trace(),
        });

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_into_response_shape() {
        let error = ServerError::from(AuthError::Signing("rsa failure".into()));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status_code"], 500);
        assert_eq!(json["error"], "Signing failed: rsa failure");
        assert!(json["stack_trace"].is_array());
        assert!(!json["stack_trace"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_stack_trace_includes_causes() {
        let error = ServerError::from(AuthError::Io(io::Error::other("disk full")));
        let trace = error.stack_trace();
        assert!(trace[0].contains("Io"));
        assert!(trace.iter().any(|line| line.contains("disk full")));
    }
}
