//! Error types for the codeshare server.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use codeshare_core::SandboxError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur in the codeshare server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Body could not be read as the expected JSON
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing required field
    #[error("{0} is required")]
    MissingField(String),

    /// Sandboxed execution failed; the message is passed through unchanged.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert ServerError to HTTP status code
impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::MissingField(_) => 400,
            ServerError::Sandbox(SandboxError::Timeout(_)) => 504,
            ServerError::Sandbox(e) if e.is_client_error() => 400,
            ServerError::Sandbox(_) => 500,
            ServerError::Config(_) | ServerError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::MissingField(_) => "missing_field",
            ServerError::Sandbox(e) => e.kind(),
            ServerError::Config(_) => "config_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("Request failed ({}): {}", self.error_type(), self);
        } else {
            log::debug!("Request rejected ({}): {}", self.error_type(), self);
        }
        let body = match &self {
            // Execution failures keep the shape of a successful run.
            ServerError::Sandbox(e) => json!({ "output": "", "error": e.to_string() }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServerError::missing_field("Username").status_code(), 400);
        assert_eq!(
            ServerError::from(SandboxError::UnsupportedLanguage("ruby".into())).status_code(),
            400
        );
        assert_eq!(
            ServerError::from(SandboxError::Timeout(Duration::from_secs(30))).status_code(),
            504
        );
        assert_eq!(
            ServerError::from(SandboxError::Build("no such image".into())).status_code(),
            500
        );
        assert_eq!(ServerError::internal("boom").status_code(), 500);
        assert_eq!(ServerError::invalid_request("bad body").status_code(), 400);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ServerError::missing_field("Username").to_string(),
            "Username is required"
        );
        assert_eq!(
            ServerError::from(SandboxError::UnsupportedLanguage("ruby".into())).to_string(),
            "unsupported language: ruby"
        );
        assert_eq!(
            ServerError::from(SandboxError::Timeout(Duration::from_secs(30))).error_type(),
            "timeout"
        );
    }
}
