//! Error types for the hub and the execution pipeline
//!
//! Hub operations have no failure modes of their own: decode problems are
//! logged and skipped, and slow consumers are evicted silently. Everything
//! that can fail and must reach a caller lives here.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by a sandboxed execution.
///
/// Each variant renders a distinct message that is passed back to the
/// submitter verbatim.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("failed to assemble build context: {0}")]
    Context(#[from] std::io::Error),
    #[error("failed to build sandbox image: {0}")]
    Build(String),
    #[error("failed to create container: {0}")]
    CreateContainer(String),
    #[error("failed to start container: {0}")]
    StartContainer(String),
    #[error("error waiting for container: {0}")]
    Wait(String),
    #[error("failed to read container output: {0}")]
    Logs(String),
    #[error("execution timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("Docker client error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("execution worker failed: {0}")]
    Worker(String),
}

impl SandboxError {
    /// Stable short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            SandboxError::UnsupportedLanguage(_) => "unsupported_language",
            SandboxError::Context(_) => "context_error",
            SandboxError::Build(_) => "build_error",
            SandboxError::CreateContainer(_) => "create_error",
            SandboxError::StartContainer(_) => "start_error",
            SandboxError::Wait(_) => "wait_error",
            SandboxError::Logs(_) => "logs_error",
            SandboxError::Timeout(_) => "timeout",
            SandboxError::Docker(_) => "docker_error",
            SandboxError::Worker(_) => "worker_error",
        }
    }

    /// Whether the caller sent something the sandbox refuses to run.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SandboxError::UnsupportedLanguage(_))
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
