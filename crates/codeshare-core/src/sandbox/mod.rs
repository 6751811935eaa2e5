//! Sandboxed execution of submitted source.
//!
//! Every request gets its own image and container, built from a two-file
//! context (the source and the language recipe) and destroyed before the
//! call returns. Nothing is pooled or reused between requests.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::SandboxError;

pub mod context;
pub mod docker;
pub mod executor;
pub mod recipe;
pub mod runtime;

pub use docker::DockerRuntime;
pub use executor::SandboxExecutor;
pub use recipe::{ExecutionRecipe, RecipeBook};
pub use runtime::{ContainerRuntime, ContainerSpec};

/// The closed set of languages the sandbox runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    Python,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::JavaScript, Language::Python];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
        }
    }

    /// Name the submitted source is stored under inside the build context.
    pub fn script_filename(&self) -> &'static str {
        match self {
            Language::JavaScript => "script.js",
            Language::Python => "script.py",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = SandboxError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_lowercase().as_str() {
            "javascript" => Ok(Language::JavaScript),
            "python" => Ok(Language::Python),
            _ => Err(SandboxError::UnsupportedLanguage(tag.to_string())),
        }
    }
}

/// One submission. The deadline is fixed when the request is created.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub source: String,
    pub language: String,
    pub timeout: Duration,
    pub deadline: Instant,
}

impl ExecutionRequest {
    pub fn new(source: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            source: source.into(),
            language: language.into(),
            timeout,
            deadline: Instant::now() + timeout,
        }
    }
}

/// Captured result of a run that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Standard output and standard error, in the order they were produced.
    pub output: String,
    /// Set when the process exited with a non-zero status.
    pub error: Option<String>,
    pub exit_code: i64,
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Budget applied to requests that do not carry their own.
    fn default_timeout(&self) -> Duration;

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, SandboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!("python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("JavaScript".parse::<Language>().unwrap(), Language::JavaScript);
        let err = "ruby".parse::<Language>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported language: ruby");
        assert!("".parse::<Language>().is_err());
    }

    #[test]
    fn test_script_filenames() {
        assert_eq!(Language::Python.script_filename(), "script.py");
        assert_eq!(Language::JavaScript.script_filename(), "script.js");
    }

    #[tokio::test]
    async fn test_request_deadline_is_fixed_at_creation() {
        let before = Instant::now();
        let request = ExecutionRequest::new("print(1)", "python", Duration::from_secs(30));
        assert!(request.deadline >= before + Duration::from_secs(30));
        assert!(request.deadline <= Instant::now() + Duration::from_secs(30));
    }
}
