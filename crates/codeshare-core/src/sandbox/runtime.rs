//! Container engine abstraction used by the sandbox executor.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::SandboxError;

/// Label set on every image and container the sandbox creates.
pub const SANDBOX_LABEL: &str = "codeshare.sandbox";

/// Everything needed to create one sandbox container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub memory_limit_bytes: Option<i64>,
    pub pids_limit: Option<i64>,
    pub network_disabled: bool,
    pub labels: HashMap<String, String>,
}

/// The container operations a run needs, in the order it needs them.
///
/// Cleanup operations must treat an already-absent resource as success.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Build `context` into an image tagged `tag`, failing on any build error.
    async fn build_image(
        &self,
        tag: &str,
        dockerfile_path: &str,
        context: Vec<u8>,
    ) -> Result<(), SandboxError>;

    /// Create a container and return its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, SandboxError>;

    async fn start_container(&self, id: &str) -> Result<(), SandboxError>;

    /// Block until the container exits and return its exit status.
    async fn wait_container(&self, id: &str) -> Result<i64, SandboxError>;

    /// Standard output and standard error, interleaved as produced.
    async fn container_output(&self, id: &str) -> Result<String, SandboxError>;

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), SandboxError>;

    async fn remove_container(&self, id: &str) -> Result<(), SandboxError>;

    async fn remove_image(&self, tag: &str) -> Result<(), SandboxError>;
}
