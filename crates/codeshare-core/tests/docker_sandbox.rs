//! Sandbox runs against a live Docker daemon.
//!
//! Run with `cargo test -p codeshare-core -- --ignored`.

use async_trait::async_trait;
use bollard::query_parameters::InspectContainerOptions;
use codeshare_core::sandbox::{ContainerRuntime, ContainerSpec};
use codeshare_core::{
    CodeExecutor, DockerRuntime, ExecutionRequest, RecipeBook, SandboxConfig, SandboxError,
    SandboxExecutor,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Delegates to Docker and remembers every container it creates.
struct Tracking {
    inner: DockerRuntime,
    containers: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ContainerRuntime for Tracking {
    async fn build_image(&self, tag: &str, path: &str, ctx: Vec<u8>) -> Result<(), SandboxError> {
        self.inner.build_image(tag, path, ctx).await
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        let id = self.inner.create_container(spec).await?;
        self.containers.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), SandboxError> {
        self.inner.start_container(id).await
    }

    async fn wait_container(&self, id: &str) -> Result<i64, SandboxError> {
        self.inner.wait_container(id).await
    }

    async fn container_output(&self, id: &str) -> Result<String, SandboxError> {
        self.inner.container_output(id).await
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), SandboxError> {
        self.inner.stop_container(id, grace).await
    }

    async fn remove_container(&self, id: &str) -> Result<(), SandboxError> {
        self.inner.remove_container(id).await
    }

    async fn remove_image(&self, tag: &str) -> Result<(), SandboxError> {
        self.inner.remove_image(tag).await
    }
}

fn executor(timeout_secs: u64) -> (SandboxExecutor<Tracking>, Arc<Mutex<Vec<String>>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let containers = Arc::new(Mutex::new(Vec::new()));
    let runtime = Tracking {
        inner: DockerRuntime::connect().expect("Docker daemon should be reachable"),
        containers: containers.clone(),
    };
    let config = SandboxConfig {
        timeout_secs,
        ..Default::default()
    };
    (
        SandboxExecutor::new(runtime, RecipeBook::builtin(), config),
        containers,
    )
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_python_hello() {
    let (executor, _) = executor(120);
    let result = executor
        .execute(ExecutionRequest::new("print(\"hello\")", "python", Duration::from_secs(120)))
        .await
        .unwrap();
    assert_eq!(result.output, "hello\n");
    assert_eq!(result.error, None);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_javascript_stderr_is_captured() {
    let (executor, _) = executor(120);
    let result = executor
        .execute(ExecutionRequest::new(
            "console.log('out'); console.error('err'); process.exit(3);",
            "javascript",
            Duration::from_secs(120),
        ))
        .await
        .unwrap();
    assert!(result.output.contains("out"));
    assert!(result.output.contains("err"));
    assert_eq!(result.exit_code, 3);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_infinite_loop_times_out_and_leaves_nothing_behind() {
    // Warm the base image so the deadline is spent running, not pulling.
    let (warm, _) = executor(120);
    warm.execute(ExecutionRequest::new("pass", "python", Duration::from_secs(120)))
        .await
        .unwrap();

    let (executor, containers) = executor(10);
    let timeout = Duration::from_secs(10);
    let started = Instant::now();
    let err = executor
        .execute(ExecutionRequest::new("while True:\n    pass\n", "python", timeout))
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::Timeout(_)));
    assert!(started.elapsed() < timeout + Duration::from_secs(15));

    let docker = bollard::Docker::connect_with_local_defaults().unwrap();
    let ids = containers.lock().unwrap().clone();
    for id in &ids {
        assert!(docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .is_err());
    }
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_unsupported_language_creates_nothing() {
    let (executor, containers) = executor(30);
    let err = executor
        .execute(ExecutionRequest::new("puts 1", "ruby", Duration::from_secs(30)))
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::UnsupportedLanguage(_)));
    assert!(containers.lock().unwrap().is_empty());
}
