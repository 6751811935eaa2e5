//! The build, run, capture and destroy pipeline.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::context::build_context;
use super::recipe::{ExecutionRecipe, RecipeBook};
use super::runtime::{ContainerRuntime, ContainerSpec, SANDBOX_LABEL};
use super::{CodeExecutor, ExecutionRequest, ExecutionResult, Language};
use crate::config::SandboxConfig;
use crate::errors::SandboxError;

/// Resources created so far by one run. Whatever is recorded here is
/// destroyed once the run ends, however it ends.
#[derive(Debug, Default)]
struct SandboxHandle {
    image: Option<String>,
    container: Option<String>,
}

pub struct SandboxExecutor<R> {
    runtime: R,
    recipes: RecipeBook,
    config: SandboxConfig,
}

impl<R: ContainerRuntime> SandboxExecutor<R> {
    pub fn new(runtime: R, recipes: RecipeBook, config: SandboxConfig) -> Self {
        Self {
            runtime,
            recipes,
            config,
        }
    }

    fn container_spec(&self, name: String, image: String, run_id: &str) -> ContainerSpec {
        let labels = HashMap::from([
            (SANDBOX_LABEL.to_string(), "true".to_string()),
            (format!("{}.run", SANDBOX_LABEL), run_id.to_string()),
        ]);
        ContainerSpec {
            name,
            image,
            memory_limit_bytes: self
                .config
                .memory_limit_mb
                .map(|mb| (mb * 1024 * 1024) as i64),
            pids_limit: self.config.pids_limit,
            network_disabled: self.config.network_disabled,
            labels,
        }
    }

    async fn run(
        &self,
        handle: &mut SandboxHandle,
        recipe: &ExecutionRecipe,
        source: &str,
    ) -> Result<ExecutionResult, SandboxError> {
        let context = build_context(recipe, source)?;
        let run_id = Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}-{}", self.config.image_prefix, recipe.language, run_id);

        // Recorded before the build so a partially built image is still removed.
        handle.image = Some(name.clone());
        log::debug!("Building sandbox image {}", name);
        self.runtime
            .build_image(&name, &recipe.dockerfile_path(), context)
            .await?;

        let spec = self.container_spec(name.clone(), name, &run_id);
        // The daemon may finish creating it after the deadline fires; stop and
        // remove accept the name as well as the id.
        handle.container = Some(spec.name.clone());
        let container = self.runtime.create_container(&spec).await?;
        handle.container = Some(container.clone());

        self.runtime.start_container(&container).await?;
        let exit_code = self.runtime.wait_container(&container).await?;
        let output = self.runtime.container_output(&container).await?;

        let error = (exit_code != 0).then(|| format!("process exited with status {}", exit_code));
        Ok(ExecutionResult {
            output,
            error,
            exit_code,
        })
    }

    async fn cleanup(&self, handle: SandboxHandle, timed_out: bool) {
        if let Some(container) = handle.container {
            if timed_out {
                let grace = self.config.stop_grace();
                let stop = self.runtime.stop_container(&container, grace);
                match tokio::time::timeout(grace + Duration::from_secs(1), stop).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::warn!("Failed to stop container {}: {}", container, e),
                    Err(_) => log::warn!("Stopping container {} did not finish in time", container),
                }
            }
            if let Err(e) = self.runtime.remove_container(&container).await {
                log::error!("Failed to remove container {}: {}", container, e);
            }
        }
        if let Some(image) = handle.image {
            if let Err(e) = self.runtime.remove_image(&image).await {
                log::error!("Failed to remove image {}: {}", image, e);
            }
        }
    }
}

#[async_trait]
impl<R: ContainerRuntime> CodeExecutor for SandboxExecutor<R> {
    fn default_timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, SandboxError> {
        // Rejected before any sandbox resource exists.
        let language: Language = request.language.parse()?;
        let recipe = self.recipes.get(language);

        let mut handle = SandboxHandle::default();
        let outcome = tokio::time::timeout_at(
            request.deadline,
            self.run(&mut handle, recipe, &request.source),
        )
        .await;

        let timed_out = outcome.is_err();
        if timed_out {
            log::warn!(
                "{} execution exceeded {:?}, tearing down sandbox",
                language,
                request.timeout
            );
        }
        self.cleanup(handle, timed_out).await;

        match outcome {
            Ok(Ok(result)) => {
                log::info!("{} execution finished with status {}", language, result.exit_code);
                Ok(result)
            }
            Ok(Err(e)) => {
                log::error!("{} execution failed: {}", language, e);
                Err(e)
            }
            Err(_) => Err(SandboxError::Timeout(request.timeout)),
        }
    }
}
