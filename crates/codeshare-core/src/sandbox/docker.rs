//! [`ContainerRuntime`] backed by the local Docker daemon.

use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    BuildImageOptionsBuilder, CreateContainerOptions as BollardCreateContainerOptionsQuery,
    LogsOptions as BollardLogsOptionsQuery, RemoveContainerOptions as BollardRemoveContainerOptionsQuery,
    RemoveImageOptions as BollardRemoveImageOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery, StopContainerOptionsBuilder,
    WaitContainerOptions as BollardWaitContainerOptionsQuery,
};
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use std::time::Duration;

use super::runtime::{ContainerRuntime, ContainerSpec};
use crate::errors::SandboxError;

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn connect() -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    /// Check that the daemon answers.
    pub async fn ping(&self) -> Result<(), SandboxError> {
        self.docker.ping().await?;
        Ok(())
    }
}

/// 404 from the daemon, or 304 for a stop on an exited container.
fn is_already_gone(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: 404 | 304,
            ..
        }
    )
}

fn append_log(output: &mut Vec<u8>, chunk: LogOutput) {
    match chunk {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::Console { message } => output.extend_from_slice(&message),
        LogOutput::StdIn { .. } => {}
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn build_image(
        &self,
        tag: &str,
        dockerfile_path: &str,
        context: Vec<u8>,
    ) -> Result<(), SandboxError> {
        let options = BuildImageOptionsBuilder::new()
            .dockerfile(dockerfile_path)
            .t(tag)
            .rm(true)
            .forcerm(true)
            .build();

        let mut stream =
            self.docker
                .build_image(options, None, Some(bollard::body_full(Bytes::from(context))));

        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| SandboxError::Build(e.to_string()))?;
            if let Some(detail) = info.error_detail {
                let message = detail
                    .message
                    .unwrap_or_else(|| "unknown build error".to_string());
                return Err(SandboxError::Build(message));
            }
            if let Some(line) = info.stream.as_deref().map(str::trim_end) {
                if !line.is_empty() {
                    log::debug!("[{}] {}", tag, line);
                }
            }
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        let options = Some(BollardCreateContainerOptionsQuery {
            name: Some(spec.name.clone()),
            ..Default::default()
        });

        let config = ContainerCreateBody {
            image: Some(spec.image.clone()),
            labels: Some(spec.labels.clone()),
            network_disabled: Some(spec.network_disabled),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            host_config: Some(HostConfig {
                memory: spec.memory_limit_bytes,
                memory_swap: spec.memory_limit_bytes,
                pids_limit: spec.pids_limit,
                network_mode: spec.network_disabled.then(|| "none".to_string()),
                cap_drop: Some(vec!["ALL".to_string()]),
                security_opt: Some(vec!["no-new-privileges".to_string()]),
                auto_remove: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(options, config)
            .await
            .map_err(|e| SandboxError::CreateContainer(e.to_string()))?;
        for warning in &response.warnings {
            log::warn!("Container {}: {}", spec.name, warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), SandboxError> {
        self.docker
            .start_container(id, None::<BollardStartContainerOptionsQuery>)
            .await
            .map_err(|e| SandboxError::StartContainer(e.to_string()))
    }

    async fn wait_container(&self, id: &str) -> Result<i64, SandboxError> {
        let mut stream = self
            .docker
            .wait_container(id, None::<BollardWaitContainerOptionsQuery>);
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error carrying the code.
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(SandboxError::Wait(e.to_string())),
            None => Err(SandboxError::Wait(
                "container wait stream ended unexpectedly".to_string(),
            )),
        }
    }

    async fn container_output(&self, id: &str) -> Result<String, SandboxError> {
        let mut stream = self.docker.logs(
            id,
            Some(BollardLogsOptionsQuery {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut output = Vec::new();
        while let Some(chunk) = stream.next().await {
            append_log(&mut output, chunk.map_err(|e| SandboxError::Logs(e.to_string()))?);
        }
        // Frames can split a multi-byte character, so decode only once all are in.
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), SandboxError> {
        let options = StopContainerOptionsBuilder::new()
            .t(grace.as_secs().min(i32::MAX as u64) as i32)
            .build();
        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_already_gone(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_container(&self, id: &str) -> Result<(), SandboxError> {
        let options = Some(BollardRemoveContainerOptionsQuery {
            force: true,
            v: true,
            ..Default::default()
        });
        match self.docker.remove_container(id, options).await {
            Ok(()) => Ok(()),
            Err(e) if is_already_gone(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_image(&self, tag: &str) -> Result<(), SandboxError> {
        let options = Some(BollardRemoveImageOptionsQuery {
            force: true,
            ..Default::default()
        });
        match self.docker.remove_image(tag, options, None).await {
            Ok(removed) => {
                log::debug!("Removed image {} ({} layers)", tag, removed.len());
                Ok(())
            }
            Err(e) if is_already_gone(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
