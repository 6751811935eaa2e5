//! Hands execution requests to the sandbox and publishes results to rooms.

use std::sync::Arc;

use codeshare_types::{Event, ExecuteRequest};

use crate::errors::SandboxError;
use crate::hub::RoomRegistry;
use crate::sandbox::{CodeExecutor, ExecutionRequest, ExecutionResult};

#[derive(Clone)]
pub struct ExecutionBridge {
    registry: Arc<RoomRegistry>,
    executor: Arc<dyn CodeExecutor>,
}

impl ExecutionBridge {
    pub fn new(registry: Arc<RoomRegistry>, executor: Arc<dyn CodeExecutor>) -> Self {
        Self { registry, executor }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Run `request` and, when `room_code` names an existing room, broadcast
    /// the result to it. Failed runs are returned to the caller only.
    ///
    /// The run happens on its own task, so the sandbox is still torn down if
    /// the caller stops waiting.
    pub async fn run(
        &self,
        request: ExecuteRequest,
        room_code: Option<&str>,
    ) -> Result<ExecutionResult, SandboxError> {
        let execution = ExecutionRequest::new(
            request.code,
            request.language,
            self.executor.default_timeout(),
        );
        let executor = self.executor.clone();
        let result = tokio::spawn(async move { executor.execute(execution).await })
            .await
            .map_err(|e| SandboxError::Worker(e.to_string()))??;

        if let Some(code) = room_code {
            match self.registry.get(code) {
                Some(room) => {
                    let report = room.broadcast(&Event::execution_result(
                        result.output.clone(),
                        result.error.clone(),
                    ));
                    log::info!(
                        "Broadcast execution result to {} client(s) in room {}",
                        report.delivered,
                        code
                    );
                }
                None => log::warn!("Execution result not broadcast: room {} does not exist", code),
            }
        }

        Ok(result)
    }
}
