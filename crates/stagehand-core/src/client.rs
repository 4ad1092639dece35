use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

/// Identifies a long-running action scheduled on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionHandle {
    pub name: String,
}

impl ActionHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Remote platform calls used by the pipeline commands.
///
/// Cancellation is advisory: implementations should return soon after
/// `cancel` fires, but callers never wait for them to do so.
#[async_trait]
pub trait ActionClient: Send + Sync {
    /// Schedule the destruction of a pipeline.
    async fn destroy(&self, name: &str, destroy_volumes: bool) -> Result<ActionHandle, ClientError>;

    /// Block until the action finishes, failing with [`ClientError::Timeout`]
    /// once `timeout` elapses. A zero timeout waits forever.
    async fn wait_for_action_to_finish(
        &self,
        cancel: &CancellationToken,
        name: &str,
        namespace: &str,
        action: &str,
        timeout: Duration,
    ) -> Result<(), ClientError>;

    /// Tail the action's logs until it ends or `cancel` fires.
    async fn stream_logs(
        &self,
        cancel: &CancellationToken,
        name: &str,
        namespace: &str,
        action: &str,
    ) -> Result<(), ClientError>;
}
