use std::time::Duration;

use thiserror::Error;

use crate::output::OutputMode;

/// A stage inside a step's log stream reported an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error on stage {stage}: {message}")]
pub struct CommandError {
    pub stage: String,
    pub message: String,
    pub output: OutputMode,
}

/// Terminal outcomes of following a build trace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// A vertex descriptor carried a non-empty error. The trace is no longer usable.
    #[error("error on stage {name}: {error}")]
    StepFailed { name: String, error: String },

    #[error(transparent)]
    Command(#[from] CommandError),

    /// The manifest could not be loaded; nothing else can proceed.
    #[error("{0}")]
    ManifestLoad(String),

    #[error("trace cancelled")]
    Cancelled,
}

/// Failures reported by a remote action client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not found")]
    NotFound,

    #[error("timed out after {}s waiting for the action to finish", .0.as_secs())]
    Timeout(Duration),

    #[error("{operation} failed: {message}")]
    Remote { operation: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outcome of a supervised remote action that did not complete successfully.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The user asked for cancellation (Ctrl+C).
    #[error("interrupt signal received")]
    Interrupted,

    /// The cause is formatted into the message, not exposed as a source.
    #[error("failed to {operation}: {cause}")]
    Failed { operation: String, cause: ClientError },
}

impl ActionError {
    pub fn failed(operation: impl Into<String>, cause: ClientError) -> Self {
        ActionError::Failed {
            operation: operation.into(),
            cause,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ActionError::Failed {
                cause: ClientError::NotFound,
                ..
            }
        )
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ActionError::Interrupted)
    }
}
