//! Queue error types.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-related errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No handler is registered for the target/method pair.
    #[error("No handler registered for {kind}::{method}")]
    TargetUnresolved { kind: String, method: String },

    /// A handler is already registered for the target/method pair.
    #[error("Handler already registered for {kind}::{method}")]
    HandlerExists { kind: String, method: String },

    /// Job execution failed.
    #[error("Job execution failed: {0}")]
    Execution(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage error.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl QueueError {
    /// Creates an execution error from any displayable cause.
    pub fn execution(message: impl Into<String>) -> Self {
        QueueError::Execution(message.into())
    }

    /// Distinguishes failures scoped to one run from failures of the
    /// queue wiring. Invocation errors and payloads that no longer decode
    /// are conditions of the job itself; unresolved targets, duplicate
    /// registrations, storage, and configuration errors point at the
    /// process setup.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QueueError::Execution(_) | QueueError::Serialization(_)
        )
    }
}
