//! Permanent failure reporting.

use adjourn_core::{JobRecord, QueueError};
use async_trait::async_trait;
use tracing::error;

/// Receives jobs that exhausted their attempts.
///
/// The worker deletes a permanently failed record and hands it to the
/// reporter as the last observer. Implementations forward to whatever
/// alerting channel the deployment uses.
#[async_trait]
pub trait FailureReporter: Send + Sync {
    /// Called once per permanently failed job, after deletion.
    async fn permanent_failure(&self, record: &JobRecord, error: &QueueError);
}

/// Default reporter that only logs.
#[derive(Debug, Clone, Default)]
pub struct LoggingReporter;

#[async_trait]
impl FailureReporter for LoggingReporter {
    async fn permanent_failure(&self, record: &JobRecord, error: &QueueError) {
        error!(
            job_id = %record.id,
            attempts = record.attempts,
            error = %error,
            "Job permanently failed"
        );
    }
}
