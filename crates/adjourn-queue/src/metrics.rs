//! Prometheus metrics for queue monitoring.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names for the queue system.
pub mod names {
    /// Total jobs enqueued.
    pub const JOBS_ENQUEUED_TOTAL: &str = "adjourn_jobs_enqueued_total";
    /// Total jobs completed successfully.
    pub const JOBS_COMPLETED_TOTAL: &str = "adjourn_jobs_completed_total";
    /// Total failed runs rescheduled for retry.
    pub const JOBS_RETRIED_TOTAL: &str = "adjourn_jobs_retried_total";
    /// Total jobs that exhausted their attempts.
    pub const JOBS_FAILED_TOTAL: &str = "adjourn_jobs_failed_total";
    /// Total claims lost to another worker.
    pub const CLAIM_CONFLICTS_TOTAL: &str = "adjourn_claim_conflicts_total";

    /// Current jobs waiting in the store.
    pub const JOBS_PENDING: &str = "adjourn_jobs_pending";

    /// Job execution duration in seconds.
    pub const JOB_DURATION_SECONDS: &str = "adjourn_job_duration_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        names::JOBS_ENQUEUED_TOTAL,
        "Total number of jobs enqueued"
    );
    describe_counter!(
        names::JOBS_COMPLETED_TOTAL,
        "Total number of jobs completed successfully"
    );
    describe_counter!(
        names::JOBS_RETRIED_TOTAL,
        "Total number of failed runs rescheduled for retry"
    );
    describe_counter!(
        names::JOBS_FAILED_TOTAL,
        "Total number of jobs that exhausted their attempts"
    );
    describe_counter!(
        names::CLAIM_CONFLICTS_TOTAL,
        "Total number of claims lost to another worker"
    );

    describe_gauge!(
        names::JOBS_PENDING,
        "Current number of jobs waiting in the store"
    );

    describe_histogram!(
        names::JOB_DURATION_SECONDS,
        "Job execution duration in seconds"
    );
}

/// Queue metrics recorder.
#[derive(Clone)]
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record a job enqueued.
    pub fn job_enqueued(kind: &str, method: &str) {
        counter!(
            names::JOBS_ENQUEUED_TOTAL,
            "kind" => kind.to_string(),
            "method" => method.to_string()
        )
        .increment(1);
    }

    /// Record a job completed.
    pub fn job_completed(kind: &str, method: &str, duration: Duration) {
        counter!(
            names::JOBS_COMPLETED_TOTAL,
            "kind" => kind.to_string(),
            "method" => method.to_string()
        )
        .increment(1);

        histogram!(
            names::JOB_DURATION_SECONDS,
            "kind" => kind.to_string(),
            "method" => method.to_string(),
            "status" => "completed"
        )
        .record(duration.as_secs_f64());
    }

    /// Record a failed run rescheduled for retry.
    pub fn job_retried(kind: &str, method: &str, attempt: u32) {
        counter!(
            names::JOBS_RETRIED_TOTAL,
            "kind" => kind.to_string(),
            "method" => method.to_string(),
            "attempt" => attempt.to_string()
        )
        .increment(1);
    }

    /// Record a job that exhausted its attempts.
    pub fn job_failed(kind: &str, method: &str) {
        counter!(
            names::JOBS_FAILED_TOTAL,
            "kind" => kind.to_string(),
            "method" => method.to_string()
        )
        .increment(1);
    }

    /// Record a claim lost to another worker.
    pub fn claim_conflict() {
        counter!(names::CLAIM_CONFLICTS_TOTAL).increment(1);
    }

    /// Update the pending-jobs gauge.
    pub fn update_queue_depth(pending: u64) {
        gauge!(names::JOBS_PENDING).set(pending as f64);
    }
}
