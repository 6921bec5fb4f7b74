//! Worker loop for executing due jobs.

use crate::config::QueueConfig;
use crate::metrics::QueueMetrics;
use crate::reporter::{FailureReporter, LoggingReporter};
use adjourn_core::{
    HandlerRegistry, JobRecord, QueueError, QueueResult, RetryPolicy, RunState,
};
use adjourn_store::{DueQuery, JobStore};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Counts from one work cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkOutcome {
    /// Jobs that ran to completion.
    pub succeeded: usize,

    /// Jobs that failed and were rescheduled or retired.
    pub failed: usize,
}

impl WorkOutcome {
    /// Total jobs handled in the cycle.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Executes due jobs one at a time.
///
/// A worker owns no jobs: it claims each record through the store's
/// conditional update and competes with every other worker against the
/// shared store. Concurrency comes from running several workers, not
/// from parallelism inside one.
pub struct Worker {
    /// Unique worker name, recorded in `locked_by`.
    name: String,

    /// Job record store.
    store: Arc<dyn JobStore>,

    /// Handler registry used to execute payloads.
    registry: Arc<HandlerRegistry>,

    /// Queue configuration.
    config: QueueConfig,

    /// Backoff policy for failed runs.
    retry_policy: RetryPolicy,

    /// Sink for permanently failed jobs.
    reporter: Arc<dyn FailureReporter>,

    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,

    /// Running flag.
    running: AtomicBool,

    /// Jobs completed counter.
    jobs_succeeded: AtomicU64,

    /// Jobs failed counter.
    jobs_failed: AtomicU64,
}

impl Worker {
    /// Creates a worker with a generated name, the default polynomial
    /// backoff, and the logging failure reporter.
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        config: QueueConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            name: format!("worker-{}", Uuid::new_v4()),
            store,
            registry,
            config,
            retry_policy: RetryPolicy::default(),
            reporter: Arc::new(LoggingReporter),
            shutdown_tx,
            running: AtomicBool::new(false),
            jobs_succeeded: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
        }
    }

    /// Overrides the generated worker name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the backoff policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Overrides the failure reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Runs the worker loop until [`stop`](Self::stop) is called.
    ///
    /// On startup any locks still held under this worker's name are
    /// released; they can only be left over from a previous incarnation
    /// that crashed mid-run.
    pub async fn start(&self) -> QueueResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(QueueError::Configuration(
                "Worker already running".to_string(),
            ));
        }

        info!(
            worker = %self.name,
            poll_interval_ms = self.config.poll_interval_ms,
            claim_batch = self.config.claim_batch,
            "Starting worker"
        );

        let released = self.store.clear_locks(&self.name).await?;
        if released > 0 {
            warn!(
                worker = %self.name,
                released,
                "Released locks left by a previous incarnation"
            );
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            let outcome = match self.work_off(self.config.claim_batch).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(worker = %self.name, error = %e, "Work cycle failed");
                    WorkOutcome::default()
                }
            };

            match self.store.count().await {
                Ok(pending) => QueueMetrics::update_queue_depth(pending),
                Err(e) => debug!(worker = %self.name, error = %e, "Failed to read queue depth"),
            }

            if outcome.total() == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(self.config.poll_interval()) => {}
                }
            } else if !matches!(
                shutdown_rx.try_recv(),
                Err(broadcast::error::TryRecvError::Empty)
            ) {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);

        info!(
            worker = %self.name,
            succeeded = self.succeeded(),
            failed = self.failed(),
            "Worker stopped"
        );

        Ok(())
    }

    /// Signals the worker loop to stop after the current job.
    pub fn stop(&self) {
        info!(worker = %self.name, "Stopping worker...");
        let _ = self.shutdown_tx.send(());
    }

    /// Drains up to `max` due jobs without sleeping.
    pub async fn work_off(&self, max: usize) -> QueueResult<WorkOutcome> {
        let mut outcome = WorkOutcome::default();

        while outcome.total() < max {
            match self.run_once().await? {
                Some(true) => outcome.succeeded += 1,
                Some(false) => outcome.failed += 1,
                None => break,
            }
        }

        Ok(outcome)
    }

    /// Claims and executes one due job.
    ///
    /// Returns `None` when nothing could be claimed, otherwise whether the
    /// executed job succeeded. A lost claim race is not a failure; the
    /// walk just moves to the next candidate.
    pub async fn run_once(&self) -> QueueResult<Option<bool>> {
        let now = Utc::now();
        let stale_before = now - self.config.lock_staleness();
        let query = DueQuery::new(now, stale_before)
            .with_limit(self.config.claim_batch)
            .with_priority_bounds(self.config.min_priority, self.config.max_priority);

        let candidates = self.store.due(&query).await?;

        for record in candidates {
            let claimed = self
                .store
                .claim(&record.id, &self.name, now, stale_before)
                .await?;

            if claimed == 0 {
                debug!(worker = %self.name, job_id = %record.id, "Lost claim race");
                QueueMetrics::claim_conflict();
                continue;
            }

            let succeeded = self.execute(record).await?;
            return Ok(Some(succeeded));
        }

        Ok(None)
    }

    /// Returns the worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the worker loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the number of jobs completed.
    pub fn succeeded(&self) -> u64 {
        self.jobs_succeeded.load(Ordering::Relaxed)
    }

    /// Get the number of jobs failed.
    pub fn failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    async fn execute(&self, mut record: JobRecord) -> QueueResult<bool> {
        let started = Instant::now();

        let (kind, method, result) = match record.unit() {
            Ok(unit) => {
                debug!(
                    worker = %self.name,
                    job_id = %record.id,
                    kind = %unit.target_kind,
                    method = %unit.method,
                    "Processing job"
                );
                let result = self.registry.invoke(&unit).await;
                (unit.target_kind, unit.method, result)
            }
            // The payload text itself no longer parses; fails like any
            // other run so it retires after max_attempts.
            Err(e) => ("unknown".to_string(), "unknown".to_string(), Err(e)),
        };

        match result {
            Ok(_) => {
                let completed_at = Utc::now();
                self.store.delete(&record.id).await?;
                if record.sets_pace {
                    self.store
                        .put_run_state(RunState::new(completed_at))
                        .await?;
                }

                self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
                QueueMetrics::job_completed(&kind, &method, started.elapsed());
                info!(
                    worker = %self.name,
                    job_id = %record.id,
                    kind = %kind,
                    method = %method,
                    "Job completed"
                );
                Ok(true)
            }
            Err(e) => {
                self.handle_failure(&mut record, &e, &kind, &method).await?;
                self.jobs_failed.fetch_add(1, Ordering::Relaxed);
                Ok(false)
            }
        }
    }

    async fn handle_failure(
        &self,
        record: &mut JobRecord,
        error: &QueueError,
        kind: &str,
        method: &str,
    ) -> QueueResult<()> {
        let now = Utc::now();
        let delay = self.retry_policy.delay_for_attempt(record.attempts + 1);
        let backoff = chrono::Duration::from_std(delay)
            .unwrap_or_else(|_| chrono::Duration::days(7));
        record.record_failure(&error.to_string(), now + backoff);

        if record.attempts >= self.config.max_attempts {
            self.store.delete(&record.id).await?;

            QueueMetrics::job_failed(kind, method);
            error!(
                worker = %self.name,
                job_id = %record.id,
                attempts = record.attempts,
                error = %error,
                "Job exhausted its attempts"
            );
            self.reporter.permanent_failure(record, error).await;
        } else {
            if self.store.reschedule(record).await? == 0 {
                warn!(worker = %self.name, job_id = %record.id, "Job vanished before reschedule");
            }

            QueueMetrics::job_retried(kind, method, record.attempts);
            warn!(
                worker = %self.name,
                job_id = %record.id,
                attempts = record.attempts,
                run_at = %record.run_at,
                error = %error,
                "Job failed, retry scheduled"
            );
        }

        Ok(())
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
