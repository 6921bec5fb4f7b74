//! Job scheduling and pacing.

use crate::config::QueueConfig;
use crate::metrics::QueueMetrics;
use adjourn_core::{HandlerRegistry, InvocableUnit, JobRecord, QueueResult, RunState};
use adjourn_store::JobStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Persists deferred invocations as job records.
///
/// Every enqueue resolves the unit against the handler registry first, so
/// a call with no registered handler is rejected before anything is
/// written. Scheduling follows the pacing policy: explicit times are taken
/// verbatim, immediate enqueues are spaced at least `min_spacing` apart
/// using the run state tracker.
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    config: QueueConfig,
}

impl Scheduler {
    /// Creates a new scheduler.
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Enqueues a unit to run as soon as pacing allows.
    pub async fn enqueue(&self, unit: InvocableUnit) -> QueueResult<JobRecord> {
        self.enqueue_with(unit, 0, None).await
    }

    /// Enqueues a unit to run at an explicit time.
    ///
    /// The caller-specified schedule is authoritative: pacing is not
    /// applied and the run state tracker is neither read nor written.
    pub async fn enqueue_at(
        &self,
        unit: InvocableUnit,
        run_at: DateTime<Utc>,
    ) -> QueueResult<JobRecord> {
        self.enqueue_with(unit, 0, Some(run_at)).await
    }

    /// Enqueues a unit with a priority and an optional explicit time.
    ///
    /// Lower priority values run sooner among simultaneously due jobs.
    pub async fn enqueue_with(
        &self,
        unit: InvocableUnit,
        priority: i32,
        run_at: Option<DateTime<Utc>>,
    ) -> QueueResult<JobRecord> {
        self.registry.resolve(&unit.target_kind, &unit.method)?;

        let now = Utc::now();
        let (run_at, sets_pace) = match run_at {
            Some(at) => (at, false),
            None => self.paced_run_at(now).await?,
        };

        let mut record = JobRecord::new(&unit, run_at)?.with_priority(priority);
        record.sets_pace = sets_pace;
        let record = self.store.insert(record).await?;

        QueueMetrics::job_enqueued(&unit.target_kind, &unit.method);
        debug!(
            job_id = %record.id,
            kind = %unit.target_kind,
            method = %unit.method,
            run_at = %record.run_at,
            sets_pace = record.sets_pace,
            "Enqueued job"
        );

        Ok(record)
    }

    /// Computes the run time for an enqueue without an explicit schedule.
    ///
    /// Returns the run time and whether this job sets the pace (runs
    /// immediately and must write its completion time back to the
    /// tracker).
    async fn paced_run_at(&self, now: DateTime<Utc>) -> QueueResult<(DateTime<Utc>, bool)> {
        let spacing = self.config.min_spacing();
        if spacing.is_zero() {
            return Ok((now, false));
        }

        let last_run_at = match self.store.run_state().await? {
            Some(state) => state.last_run_at,
            None => {
                self.store.put_run_state(RunState::new(now)).await?;
                now
            }
        };

        if now >= last_run_at + spacing {
            // Runs immediately; the worker advances the tracker to the
            // completion time once the job finishes.
            Ok((now, true))
        } else {
            // The next free slot is reserved for this job up front.
            let reserved = last_run_at + spacing;
            self.store.put_run_state(RunState::new(reserved)).await?;
            Ok((reserved, false))
        }
    }

    /// Returns the number of stored jobs.
    pub async fn job_count(&self) -> QueueResult<u64> {
        Ok(self.store.count().await?)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("handlers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adjourn_core::{CallArgs, QueueError, Target};
    use adjourn_store::MemoryStore;
    use chrono::Duration;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Text {
        value: String,
    }

    impl Target for Text {
        const KIND: &'static str = "text";
    }

    fn registry() -> Arc<HandlerRegistry> {
        let registry = HandlerRegistry::new();
        registry
            .register::<Text, _, _, _>("length", |target, _args: CallArgs| async move {
                Ok(target.value.len())
            })
            .unwrap();
        Arc::new(registry)
    }

    fn scheduler(config: QueueConfig) -> (Scheduler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Scheduler::new(store.clone(), registry(), config);
        (scheduler, store)
    }

    fn length_unit() -> InvocableUnit {
        let text = Text {
            value: "string".to_string(),
        };
        InvocableUnit::describe(&text, "length").unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_adds_one_job() {
        let (scheduler, store) = scheduler(QueueConfig::default());

        scheduler.enqueue(length_unit()).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(scheduler.job_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_unregistered_method() {
        let (scheduler, store) = scheduler(QueueConfig::default());
        let text = Text {
            value: "string".to_string(),
        };
        let unit = InvocableUnit::describe(&text, "reverse").unwrap();

        let err = scheduler.enqueue(unit).await.unwrap_err();
        assert!(matches!(err, QueueError::TargetUnresolved { .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_at_uses_explicit_time() {
        let (scheduler, _store) = scheduler(QueueConfig::default());
        let at = Utc::now() + Duration::hours(1);

        let record = scheduler.enqueue_at(length_unit(), at).await.unwrap();

        assert_eq!(record.run_at, at);
        assert!(!record.sets_pace);
    }

    #[tokio::test]
    async fn test_explicit_time_skips_pacing() {
        let config = QueueConfig {
            min_spacing_secs: 60,
            ..QueueConfig::default()
        };
        let (scheduler, store) = scheduler(config);
        let at = Utc::now() + Duration::hours(1);

        scheduler.enqueue_at(length_unit(), at).await.unwrap();

        assert!(store.run_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_spacing_runs_now() {
        let (scheduler, store) = scheduler(QueueConfig::default());
        let before = Utc::now();

        let record = scheduler.enqueue(length_unit()).await.unwrap();

        assert!(record.run_at >= before);
        assert!(record.run_at <= Utc::now());
        assert!(!record.sets_pace);
        assert!(store.run_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paced_enqueues_are_spaced_apart() {
        let config = QueueConfig {
            min_spacing_secs: 60,
            ..QueueConfig::default()
        };
        let (scheduler, _store) = scheduler(config);

        let first = scheduler.enqueue(length_unit()).await.unwrap();
        let second = scheduler.enqueue(length_unit()).await.unwrap();

        assert_eq!(second.run_at - first.run_at, Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_elapsed_spacing_runs_immediately() {
        let config = QueueConfig {
            min_spacing_secs: 60,
            ..QueueConfig::default()
        };
        let (scheduler, store) = scheduler(config);

        let long_ago = Utc::now() - Duration::hours(1);
        store.put_run_state(RunState::new(long_ago)).await.unwrap();

        let before = Utc::now();
        let record = scheduler.enqueue(length_unit()).await.unwrap();

        assert!(record.run_at >= before);
        assert!(record.run_at <= Utc::now());
        assert!(record.sets_pace);

        // The tracker still holds the old value until the job completes.
        let state = store.run_state().await.unwrap().unwrap();
        assert_eq!(state.last_run_at, long_ago);
    }

    #[tokio::test]
    async fn test_reserved_slot_advances_tracker() {
        let config = QueueConfig {
            min_spacing_secs: 60,
            ..QueueConfig::default()
        };
        let (scheduler, store) = scheduler(config);

        let recent = Utc::now() - Duration::seconds(10);
        store.put_run_state(RunState::new(recent)).await.unwrap();

        let record = scheduler.enqueue(length_unit()).await.unwrap();

        assert_eq!(record.run_at, recent + Duration::seconds(60));
        assert!(!record.sets_pace);

        let state = store.run_state().await.unwrap().unwrap();
        assert_eq!(state.last_run_at, record.run_at);
    }

    #[tokio::test]
    async fn test_enqueue_with_sets_priority() {
        let (scheduler, _store) = scheduler(QueueConfig::default());

        let record = scheduler
            .enqueue_with(length_unit(), -3, None)
            .await
            .unwrap();

        assert_eq!(record.priority, -3);
    }
}
