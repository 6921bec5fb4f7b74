//! Job store abstraction.

use adjourn_core::{JobId, JobRecord, QueueError, RunState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        QueueError::Store(err.to_string())
    }
}

/// Ordered query for due, claimable records.
#[derive(Debug, Clone)]
pub struct DueQuery {
    /// Records must satisfy `run_at <= now`.
    pub now: DateTime<Utc>,

    /// Locks older than this are treated as abandoned.
    pub stale_before: DateTime<Utc>,

    /// Lowest priority value accepted, inclusive.
    pub min_priority: Option<i32>,

    /// Highest priority value accepted, inclusive.
    pub max_priority: Option<i32>,

    /// Maximum number of candidates returned.
    pub limit: usize,
}

impl DueQuery {
    /// Creates a query for one candidate batch.
    pub fn new(now: DateTime<Utc>, stale_before: DateTime<Utc>) -> Self {
        Self {
            now,
            stale_before,
            min_priority: None,
            max_priority: None,
            limit: 5,
        }
    }

    /// Sets the candidate limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restricts candidates to a priority range.
    pub fn with_priority_bounds(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        self.min_priority = min;
        self.max_priority = max;
        self
    }
}

/// Record store contract for job queues.
///
/// Workers coordinate exclusively through [`JobStore::claim`]: whichever
/// worker's conditional update lands first owns the record, and the loser
/// sees an affected count of zero. The [`RunState`] singleton rides on the
/// same store so pacing survives process boundaries.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persists a new record.
    async fn insert(&self, record: JobRecord) -> StoreResult<JobRecord>;

    /// Returns due, claimable records ordered by `run_at`, then priority
    /// (lower first), then `created_at`.
    async fn due(&self, query: &DueQuery) -> StoreResult<Vec<JobRecord>>;

    /// Conditionally locks a record for `worker`: succeeds only while the
    /// record is still due and its lock is null or stale. Returns the
    /// affected-row count; zero means another worker won the race or the
    /// record is gone.
    async fn claim(
        &self,
        id: &JobId,
        worker: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Writes back attempt count, error text, and the next `run_at`, and
    /// clears the lock fields. Returns the affected-row count.
    async fn reschedule(&self, record: &JobRecord) -> StoreResult<u64>;

    /// Removes a record. Returns false when it was already gone.
    async fn delete(&self, id: &JobId) -> StoreResult<bool>;

    /// Fetches a record by ID.
    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>>;

    /// Number of records currently stored.
    async fn count(&self) -> StoreResult<u64>;

    /// Releases every lock held under `worker`. Returns how many were
    /// released.
    async fn clear_locks(&self, worker: &str) -> StoreResult<u64>;

    /// Reads the pacing singleton, if it has been created.
    async fn run_state(&self) -> StoreResult<Option<RunState>>;

    /// Creates or replaces the pacing singleton.
    async fn put_run_state(&self, state: RunState) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_query_defaults() {
        let now = Utc::now();
        let query = DueQuery::new(now, now - chrono::Duration::hours(4));
        assert_eq!(query.limit, 5);
        assert!(query.min_priority.is_none());
        assert!(query.max_priority.is_none());
    }

    #[test]
    fn test_due_query_builder() {
        let now = Utc::now();
        let query = DueQuery::new(now, now)
            .with_limit(10)
            .with_priority_bounds(Some(-5), Some(5));
        assert_eq!(query.limit, 10);
        assert_eq!(query.min_priority, Some(-5));
        assert_eq!(query.max_priority, Some(5));
    }

    #[test]
    fn test_store_error_converts_to_queue_error() {
        let err = StoreError::from(serde_json::from_str::<u32>("oops").unwrap_err());
        let queue_err = QueueError::from(err);
        assert!(matches!(queue_err, QueueError::Store(_)));
    }
}
