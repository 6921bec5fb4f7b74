//! In-memory job store.

use crate::store::{DueQuery, JobStore, StoreResult};
use adjourn_core::{JobId, JobRecord, RunState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local store backed by a map.
///
/// Claim atomicity comes from the exclusive write lock: the check and the
/// lock-field update happen under one guard, so two claimants can never
/// both see the record as free. Suitable for tests and single-process
/// embedding; guards are never held across await points.
pub struct MemoryStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    run_state: RwLock<Option<RunState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            run_state: RwLock::new(None),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("jobs", &self.jobs.read().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, record: JobRecord) -> StoreResult<JobRecord> {
        self.jobs.write().insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn due(&self, query: &DueQuery) -> StoreResult<Vec<JobRecord>> {
        let jobs = self.jobs.read();
        let mut candidates: Vec<JobRecord> = jobs
            .values()
            .filter(|record| record.claimable(query.now, query.stale_before))
            .filter(|record| query.min_priority.map_or(true, |min| record.priority >= min))
            .filter(|record| query.max_priority.map_or(true, |max| record.priority <= max))
            .cloned()
            .collect();

        candidates.sort_by(|a, b| {
            a.run_at
                .cmp(&b.run_at)
                .then(a.priority.cmp(&b.priority))
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.as_str().cmp(b.id.as_str()))
        });
        candidates.truncate(query.limit);
        Ok(candidates)
    }

    async fn claim(
        &self,
        id: &JobId,
        worker: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(id) {
            Some(record) if record.claimable(now, stale_before) => {
                record.locked_at = Some(now);
                record.locked_by = Some(worker.to_string());
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn reschedule(&self, record: &JobRecord) -> StoreResult<u64> {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(&record.id) {
            Some(stored) => {
                stored.attempts = record.attempts;
                stored.last_error = record.last_error.clone();
                stored.run_at = record.run_at;
                stored.locked_at = None;
                stored.locked_by = None;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, id: &JobId) -> StoreResult<bool> {
        Ok(self.jobs.write().remove(id).is_some())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>> {
        Ok(self.jobs.read().get(id).cloned())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.jobs.read().len() as u64)
    }

    async fn clear_locks(&self, worker: &str) -> StoreResult<u64> {
        let mut jobs = self.jobs.write();
        let mut released = 0;
        for record in jobs.values_mut() {
            if record.locked_by.as_deref() == Some(worker) {
                record.clear_lock();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn run_state(&self) -> StoreResult<Option<RunState>> {
        Ok(*self.run_state.read())
    }

    async fn put_run_state(&self, state: RunState) -> StoreResult<()> {
        *self.run_state.write() = Some(state);
        Ok(())
    }
}
