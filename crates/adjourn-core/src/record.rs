//! Durable job records and the pacing singleton.

use crate::error::QueueResult;
use crate::invocable::InvocableUnit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Creates a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a job ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the job ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Durable queue entry wrapping a serialized [`InvocableUnit`] with
/// scheduling, locking, and attempt metadata.
///
/// A record exists only while the call is pending or retrying: success and
/// permanent failure both remove it from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job ID.
    pub id: JobId,

    /// Serialized invocable unit (JSON).
    pub payload: String,

    /// Ordering hint among simultaneously due jobs; lower runs sooner.
    pub priority: i32,

    /// Count of prior failed executions.
    pub attempts: u32,

    /// Earliest time a worker may execute this job.
    pub run_at: DateTime<Utc>,

    /// Set while a worker holds the job.
    pub locked_at: Option<DateTime<Utc>>,

    /// Identity of the worker holding the lock.
    pub locked_by: Option<String>,

    /// Error text from the last failed attempt.
    pub last_error: Option<String>,

    /// When true, this job's completion time becomes the pacing baseline
    /// for subsequent immediate enqueues.
    pub sets_pace: bool,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// Creates a new record for the given call, scheduled at `run_at`.
    pub fn new(unit: &InvocableUnit, run_at: DateTime<Utc>) -> QueueResult<Self> {
        Ok(Self {
            id: JobId::new(),
            payload: unit.to_json()?,
            priority: 0,
            attempts: 0,
            run_at,
            locked_at: None,
            locked_by: None,
            last_error: None,
            sets_pace: false,
            created_at: Utc::now(),
        })
    }

    /// Sets the ordering hint.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Deserializes the invocable unit from the payload.
    pub fn unit(&self) -> QueueResult<InvocableUnit> {
        InvocableUnit::from_json(&self.payload)
    }

    /// Returns true while a worker holds this record.
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// Returns true when the held lock predates `stale_before` and may be
    /// reclaimed by another worker.
    pub fn lock_stale(&self, stale_before: DateTime<Utc>) -> bool {
        matches!(self.locked_at, Some(locked_at) if locked_at < stale_before)
    }

    /// Returns true when a worker may claim this record: it is due and
    /// either unlocked or abandoned under a stale lock.
    pub fn claimable(&self, now: DateTime<Utc>, stale_before: DateTime<Utc>) -> bool {
        self.run_at <= now && (!self.is_locked() || self.lock_stale(stale_before))
    }

    /// Records one failed execution: bumps the attempt count, stores the
    /// error text, reschedules to `run_at`, and releases the lock.
    pub fn record_failure(&mut self, error: &str, run_at: DateTime<Utc>) {
        self.attempts += 1;
        self.last_error = Some(error.to_string());
        self.run_at = run_at;
        self.clear_lock();
    }

    /// Clears the lock fields.
    pub fn clear_lock(&mut self) {
        self.locked_at = None;
        self.locked_by = None;
    }
}

/// Singleton pacing record: the run time most recently handed out to a
/// paced job, or the completion time of the last pace-setting execution.
///
/// Advisory state, not a lock; persisted through the store so pacing holds
/// across worker processes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Pacing baseline for the next immediate-run decision.
    pub last_run_at: DateTime<Utc>,
}

impl RunState {
    /// Creates a run state anchored at the given time.
    pub fn new(last_run_at: DateTime<Utc>) -> Self {
        Self { last_run_at }
    }
}
