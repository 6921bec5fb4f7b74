//! SQLite job store implementation.

use crate::store::{DueQuery, JobStore, StoreResult};
use adjourn_core::{JobId, JobRecord, RunState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};

/// Durable store backed by a SQLite database.
///
/// Claims go through a conditional UPDATE so that concurrent workers
/// compete on the row version: whoever the database applies first wins,
/// everyone else sees zero affected rows.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Database row representation of a job.
#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    payload: String,
    priority: i64,
    attempts: i64,
    run_at: DateTime<Utc>,
    locked_at: Option<DateTime<Utc>>,
    locked_by: Option<String>,
    last_error: Option<String>,
    sets_pace: bool,
    created_at: DateTime<Utc>,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        JobRecord {
            id: JobId::from(row.id),
            payload: row.payload,
            priority: row.priority as i32,
            attempts: row.attempts as u32,
            run_at: row.run_at,
            locked_at: row.locked_at,
            locked_by: row.locked_by,
            last_error: row.last_error,
            sets_pace: row.sets_pace,
            created_at: row.created_at,
        }
    }
}

const JOB_COLUMNS: &str = "id, payload, priority, attempts, run_at, locked_at, locked_by, \
     last_error, sets_pace, created_at";

impl SqliteStore {
    /// Opens a connection pool against the given SQLite URL.
    ///
    /// The database file is created if it does not exist. Call
    /// [`migrate`](Self::migrate) before first use.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        info!("Connecting to SQLite database...");

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("SQLite connection pool established");
        Ok(Self { pool })
    }

    /// Opens a private in-memory database.
    ///
    /// The pool is pinned to a single connection: each in-memory SQLite
    /// connection is its own database, so a wider pool would scatter
    /// rows across invisible siblings.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Creates the schema if it is not already present.
    pub async fn migrate(&self) -> StoreResult<()> {
        info!("Running job store migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                run_at TEXT NOT NULL,
                locked_at TEXT,
                locked_by TEXT,
                last_error TEXT,
                sets_pace INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_jobs_due ON jobs (run_at, priority, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_run_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Job store migrations completed");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    #[must_use]
    pub fn inner(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn insert(&self, record: JobRecord) -> StoreResult<JobRecord> {
        debug!("Inserting job: {}", record.id);

        sqlx::query(
            r#"
            INSERT INTO jobs (id, payload, priority, attempts, run_at, locked_at,
                              locked_by, last_error, sets_pace, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.payload)
        .bind(record.priority)
        .bind(i64::from(record.attempts))
        .bind(record.run_at)
        .bind(record.locked_at)
        .bind(&record.locked_by)
        .bind(&record.last_error)
        .bind(record.sets_pace)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn due(&self, query: &DueQuery) -> StoreResult<Vec<JobRecord>> {
        let mut sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE run_at <= ? AND (locked_at IS NULL OR locked_at < ?)"
        );
        if query.min_priority.is_some() {
            sql.push_str(" AND priority >= ?");
        }
        if query.max_priority.is_some() {
            sql.push_str(" AND priority <= ?");
        }
        sql.push_str(" ORDER BY run_at ASC, priority ASC, created_at ASC, id ASC LIMIT ?");

        let mut q = sqlx::query_as::<_, JobRow>(&sql)
            .bind(query.now)
            .bind(query.stale_before);
        if let Some(min) = query.min_priority {
            q = q.bind(min);
        }
        if let Some(max) = query.max_priority {
            q = q.bind(max);
        }

        let rows = q.bind(query.limit as i64).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(JobRecord::from).collect())
    }

    async fn claim(
        &self,
        id: &JobId,
        worker: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET locked_at = ?, locked_by = ?
            WHERE id = ? AND run_at <= ? AND (locked_at IS NULL OR locked_at < ?)
            "#,
        )
        .bind(now)
        .bind(worker)
        .bind(id.as_str())
        .bind(now)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn reschedule(&self, record: &JobRecord) -> StoreResult<u64> {
        debug!("Rescheduling job: {}", record.id);

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET attempts = ?, last_error = ?, run_at = ?,
                locked_at = NULL, locked_by = NULL
            WHERE id = ?
            "#,
        )
        .bind(i64::from(record.attempts))
        .bind(&record.last_error)
        .bind(record.run_at)
        .bind(record.id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: &JobId) -> StoreResult<bool> {
        debug!("Deleting job: {}", id);

        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(JobRecord::from))
    }

    async fn count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn clear_locks(&self, worker: &str) -> StoreResult<u64> {
        debug!("Clearing locks held by: {}", worker);

        let result = sqlx::query(
            "UPDATE jobs SET locked_at = NULL, locked_by = NULL WHERE locked_by = ?",
        )
        .bind(worker)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn run_state(&self) -> StoreResult<Option<RunState>> {
        let last_run_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT last_run_at FROM run_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(last_run_at.map(RunState::new))
    }

    async fn put_run_state(&self, state: RunState) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO run_state (id, last_run_at)
            VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET last_run_at = excluded.last_run_at
            "#,
        )
        .bind(state.last_run_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("size", &self.pool.size())
            .field("num_idle", &self.pool.num_idle())
            .finish()
    }
}
