//! Adjourn Queue - Scheduling and Execution
//!
//! The enqueue/execute half of the Adjourn deferred job queue:
//! - Pacing-aware scheduler persisting invocable units as job records
//! - Worker loop claiming due jobs through atomic conditional updates
//! - Polynomial backoff with a configurable terminal attempt count
//! - Permanent failure reporting through a pluggable channel
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adjourn Architecture                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  Caller                                                      │
//! │     │ InvocableUnit::describe(target, method)                │
//! │     ▼                                                        │
//! │  ┌─────────────┐   resolve    ┌─────────────────────┐        │
//! │  │  Scheduler  │─────────────▶│  Handler Registry   │        │
//! │  └──────┬──────┘              └──────────▲──────────┘        │
//! │         │ insert (run_at from pacing)    │ invoke            │
//! │         ▼                                │                   │
//! │  ┌─────────────────────────┐      ┌──────┴───────┐           │
//! │  │        JobStore         │ due/ │    Worker    │           │
//! │  │  jobs + run_state       │◀────▶│  claim loop  │           │
//! │  │  (memory / sqlite)      │claim └──────┬───────┘           │
//! │  └─────────────────────────┘             │                   │
//! │                      success: delete     │ failure: backoff, │
//! │                      + advance pacing    │ reschedule or     │
//! │                                          ▼ report            │
//! │                                 ┌────────────────┐           │
//! │                                 │FailureReporter │           │
//! │                                 └────────────────┘           │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use adjourn_core::{CallArgs, HandlerRegistry, InvocableUnit, Target};
//! use adjourn_queue::{QueueConfig, Scheduler, Worker};
//! use adjourn_store::SqliteStore;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Mailer {
//!     address: String,
//! }
//!
//! impl Target for Mailer {
//!     const KIND: &'static str = "mailer";
//! }
//!
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.register::<Mailer, _, _, _>("deliver", |mailer, _args: CallArgs| async move {
//!     // Send mail to mailer.address
//!     Ok(())
//! })?;
//!
//! let store = Arc::new(SqliteStore::connect("sqlite:jobs.db").await?);
//! store.migrate().await?;
//!
//! let config = QueueConfig::from_env()?;
//! let scheduler = Scheduler::new(store.clone(), registry.clone(), config.clone());
//!
//! let mailer = Mailer { address: "user@example.com".to_string() };
//! scheduler.enqueue(InvocableUnit::describe(&mailer, "deliver")?).await?;
//!
//! let worker = Worker::new(store, registry, config);
//! worker.start().await?;
//! ```

pub mod config;
pub mod metrics;
pub mod reporter;
pub mod scheduler;
pub mod worker;

pub use config::QueueConfig;
pub use metrics::{register_metrics, QueueMetrics};
pub use reporter::{FailureReporter, LoggingReporter};
pub use scheduler::Scheduler;
pub use worker::{WorkOutcome, Worker};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::QueueConfig;
    pub use crate::reporter::FailureReporter;
    pub use crate::scheduler::Scheduler;
    pub use crate::worker::Worker;
    pub use adjourn_core::{
        CallArgs, HandlerRegistry, InvocableUnit, JobId, JobRecord, QueueError, QueueResult,
        RetryPolicy, Target,
    };
    pub use adjourn_store::{JobStore, MemoryStore, SqliteStore};
}
