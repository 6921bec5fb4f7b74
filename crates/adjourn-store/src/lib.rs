//! # Adjourn Store
//!
//! Storage backends for Adjourn job records. The scheduler and worker
//! talk to the [`JobStore`] trait only; this crate ships two
//! implementations:
//!
//! - [`MemoryStore`]: process-local map, used by tests and embedded
//!   single-process setups.
//! - [`SqliteStore`]: durable SQLite backend over an SQLx pool, where
//!   claim atomicity comes from conditional `UPDATE` statements.
//!
//! Every trait method is individually atomic; nothing here requires
//! cross-record transactions.

pub mod memory;
pub mod sqlite;
pub mod store;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::*;
