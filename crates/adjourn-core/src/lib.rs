//! # Adjourn Core
//!
//! Core types for the Adjourn deferred job queue: the serializable call
//! descriptor, the handler registry that re-binds deserialized calls to
//! statically known functions, the durable job record, and the retry
//! backoff policies. Storage backends and the scheduler/worker pair live
//! in the `adjourn-store` and `adjourn-queue` crates.

pub mod error;
pub mod invocable;
pub mod record;
pub mod registry;
pub mod retry;

pub use error::*;
pub use invocable::*;
pub use record::*;
pub use registry::*;
pub use retry::*;
