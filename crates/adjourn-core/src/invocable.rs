//! Serializable call descriptors.
//!
//! An [`InvocableUnit`] captures one deferred method call: which target it
//! runs on, which method to invoke, and the argument list. Units round-trip
//! through the job store as JSON and are re-bound to executable code by the
//! [`HandlerRegistry`](crate::registry::HandlerRegistry).

use crate::error::{QueueError, QueueResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Trait for types whose methods can be deferred.
///
/// Implementing `Target` gives a type a stable kind string used to key
/// handler registrations and to identify the receiver inside serialized
/// payloads. The receiver state itself travels through serde, so targets
/// without instance state (class-level calls) are just unit structs.
///
/// # Example
///
/// ```rust,ignore
/// use adjourn_core::Target;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Mailer {
///     sender: String,
/// }
///
/// impl Target for Mailer {
///     const KIND: &'static str = "mailer";
/// }
/// ```
pub trait Target: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name identifying this target type in payloads and the
    /// handler registry.
    const KIND: &'static str;
}

/// One deferred method call: target, method identifier, arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocableUnit {
    /// Registered kind of the target type.
    pub target_kind: String,

    /// Serialized receiver state, reconstructed at invocation time.
    pub target: Value,

    /// Method identifier to invoke on the target.
    pub method: String,

    /// Ordered argument list.
    pub args: Vec<Value>,
}

impl InvocableUnit {
    /// Describes a call on the given target with no arguments yet.
    ///
    /// Arguments are appended with [`InvocableUnit::arg`]. Whether the
    /// method actually exists is checked against the handler registry by
    /// the scheduler, not here.
    pub fn describe<T: Target>(target: &T, method: impl Into<String>) -> QueueResult<Self> {
        Ok(Self {
            target_kind: T::KIND.to_string(),
            target: serde_json::to_value(target)?,
            method: method.into(),
            args: Vec::new(),
        })
    }

    /// Appends one argument to the call.
    pub fn arg<A: Serialize>(mut self, value: A) -> QueueResult<Self> {
        self.args.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Replaces the argument list wholesale.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Serialize to JSON for storage in a job record payload.
    pub fn to_json(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a job record payload.
    pub fn from_json(json: &str) -> QueueResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Arguments handed to a registered handler, with typed accessors.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    values: Vec<Value>,
}

impl CallArgs {
    /// Wraps a raw argument list.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of arguments in the call.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when the call carries no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decodes the argument at `index` into a concrete type.
    ///
    /// A missing index is an execution error (wrong arity surfaces at
    /// execution time, not enqueue time); a present argument that fails to
    /// decode is a serialization error.
    pub fn get<A: DeserializeOwned>(&self, index: usize) -> QueueResult<A> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| QueueError::execution(format!("Missing call argument {index}")))?;
        Ok(serde_json::from_value(value.clone())?)
    }
}
