//! Handler registry re-binding deserialized calls to known functions.
//!
//! Dispatch is a lookup from `(target kind, method)` to a handler closure
//! supplied at registration time, so the set of invocable methods is fixed
//! and validated up front rather than discovered reflectively from
//! payloads.

use crate::error::{QueueError, QueueResult};
use crate::invocable::{CallArgs, InvocableUnit, Target};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Type-erased handler: receiver state plus call arguments in, result
/// value out.
pub type Handler =
    Arc<dyn Fn(Value, CallArgs) -> BoxFuture<'static, QueueResult<Value>> + Send + Sync>;

/// Registry of deferred-call handlers, keyed by target kind and method.
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<(String, String), Handler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a handler for `method` on target type `T`.
    ///
    /// The handler receives the reconstructed receiver and the call
    /// arguments; its return value is serialized so callers can compare it
    /// against a direct invocation. Registering the same pair twice is an
    /// error, which keeps every `(kind, method)` bound to exactly one
    /// function.
    pub fn register<T, F, Fut, R>(&self, method: impl Into<String>, handler: F) -> QueueResult<()>
    where
        T: Target,
        F: Fn(T, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueueResult<R>> + Send + 'static,
        R: Serialize,
    {
        let method = method.into();
        let key = (T::KIND.to_string(), method.clone());

        let mut handlers = self.handlers.write();
        if handlers.contains_key(&key) {
            return Err(QueueError::HandlerExists {
                kind: T::KIND.to_string(),
                method,
            });
        }

        let handler = Arc::new(handler);
        let erased: Handler = Arc::new(move |state: Value, args: CallArgs| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let target: T = serde_json::from_value(state)?;
                let result = handler(target, args).await?;
                Ok(serde_json::to_value(result)?)
            })
        });

        handlers.insert(key, erased);
        debug!(kind = T::KIND, method = %method, "Registered call handler");
        Ok(())
    }

    /// Returns true when a handler is bound for the pair.
    pub fn contains(&self, kind: &str, method: &str) -> bool {
        self.handlers
            .read()
            .contains_key(&(kind.to_string(), method.to_string()))
    }

    /// Looks up the handler for the pair.
    pub fn resolve(&self, kind: &str, method: &str) -> QueueResult<Handler> {
        self.handlers
            .read()
            .get(&(kind.to_string(), method.to_string()))
            .cloned()
            .ok_or_else(|| QueueError::TargetUnresolved {
                kind: kind.to_string(),
                method: method.to_string(),
            })
    }

    /// Reconstructs the receiver from the unit's payload and invokes the
    /// bound handler with the unit's arguments.
    pub async fn invoke(&self, unit: &InvocableUnit) -> QueueResult<Value> {
        let handler = self.resolve(&unit.target_kind, &unit.method)?;
        handler(unit.target.clone(), CallArgs::new(unit.args.clone())).await
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns true when nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Text {
        value: String,
    }

    impl Target for Text {
        const KIND: &'static str = "text";
    }

    fn text_registry() -> HandlerRegistry {
        let registry = HandlerRegistry::new();
        registry
            .register::<Text, _, _, _>("length", |text, _args| async move {
                Ok(text.value.len())
            })
            .unwrap();
        registry
            .register::<Text, _, _, _>("count", |text, args: CallArgs| async move {
                let pattern: String = args.get(0)?;
                Ok(text.value.matches(&pattern).count())
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_contains_registered_pair() {
        let registry = text_registry();
        assert!(registry.contains("text", "length"));
        assert!(registry.contains("text", "count"));
        assert!(!registry.contains("text", "reverse"));
        assert!(!registry.contains("number", "length"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = text_registry();
        let err = registry
            .register::<Text, _, _, _>("length", |text, _args| async move {
                Ok(text.value.len())
            })
            .unwrap_err();

        match err {
            QueueError::HandlerExists { kind, method } => {
                assert_eq!(kind, "text");
                assert_eq!(method, "length");
            }
            _ => panic!("Expected HandlerExists error"),
        }
    }

    #[test]
    fn test_resolve_unknown_pair() {
        let registry = text_registry();
        let err = registry.resolve("text", "missing").err().unwrap();
        assert!(matches!(err, QueueError::TargetUnresolved { .. }));
    }

    #[tokio::test]
    async fn test_invoke_returns_direct_result() {
        let registry = text_registry();
        let text = Text {
            value: "string".to_string(),
        };
        let unit = InvocableUnit::describe(&text, "length").unwrap();

        let result = registry.invoke(&unit).await.unwrap();
        assert_eq!(result, Value::from("string".len()));
    }

    #[tokio::test]
    async fn test_invoke_with_arguments() {
        let registry = text_registry();
        let text = Text {
            value: "string".to_string(),
        };
        let unit = InvocableUnit::describe(&text, "count")
            .unwrap()
            .arg("r")
            .unwrap();

        let result = registry.invoke(&unit).await.unwrap();
        assert_eq!(result, Value::from(1));
    }

    #[tokio::test]
    async fn test_invoke_unregistered_method_fails() {
        let registry = text_registry();
        let text = Text {
            value: "string".to_string(),
        };
        let unit = InvocableUnit::describe(&text, "reverse").unwrap();

        let err = registry.invoke(&unit).await.unwrap_err();
        assert!(matches!(err, QueueError::TargetUnresolved { .. }));
    }

    #[tokio::test]
    async fn test_invoke_undecodable_state_is_serialization_error() {
        let registry = text_registry();
        let unit = InvocableUnit {
            target_kind: "text".to_string(),
            target: Value::from(42),
            method: "length".to_string(),
            args: Vec::new(),
        };

        let err = registry.invoke(&unit).await.unwrap_err();
        assert!(matches!(err, QueueError::Serialization(_)));
        assert!(err.is_retryable());
    }
}
