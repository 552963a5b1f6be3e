use super::errors::BridgeError;
use super::route::validate_global_op;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Handler for a global inbound op
pub type OpHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Global op name -> handler
///
/// At most one handler per name; registering again replaces the previous one.
/// Handlers are cloned out before they run, so a handler may register further
/// ops without deadlocking.
#[derive(Default)]
pub struct OpRegistry {
    ops: RwLock<HashMap<String, OpHandler>>,
}

impl OpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any existing handler.
    ///
    /// Names in the plugin or task namespaces are rejected, since inbound
    /// routing would never reach them.
    pub fn register<F>(&self, name: &str, handler: F) -> Result<(), BridgeError>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        validate_global_op(name)?;

        let previous = self
            .ops
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(handler));

        if previous.is_some() {
            tracing::debug!(op = %name, "Replaced global op handler");
        } else {
            tracing::debug!(op = %name, "Registered global op handler");
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<OpHandler> {
        self.ops
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered op names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .ops
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.ops.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
