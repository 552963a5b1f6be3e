use super::errors::BridgeError;
use super::outbound::Outbound;
use crate::config::{BridgeConfig, DuplicatePolicy, LateRegistration};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Error returned by a plugin op handler
///
/// Reported to the backend at ERROR level; never fatal to the bridge.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PluginError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid data for {op}: {reason}")]
    InvalidData { op: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

/// Which optional lifecycle hooks a plugin implements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleHooks {
    /// Structural phase, run first
    pub auto_init: bool,
    /// Custom phase, run after `auto_init`
    pub init: bool,
}

impl LifecycleHooks {
    pub const NONE: Self = Self {
        auto_init: false,
        init: false,
    };

    pub const ALL: Self = Self {
        auto_init: true,
        init: true,
    };
}

/// Bindings injected into a plugin at registration
///
/// Everything the plugin sends is scoped to its own name.
#[derive(Clone)]
pub struct PluginContext {
    name: String,
    outbound: Outbound,
}

impl PluginContext {
    pub(crate) fn new(name: impl Into<String>, outbound: Outbound) -> Self {
        Self {
            name: name.into(),
            outbound,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send `Plugin|<name>|<op>` to the backend
    pub fn send(&self, op: &str, data: Value) {
        tracing::debug!(plugin = %self.name, op = %op, "Plugin op to backend");
        self.outbound.plugin_send(&self.name, op, data);
    }

    pub fn info(&self, message: &str) {
        self.outbound.info(message);
    }

    pub fn error(&self, message: &str) {
        self.outbound.error(message);
    }

    pub fn warning(&self, message: &str) {
        self.outbound.warning(message);
    }

    pub fn debug(&self, message: &str) {
        self.outbound.debug(message);
    }

    /// Unscoped access, for plugins that also call global backend ops
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }
}

/// Plugin trait - implement this to add a client-side plugin
///
/// # Example
/// ```ignore
/// struct Clock { context: Option<PluginContext> }
///
/// impl Plugin for Clock {
///     fn attach(&mut self, context: PluginContext) { self.context = Some(context); }
///     fn hooks(&self) -> LifecycleHooks { LifecycleHooks { auto_init: false, init: true } }
///     fn init(&self) { /* ... */ }
///     fn operations(&self) -> Vec<&str> { vec!["tick"] }
///     fn call(&self, op: &str, data: Value) -> Result<(), PluginError> {
///         match op {
///             "tick" => Ok(()),
///             _ => Err(PluginError::UnknownOperation(op.to_string())),
///         }
///     }
/// }
/// ```
pub trait Plugin: Send + Sync + 'static {
    /// Registry key and middle segment of this plugin's scoped ops.
    ///
    /// Defaults to the type name without its module path or generics.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Receive the injected bindings. Called once, at registration.
    fn attach(&mut self, context: PluginContext);

    /// Hooks run by plugin initialization; undeclared hooks are skipped
    fn hooks(&self) -> LifecycleHooks {
        LifecycleHooks::NONE
    }

    fn auto_init(&self) {}

    fn init(&self) {}

    /// Ops the backend may call on this plugin
    fn operations(&self) -> Vec<&str>;

    /// Handle an op from [`operations`](Self::operations)
    fn call(&self, op: &str, data: Value) -> Result<(), PluginError>;
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Result of adding a plugin to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Inserted {
    /// Another instance under the same name was replaced
    pub replaced: bool,
    /// Plugins were already initialized when this one arrived
    pub late: bool,
}

#[derive(Default)]
struct Registered {
    order: Vec<String>,
    by_name: HashMap<String, Arc<dyn Plugin>>,
    initialized: bool,
}

/// Plugin instances in registration order
#[derive(Default)]
pub struct PluginRegistry {
    inner: RwLock<Registered>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &self,
        name: &str,
        plugin: Arc<dyn Plugin>,
        config: &BridgeConfig,
    ) -> Result<Inserted, BridgeError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let late = inner.initialized;
        if late && config.late_registration == LateRegistration::Reject {
            return Err(BridgeError::RegistrationClosed(name.to_string()));
        }

        let replaced = inner.by_name.contains_key(name);
        if replaced && config.duplicate_plugins == DuplicatePolicy::Reject {
            return Err(BridgeError::DuplicatePlugin(name.to_string()));
        }

        // A replacement keeps the original slot in the init order
        if !replaced {
            inner.order.push(name.to_string());
        }
        inner.by_name.insert(name.to_string(), plugin);

        Ok(Inserted { replaced, late })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(name)
            .cloned()
    }

    /// Plugin names in registration order
    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).initialized
    }

    /// Run both lifecycle phases for every plugin, in registration order.
    ///
    /// Runs at most once; returns how many plugins were initialized. Hooks run
    /// outside the lock, so they may register ops or plugins.
    pub fn initialize_all(&self) -> usize {
        let plugins: Vec<(String, Arc<dyn Plugin>)> = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            if inner.initialized {
                return 0;
            }
            inner.initialized = true;
            inner
                .order
                .iter()
                .filter_map(|name| inner.by_name.get(name).map(|p| (name.clone(), Arc::clone(p))))
                .collect()
        };

        for (name, plugin) in &plugins {
            run_lifecycle(name, plugin.as_ref());
        }
        plugins.len()
    }
}

pub(crate) fn run_lifecycle(name: &str, plugin: &dyn Plugin) {
    let hooks = plugin.hooks();
    if hooks.auto_init {
        tracing::debug!(plugin = %name, "Running auto_init");
        plugin.auto_init();
    }
    if hooks.init {
        tracing::debug!(plugin = %name, "Running init");
        plugin.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<String>>>;

    struct Alpha {
        calls: Calls,
    }

    struct Beta {
        calls: Calls,
    }

    impl Plugin for Alpha {
        fn attach(&mut self, _context: PluginContext) {}
        fn hooks(&self) -> LifecycleHooks {
            LifecycleHooks::ALL
        }
        fn auto_init(&self) {
            self.calls.lock().unwrap().push("Alpha.auto_init".into());
        }
        fn init(&self) {
            self.calls.lock().unwrap().push("Alpha.init".into());
        }
        fn operations(&self) -> Vec<&str> {
            vec![]
        }
        fn call(&self, op: &str, _data: Value) -> Result<(), PluginError> {
            Err(PluginError::UnknownOperation(op.to_string()))
        }
    }

    // Declares only `init`, but implements `auto_init` to prove it is not probed
    impl Plugin for Beta {
        fn attach(&mut self, _context: PluginContext) {}
        fn hooks(&self) -> LifecycleHooks {
            LifecycleHooks {
                auto_init: false,
                init: true,
            }
        }
        fn auto_init(&self) {
            self.calls.lock().unwrap().push("Beta.auto_init".into());
        }
        fn init(&self) {
            self.calls.lock().unwrap().push("Beta.init".into());
        }
        fn operations(&self) -> Vec<&str> {
            vec![]
        }
        fn call(&self, op: &str, _data: Value) -> Result<(), PluginError> {
            Err(PluginError::UnknownOperation(op.to_string()))
        }
    }

    struct Wrapper<T>(T);

    impl<T: Send + Sync + 'static> Plugin for Wrapper<T> {
        fn attach(&mut self, _context: PluginContext) {}
        fn operations(&self) -> Vec<&str> {
            vec![]
        }
        fn call(&self, op: &str, _data: Value) -> Result<(), PluginError> {
            Err(PluginError::UnknownOperation(op.to_string()))
        }
    }

    #[test]
    fn test_default_name_is_short_type_name() {
        let calls = Calls::default();
        assert_eq!(Alpha { calls }.name(), "Alpha");
        assert_eq!(Wrapper(5u8).name(), "Wrapper");
    }

    #[test]
    fn test_initialize_all_runs_declared_hooks_in_order() {
        let registry = PluginRegistry::new();
        let calls = Calls::default();
        let config = BridgeConfig::default();

        registry
            .insert("Alpha", Arc::new(Alpha { calls: calls.clone() }), &config)
            .unwrap();
        registry
            .insert("Beta", Arc::new(Beta { calls: calls.clone() }), &config)
            .unwrap();

        assert_eq!(registry.initialize_all(), 2);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["Alpha.auto_init", "Alpha.init", "Beta.init"]
        );

        // Second call is a no-op
        assert_eq!(registry.initialize_all(), 0);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_replace_keeps_slot() {
        let registry = PluginRegistry::new();
        let calls = Calls::default();
        let config = BridgeConfig::default();

        registry.insert("Alpha", Arc::new(Alpha { calls: calls.clone() }), &config).unwrap();
        registry.insert("Beta", Arc::new(Beta { calls: calls.clone() }), &config).unwrap();
        let inserted = registry
            .insert("Alpha", Arc::new(Alpha { calls: calls.clone() }), &config)
            .unwrap();

        assert!(inserted.replaced);
        assert_eq!(registry.names(), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_duplicate_reject() {
        let registry = PluginRegistry::new();
        let calls = Calls::default();
        let config = BridgeConfig {
            duplicate_plugins: DuplicatePolicy::Reject,
            ..BridgeConfig::default()
        };

        registry.insert("Alpha", Arc::new(Alpha { calls: calls.clone() }), &config).unwrap();
        let result = registry.insert("Alpha", Arc::new(Alpha { calls }), &config);
        assert!(matches!(result, Err(BridgeError::DuplicatePlugin(name)) if name == "Alpha"));
    }

    #[test]
    fn test_late_registration_policy() {
        let registry = PluginRegistry::new();
        let calls = Calls::default();
        registry.initialize_all();

        let reject = BridgeConfig {
            late_registration: LateRegistration::Reject,
            ..BridgeConfig::default()
        };
        assert!(matches!(
            registry.insert("Alpha", Arc::new(Alpha { calls: calls.clone() }), &reject),
            Err(BridgeError::RegistrationClosed(_))
        ));

        let inserted = registry
            .insert("Alpha", Arc::new(Alpha { calls }), &BridgeConfig::default())
            .unwrap();
        assert!(inserted.late);
    }
}
