use super::{
    channel::{ChannelHandle, ChannelResolver, Connection},
    errors::BridgeError,
    outbound::{Outbound, ResponseHandler},
    plugin::{run_lifecycle, Plugin, PluginContext, PluginRegistry},
    registry::OpRegistry,
    route::{validate_plugin_name, Route},
    types::{decode_payload, InboundCall, LogLevel},
};
use crate::config::BridgeConfig;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What [`Bridge::dispatch_inbound`] did with a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A plugin op handler ran
    Plugin { plugin: String, op: String },
    /// A global op handler ran
    Global { op: String },
    /// Reserved task namespace; nothing ran and nothing was logged
    Ignored,
    /// A plugin op handler ran and returned an error, which was logged
    Failed { plugin: String, op: String },
    /// Nothing ran; the reason was logged to the backend
    Unrouted { reason: String },
}

/// The bridge - routes ops between the client side and the backend
///
/// One per process, shared by reference (usually behind an `Arc`). Owns the
/// backend channel, the global op registry and the plugin registry.
pub struct Bridge {
    config: BridgeConfig,
    outbound: Outbound,
    ops: OpRegistry,
    plugins: PluginRegistry,
}

impl Bridge {
    /// Create a bridge with an unresolved channel.
    ///
    /// The returned resolver is the readiness signal; pass it to
    /// [`ready`](Self::ready) once the backend connection exists.
    /// Fails with [`BridgeError::NoRuntime`] outside a Tokio runtime.
    pub fn new(config: BridgeConfig) -> Result<(Self, ChannelResolver), BridgeError> {
        let (channel, resolver) = ChannelHandle::new()?;
        let bridge = Self {
            config,
            outbound: Outbound::new(channel),
            ops: OpRegistry::new(),
            plugins: PluginRegistry::new(),
        };
        Ok((bridge, resolver))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// A cloneable sending handle, for op handlers that reply to the backend
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    pub fn channel(&self) -> &ChannelHandle {
        self.outbound.channel()
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    pub fn send_to_backend(&self, op: &str, payload: Value, on_response: Option<ResponseHandler>) {
        self.outbound.send_to_backend(op, payload, on_response);
    }

    pub fn request(&self, op: &str, payload: Value) -> BoxFuture<'static, Result<Value, BridgeError>> {
        self.outbound.request(op, payload)
    }

    pub fn plugin_send(&self, plugin: &str, op: &str, payload: Value) {
        self.outbound.plugin_send(plugin, op, payload);
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.outbound.log(level, message);
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

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a handler for a global inbound op, replacing any previous one
    pub fn register_op<F>(&self, name: &str, handler: F) -> Result<(), BridgeError>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.ops.register(name, handler)
    }

    /// Instantiate a plugin, inject its bindings and make it addressable.
    ///
    /// Registration runs no lifecycle hook unless plugins were already
    /// initialized and the late-registration policy says to initialize.
    pub fn register_plugin<P, F>(&self, factory: F) -> Result<Arc<P>, BridgeError>
    where
        P: Plugin,
        F: FnOnce() -> P,
    {
        let mut plugin = factory();
        let name = plugin.name().to_string();
        validate_plugin_name(&name)?;

        plugin.attach(PluginContext::new(name.as_str(), self.outbound.clone()));
        let plugin = Arc::new(plugin);

        let inserted = self
            .plugins
            .insert(&name, Arc::clone(&plugin) as Arc<dyn Plugin>, &self.config)?;

        if inserted.replaced {
            self.warning(&format!(
                "Plugin \"{}\" was registered more than once; the latest instance replaces the earlier one",
                name
            ));
        }
        tracing::debug!(plugin = %name, "Registered plugin");

        if inserted.late {
            tracing::debug!(plugin = %name, "Plugin registered after initialization; initializing now");
            run_lifecycle(&name, plugin.as_ref());
        }

        Ok(plugin)
    }

    /// Run both lifecycle phases for all registered plugins, once
    pub fn initialize_all(&self) -> usize {
        self.plugins.initialize_all()
    }

    /// Environment readiness: resolve the channel, then initialize plugins
    pub fn ready<C: Connection>(&self, resolver: ChannelResolver, connection: C) -> usize {
        resolver.resolve(connection);
        self.initialize_all()
    }

    pub fn is_initialized(&self) -> bool {
        self.plugins.is_initialized()
    }

    /// Plugin names in registration order
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.names()
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    /// Global op names, sorted
    pub fn op_names(&self) -> Vec<String> {
        self.ops.names()
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Entry point for backend-initiated ops.
    ///
    /// `encoded_payload` is base64 over JSON text. Failures never propagate:
    /// they are logged to the backend and reported in the outcome.
    pub fn dispatch_inbound(&self, op_name: &str, encoded_payload: &str) -> DispatchOutcome {
        let data = match decode_payload(encoded_payload) {
            Ok(data) => data,
            Err(error) => {
                return self.unrouted(
                    LogLevel::Error,
                    format!("Unable to decode payload for op \"{}\": {}", op_name, error),
                );
            }
        };

        match Route::parse(op_name) {
            Ok(Route::Plugin { plugin, op }) => self.dispatch_plugin_op(plugin, op, data),
            Ok(Route::Reserved(_)) => {
                tracing::trace!(op = %op_name, "Ignoring reserved task op");
                DispatchOutcome::Ignored
            }
            Ok(Route::Global(op)) => match self.ops.lookup(&op) {
                Some(handler) => {
                    handler(data);
                    DispatchOutcome::Global { op }
                }
                None => self.unrouted(
                    LogLevel::Warning,
                    format!("Op \"{}\" does not have a registered op function", op),
                ),
            },
            Err(error) => self.unrouted(
                LogLevel::Error,
                format!("Unable to route op \"{}\" to a plugin: {}", op_name, error),
            ),
        }
    }

    fn dispatch_plugin_op(&self, plugin_name: String, op: String, data: Value) -> DispatchOutcome {
        let Some(plugin) = self.plugins.get(&plugin_name) else {
            return self.unrouted(
                LogLevel::Error,
                format!(
                    "Plugin op \"{}\" cannot be called: plugin \"{}\" is not registered",
                    op, plugin_name
                ),
            );
        };

        if !plugin.operations().contains(&op.as_str()) {
            return self.unrouted(
                LogLevel::Error,
                format!("Plugin op \"{}\" does not exist for plugin \"{}\"", op, plugin_name),
            );
        }

        match plugin.call(&op, data) {
            Ok(()) => DispatchOutcome::Plugin {
                plugin: plugin_name,
                op,
            },
            Err(error) => {
                self.error(&format!(
                    "Plugin \"{}\" op \"{}\" failed: {}",
                    plugin_name, op, error
                ));
                DispatchOutcome::Failed {
                    plugin: plugin_name,
                    op,
                }
            }
        }
    }

    fn unrouted(&self, level: LogLevel, reason: String) -> DispatchOutcome {
        self.log(level, &reason);
        DispatchOutcome::Unrouted { reason }
    }

    /// Dispatch backend calls from `calls` until every sender is dropped
    pub async fn serve_inbound(&self, mut calls: mpsc::UnboundedReceiver<InboundCall>) {
        while let Some(call) = calls.recv().await {
            let outcome = self.dispatch_inbound(&call.op_name, &call.payload);
            tracing::trace!(op = %call.op_name, ?outcome, "Dispatched inbound op");
        }
        tracing::debug!("Inbound call stream closed");
    }
}
