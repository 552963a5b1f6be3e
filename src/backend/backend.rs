use super::types::{BackendConfig, BackendReply, LogRequest};
use crate::bridge::{
    encode_payload, BridgeError, Connection, InboundCall, LogLevel, PendingReply, Route, LOG_OP,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Handler for an op the client calls on the backend
///
/// Receives the envelope's `op_data` and returns the reply value.
pub type BackendHandler = Arc<dyn Fn(Value, &BackendContext) -> Value + Send + Sync>;

/// Backend side of the inbound path: calls ops on the client
#[derive(Clone)]
pub struct BackendContext {
    client: mpsc::UnboundedSender<InboundCall>,
}

impl BackendContext {
    /// Call a global client op with `data` encoded as base64 JSON
    pub fn call_client_op(&self, op: &str, data: &Value) -> Result<(), BridgeError> {
        let call = InboundCall {
            op_name: op.to_string(),
            payload: encode_payload(data)?,
        };
        tracing::debug!(op = %op, "Calling client op");
        self.client.send(call).map_err(|_| BridgeError::ChannelClosed)
    }

    /// Call `Plugin|<plugin>|<op>` on the client
    pub fn call_plugin_op(&self, plugin: &str, op: &str, data: &Value) -> Result<(), BridgeError> {
        let route = Route::plugin(plugin, op)?;
        self.call_client_op(&route.to_string(), data)
    }
}

/// In-process backend peer
///
/// Answers envelopes from its own op registry and calls back into the client
/// through the receiver returned by [`LocalBackend::new`]. Clones share the
/// same registry.
#[derive(Clone)]
pub struct LocalBackend {
    config: BackendConfig,
    ops: Arc<RwLock<HashMap<String, BackendHandler>>>,
    context: BackendContext,
}

impl LocalBackend {
    /// Create a backend and the stream of calls it makes to the client.
    ///
    /// Feed the receiver to [`Bridge::serve_inbound`](crate::bridge::Bridge::serve_inbound).
    pub fn new(config: BackendConfig) -> (Self, mpsc::UnboundedReceiver<InboundCall>) {
        let (client, calls) = mpsc::unbounded_channel();
        let backend = Self {
            config,
            ops: Arc::new(RwLock::new(HashMap::new())),
            context: BackendContext { client },
        };

        let min_level = backend.config.log_level;
        backend.insert(
            LOG_OP.to_string(),
            Arc::new(move |data: Value, _: &BackendContext| print_from_js(min_level, data)),
        );
        (backend, calls)
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn context(&self) -> BackendContext {
        self.context.clone()
    }

    /// Register a backend op, replacing any existing handler
    pub fn register_op<F>(&self, name: &str, handler: F)
    where
        F: Fn(Value, &BackendContext) -> Value + Send + Sync + 'static,
    {
        self.insert(name.to_string(), Arc::new(handler));
    }

    /// Register the backend half of a plugin op, `Plugin|<plugin>|<op>`
    pub fn register_plugin_op<F>(&self, plugin: &str, op: &str, handler: F) -> Result<(), BridgeError>
    where
        F: Fn(Value, &BackendContext) -> Value + Send + Sync + 'static,
    {
        let route = Route::plugin(plugin, op)?;
        self.insert(route.to_string(), Arc::new(handler));
        Ok(())
    }

    fn insert(&self, name: String, handler: BackendHandler) {
        tracing::debug!(op = %name, "Registered backend op");
        self.ops
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, handler);
    }

    /// Registered op names, sorted
    pub fn op_names(&self) -> Vec<String> {
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

    /// Handle one serialized envelope and return the serialized reply
    pub fn handle(&self, message: &str) -> String {
        let reply = self.handle_value(message);
        serde_json::to_string(&reply).unwrap_or_else(|error| {
            tracing::error!(error = %error, "Failed to serialize backend reply");
            String::from(r#"{"ret_status":"ERROR"}"#)
        })
    }

    fn handle_value(&self, message: &str) -> Value {
        let envelope: Value = match serde_json::from_str(message) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!(error = %error, "Unparsable envelope");
                return BackendReply::error(format!("Envelope is not valid JSON: {}", error))
                    .to_value();
            }
        };

        let Some(op) = envelope.get("op").and_then(Value::as_str) else {
            return BackendReply::error("No \"op\" key specified or \"op\" value is null/None")
                .to_value();
        };
        let op_data = envelope.get("op_data").cloned().unwrap_or(Value::Null);

        let handler = self
            .ops
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(op)
            .cloned();

        match handler {
            Some(handler) => handler(op_data, &self.context),
            None => {
                tracing::warn!(op = %op, "Op is not registered on the backend");
                BackendReply::error(format!("\"op\" name \"{}\" is not registered", op)).to_value()
            }
        }
    }
}

impl Connection for LocalBackend {
    fn invoke(&self, message: String) -> PendingReply {
        let reply = self.handle(&message);
        Box::pin(async move { Ok(reply) })
    }
}

fn print_from_js(min_level: LogLevel, data: Value) -> Value {
    let request: LogRequest = serde_json::from_value(data).unwrap_or_default();
    let level = request.level();
    if level >= min_level {
        let message = request.message();
        match level {
            LogLevel::Debug => tracing::debug!(target: "webchannel::backend", "[{}] {}", level, message),
            LogLevel::Info => tracing::info!(target: "webchannel::backend", "[{}] {}", level, message),
            LogLevel::Warning => tracing::warn!(target: "webchannel::backend", "[{}] {}", level, message),
            LogLevel::Error | LogLevel::Critical => {
                tracing::error!(target: "webchannel::backend", "[{}] {}", level, message)
            }
        }
    }
    BackendReply::ok().to_value()
}
