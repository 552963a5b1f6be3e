//! Session builder - wires a bridge to the in-process backend
//!
//! This module is used by both the main binary and the integration tests.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::backend::{BackendContext, BackendReply, LocalBackend};
use crate::bridge::{Bridge, BridgeError, Plugin};
use crate::config::Config;
use crate::plugins::roundtrip::{Roundtrip, RoundtripOp, CALLBACK_OP, ROUNDTRIP_TO_BACKEND_OP};

/// A ready bridge talking to a [`LocalBackend`]
pub struct Session {
    pub bridge: Arc<Bridge>,
    pub backend: LocalBackend,
    pub roundtrip: Arc<Roundtrip>,
    inbound: JoinHandle<()>,
}

impl Session {
    /// Round trip `message` through the backend and return what came back
    pub async fn run_roundtrip(&self, message: &str) -> Result<String, BridgeError> {
        let seen = self.roundtrip.received().len();
        self.roundtrip
            .roundtrip_to_backend(message)?;
        Ok(self.roundtrip.wait_for_message(seen).await)
    }

    /// Stop serving backend calls
    pub fn shutdown(self) {
        self.inbound.abort();
    }
}

/// Build a session with the Roundtrip plugin registered
///
/// The backend answers:
/// - `Plugin|Roundtrip|roundtrip_from_js` by calling `roundtrip_from_python`
///   on the client with the same payload
/// - `Plugin|Roundtrip|test_plugin_callback` with an OK reply
///
/// Fails with [`BridgeError::NoRuntime`] outside a Tokio runtime.
pub fn build_session(config: &Config) -> Result<Session, BridgeError> {
    let (bridge, resolver) = Bridge::new(config.bridge.clone())?;
    let bridge = Arc::new(bridge);
    let roundtrip = bridge.register_plugin(Roundtrip::new)?;
    let plugin_name = roundtrip.name().to_string();

    let (backend, calls) = LocalBackend::new(config.backend.clone());
    let target = plugin_name.clone();
    backend.register_plugin_op(
        &plugin_name,
        ROUNDTRIP_TO_BACKEND_OP,
        move |data: Value, context: &BackendContext| {
            match context.call_plugin_op(&target, RoundtripOp::RoundtripFromPython.name(), &data) {
                Ok(()) => BackendReply::ok().to_value(),
                Err(error) => BackendReply::error(error.to_string()).to_value(),
            }
        },
    )?;
    backend.register_plugin_op(&plugin_name, CALLBACK_OP, |data: Value, _: &BackendContext| {
        tracing::info!(target: "webchannel::backend", payload = %data, "Plugin callback");
        BackendReply::ok().to_value()
    })?;

    let inbound = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.serve_inbound(calls).await })
    };

    let initialized = bridge.ready(resolver, backend.clone());
    tracing::debug!(plugins = initialized, "Session ready");

    Ok(Session {
        bridge,
        backend,
        roundtrip,
        inbound,
    })
}
