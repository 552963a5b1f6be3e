use super::types::{AlertMessage, CallbackMessage, PopupRequest, RoundtripOp};
use crate::bridge::{LifecycleHooks, Plugin, PluginContext, PluginError};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;

/// Backend op receiving the first leg of the round trip
pub const ROUNDTRIP_TO_BACKEND_OP: &str = "roundtrip_from_js";

/// Backend op exercised by [`Roundtrip::test_callback`]
pub const CALLBACK_OP: &str = "test_plugin_callback";

#[derive(Debug, Default)]
struct State {
    received: Vec<String>,
    popup_visible: bool,
    auto_initialized: bool,
    initialized: bool,
}

/// Roundtrip plugin - minimal reference plugin
///
/// Sends a message to the backend, which calls `roundtrip_from_python` with
/// the same message. Received messages are kept for inspection.
#[derive(Default)]
pub struct Roundtrip {
    context: Option<PluginContext>,
    state: Mutex<State>,
    received: Notify,
}

impl Roundtrip {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self) -> Result<&PluginContext, PluginError> {
        self.context
            .as_ref()
            .ok_or_else(|| PluginError::Failed("Roundtrip is not registered".to_string()))
    }

    /// First leg: send `alert_msg` to the backend
    pub fn roundtrip_to_backend(&self, alert_msg: &str) -> Result<(), PluginError> {
        let context = self.context()?;
        let payload = serde_json::to_value(AlertMessage {
            alert_msg: alert_msg.to_string(),
        })
        .map_err(|e| PluginError::Failed(e.to_string()))?;
        context.send(ROUNDTRIP_TO_BACKEND_OP, payload);
        Ok(())
    }

    /// Send a fixed message to the backend's callback op
    pub fn test_callback(&self) -> Result<(), PluginError> {
        let context = self.context()?;
        let payload = serde_json::to_value(CallbackMessage {
            message: "This is a test!".to_string(),
        })
        .map_err(|e| PluginError::Failed(e.to_string()))?;
        context.send(CALLBACK_OP, payload);
        Ok(())
    }

    /// Messages received from the backend, oldest first
    pub fn received(&self) -> Vec<String> {
        self.state().received.clone()
    }

    pub fn popup_visible(&self) -> bool {
        self.state().popup_visible
    }

    pub fn is_initialized(&self) -> bool {
        let state = self.state();
        state.auto_initialized && state.initialized
    }

    /// Wait until more than `seen` messages have arrived, then return the
    /// message at index `seen`.
    pub async fn wait_for_message(&self, seen: usize) -> String {
        loop {
            let notified = self.received.notified();
            let message = self.state().received.get(seen).cloned();
            if let Some(message) = message {
                return message;
            }
            notified.await;
        }
    }

    fn on_roundtrip_from_python(&self, data: Value) -> Result<(), PluginError> {
        let message: AlertMessage =
            serde_json::from_value(data).map_err(|e| PluginError::InvalidData {
                op: RoundtripOp::RoundtripFromPython.name().to_string(),
                reason: e.to_string(),
            })?;

        if let Some(context) = &self.context {
            context.info(&format!("Roundtrip received: {}", message.alert_msg));
        }
        self.state().received.push(message.alert_msg);
        self.received.notify_waiters();
        Ok(())
    }

    fn on_show_popup(&self, data: Value) -> Result<(), PluginError> {
        let request: PopupRequest = match data {
            Value::Null => PopupRequest::default(),
            data => serde_json::from_value(data).map_err(|e| PluginError::InvalidData {
                op: RoundtripOp::ShowPopup.name().to_string(),
                reason: e.to_string(),
            })?,
        };
        self.state().popup_visible = request.visible.unwrap_or(true);
        Ok(())
    }
}

impl Plugin for Roundtrip {
    fn attach(&mut self, context: PluginContext) {
        self.context = Some(context);
    }

    fn hooks(&self) -> LifecycleHooks {
        LifecycleHooks::ALL
    }

    // Structural phase: start with the popup hidden
    fn auto_init(&self) {
        let mut state = self.state();
        state.popup_visible = false;
        state.auto_initialized = true;
    }

    fn init(&self) {
        self.state().initialized = true;
        if let Some(context) = &self.context {
            context.info(&format!("{} plugin initialized", context.name()));
        }
    }

    fn operations(&self) -> Vec<&str> {
        RoundtripOp::all_names()
    }

    fn call(&self, op: &str, data: Value) -> Result<(), PluginError> {
        match RoundtripOp::from_name(op) {
            Some(RoundtripOp::RoundtripFromPython) => self.on_roundtrip_from_python(data),
            Some(RoundtripOp::ShowPopup) => self.on_show_popup(data),
            None => Err(PluginError::UnknownOperation(op.to_string())),
        }
    }
}
