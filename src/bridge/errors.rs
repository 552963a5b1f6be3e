//! Error type for bridge registration and wire handling
//!
//! Routing never surfaces these to callers: dispatch failures are reported
//! through the backend log channel instead. They are returned from the
//! registration APIs, which validate names eagerly, and from the wire helpers.

use super::plugin::PluginError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid plugin name {0:?}: must be non-empty and must not contain '|'")]
    InvalidPluginName(String),

    #[error("Invalid op name {0:?}: must be non-empty and must not contain '|'")]
    InvalidOpName(String),

    #[error("Op name {0:?} uses a reserved prefix")]
    ReservedOpName(String),

    #[error("Malformed plugin op {0:?}: expected Plugin|<plugin_name>|<plugin_op>")]
    MalformedRoute(String),

    #[error("Plugin {0:?} is already registered")]
    DuplicatePlugin(String),

    #[error("Plugin {0:?} was registered after plugin initialization")]
    RegistrationClosed(String),

    #[error("Invalid base64 payload: {0}")]
    PayloadDecode(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backend channel closed before a reply was received")]
    ChannelClosed,

    #[error("Bridge must be created inside a Tokio runtime")]
    NoRuntime,

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Backend error: {0}")]
    Backend(String),
}
