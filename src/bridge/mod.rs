pub mod bridge;
pub mod channel;
pub mod errors;
pub mod outbound;
pub mod plugin;
pub mod registry;
pub mod route;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{Bridge, DispatchOutcome};
pub use channel::{ChannelHandle, ChannelResolver, Connection, PendingReply};
pub use errors::BridgeError;
pub use outbound::{Outbound, ResponseHandler};
pub use plugin::{LifecycleHooks, Plugin, PluginContext, PluginError, PluginRegistry};
pub use registry::{OpHandler, OpRegistry};
pub use route::{Route, PLUGIN_NAMESPACE, SEPARATOR, TASK_PREFIX};
pub use types::{decode_payload, encode_payload, Envelope, InboundCall, LogLevel, LOG_OP};
