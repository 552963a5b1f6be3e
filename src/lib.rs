pub mod backend;
pub mod bridge;
pub mod builder;
pub mod config;
pub mod plugins;

// Re-export commonly used items
pub use backend::{BackendConfig, LocalBackend};
pub use bridge::{Bridge, BridgeError, DispatchOutcome, LogLevel, Plugin, PluginContext, PluginError};
pub use builder::{build_session, Session};
pub use config::Config;
