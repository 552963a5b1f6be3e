//! Configuration for the bridge, the local backend and logging
//!
//! Sources, later ones winning: built-in defaults, an optional TOML file,
//! then the `BRIDGE_LOG` environment variable for the log filter.
//!
//! ```toml
//! log_filter = "webchannel=debug"
//!
//! [bridge]
//! duplicate_plugins = "reject"
//! late_registration = "initialize"
//!
//! [backend]
//! log_level = "WARNING"
//! ```

use crate::backend::BackendConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding [`Config::log_filter`]
pub const LOG_ENV: &str = "BRIDGE_LOG";

const DEFAULT_LOG_FILTER: &str = "webchannel=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// What to do when a plugin registers under a name already in use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Replace the instance, keep the original init slot, warn
    #[default]
    Replace,
    /// Fail the registration
    Reject,
}

/// What to do with plugins registered after initialization has run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateRegistration {
    /// Run the plugin's lifecycle immediately
    #[default]
    Initialize,
    /// Fail the registration
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub duplicate_plugins: DuplicatePolicy,
    pub late_registration: LateRegistration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `tracing_subscriber::EnvFilter` directives used when `RUST_LOG` is unset
    pub log_filter: String,
    pub bridge: BridgeConfig,
    pub backend: BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            bridge: BridgeConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Load defaults, then `path` if given, then the environment override
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        Ok(config.with_log_override(std::env::var(LOG_ENV).ok()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn with_log_override(mut self, filter: Option<String>) -> Self {
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            self.log_filter = filter;
        }
        self
    }
}
