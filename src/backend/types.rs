use crate::bridge::LogLevel;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Local backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Minimum level printed for `print_from_js` messages
    pub log_level: LogLevel,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
        }
    }
}

/// Status marker carried in backend replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetStatus {
    Ok,
    Error,
}

/// Reply sent for the backend's own outcomes
///
/// Op handlers may return any JSON; this shape is what the backend itself
/// produces for logging and for calls it could not route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReply {
    pub ret_status: RetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BackendReply {
    pub fn ok() -> Self {
        Self {
            ret_status: RetStatus::Ok,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ret_status: RetStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Payload of the `print_from_js` op as the backend reads it
///
/// Both fields are optional on the wire; missing values fall back to
/// `INFO` and `???`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl LogRequest {
    pub fn level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(|level| level.parse().ok())
            .unwrap_or(LogLevel::Info)
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("???")
    }
}
