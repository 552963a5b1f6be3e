use super::errors::BridgeError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Op name of the logging side-channel
pub const LOG_OP: &str = "print_from_js";

/// Unit exchanged with the backend: `{"op": ..., "op_data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub op: String,
    pub op_data: Value,
}

impl Envelope {
    pub fn new(op: impl Into<String>, op_data: Value) -> Self {
        Self {
            op: op.into(),
            op_data,
        }
    }

    /// Serialized text form sent through the channel
    pub fn to_wire(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_wire(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Encode an inbound payload: base64 over JSON text
///
/// `serde_json` maps are ordered, so keys come out sorted.
pub fn encode_payload(data: &Value) -> Result<String, BridgeError> {
    let text = serde_json::to_string(data)?;
    Ok(STANDARD.encode(text))
}

pub fn decode_payload(encoded: &str) -> Result<Value, BridgeError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// A backend-initiated call: op name plus encoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCall {
    pub op_name: String,
    pub payload: String,
}

/// Levels carried by the logging side-channel, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    /// Accepted from backend-side configuration; the client helpers never emit it
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(format!("Unknown log level: {}", other)),
        }
    }
}
