//! Test doubles shared by the bridge unit tests

use super::channel::{Connection, PendingReply};
use super::types::{Envelope, LogLevel, LOG_OP};
use std::sync::{Arc, Mutex};

/// Connection that records every message and answers with a fixed reply
#[derive(Clone)]
pub struct RecordingConnection {
    messages: Arc<Mutex<Vec<String>>>,
    reply: String,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::with_reply(r#"{"ret_status":"OK"}"#)
    }

    pub fn with_reply(reply: &str) -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            reply: reply.to_string(),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn envelopes(&self) -> Vec<Envelope> {
        self.messages()
            .iter()
            .map(|m| Envelope::from_wire(m).unwrap())
            .collect()
    }

    /// Messages sent through the log side-channel at `level`
    pub fn logs(&self, level: LogLevel) -> Vec<String> {
        self.envelopes()
            .into_iter()
            .filter(|e| e.op == LOG_OP && e.op_data["log_level"] == level.as_str())
            .map(|e| e.op_data["message"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn all_logs(&self) -> usize {
        self.envelopes().iter().filter(|e| e.op == LOG_OP).count()
    }
}

impl Connection for RecordingConnection {
    fn invoke(&self, message: String) -> PendingReply {
        self.messages.lock().unwrap().push(message);
        let reply = self.reply.clone();
        Box::pin(async move { Ok(reply) })
    }
}
