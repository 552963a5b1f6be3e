//! In-process backend peer
//!
//! Speaks the same envelope protocol as a real host process: it answers
//! `{op, op_data}` messages from its own op registry and calls client ops with
//! base64-encoded JSON payloads. Used by the binary and by tests.

mod backend;
mod types;

pub use backend::{BackendContext, BackendHandler, LocalBackend};
pub use types::{BackendConfig, BackendReply, LogRequest, RetStatus};
