mod plugin;
mod types;

pub use plugin::{Roundtrip, CALLBACK_OP, ROUNDTRIP_TO_BACKEND_OP};
pub use types::{AlertMessage, CallbackMessage, PopupRequest, RoundtripOp};
