//! Roundtrip plugin payloads

use serde::{Deserialize, Serialize};

/// Message carried client -> backend -> client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub alert_msg: String,
}

/// Payload of `show_popup`; an empty payload shows the popup
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PopupRequest {
    #[serde(default)]
    pub visible: Option<bool>,
}

/// Payload of the `test_plugin_callback` backend op
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackMessage {
    pub message: String,
}

/// Ops the backend may call on the Roundtrip plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundtripOp {
    /// Second leg of the round trip
    RoundtripFromPython,
    ShowPopup,
}

impl RoundtripOp {
    pub const ALL: [RoundtripOp; 2] = [RoundtripOp::RoundtripFromPython, RoundtripOp::ShowPopup];

    pub fn name(&self) -> &'static str {
        match self {
            RoundtripOp::RoundtripFromPython => "roundtrip_from_python",
            RoundtripOp::ShowPopup => "show_popup",
        }
    }

    pub fn all_names() -> Vec<&'static str> {
        Self::ALL.iter().map(RoundtripOp::name).collect()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for op in RoundtripOp::ALL {
            assert_eq!(RoundtripOp::from_name(op.name()), Some(op));
        }
        assert_eq!(RoundtripOp::all_names(), vec!["roundtrip_from_python", "show_popup"]);
        assert_eq!(RoundtripOp::from_name("roundtrip_to_python"), None);
    }
}
