//! Wire types for the sidecar WebSocket link.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wabridge_core::session::{InboundMessage, LifecycleEvent};

/// Commands sent from the bridge to the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Initialize,
    Logout,
    Destroy,
    GetState,
    SendMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        content: String,
    },
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Logout => "logout",
            Self::Destroy => "destroy",
            Self::GetState => "get_state",
            Self::SendMessage { .. } => "send_message",
        }
    }
}

/// A command addressed to one session, correlated by request id.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub session: String,
    #[serde(flatten)]
    pub command: Command,
}

/// Frames received from the sidecar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Reply to a [`Request`].
    Result {
        #[serde(rename = "requestId")]
        request_id: String,
        success: bool,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        error: Option<String>,
    },
    Qr {
        qr: String,
    },
    Authenticated,
    Ready {
        #[serde(default)]
        info: Value,
    },
    AuthFailure {
        #[serde(default)]
        message: String,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    Message {
        message: InboundMessage,
    },
    #[serde(other)]
    Unknown,
}

impl Frame {
    /// Lifecycle event carried by this frame, if any.
    pub fn into_event(self) -> Option<LifecycleEvent> {
        match self {
            Self::Qr { qr } => Some(LifecycleEvent::Qr { code: qr }),
            Self::Authenticated => Some(LifecycleEvent::Authenticated),
            Self::Ready { info } => Some(LifecycleEvent::Ready { info }),
            Self::AuthFailure { message } => Some(LifecycleEvent::AuthFailure { message }),
            Self::Disconnected { reason } => Some(LifecycleEvent::Disconnected { reason }),
            Self::Message { message } => Some(LifecycleEvent::Message(message)),
            Self::Result { .. } | Self::Unknown => None,
        }
    }
}

/// Pull the message id out of a `send_message` result value.
///
/// Sidecars answer either `{"id": "..."}` or the bare id string.
pub fn message_id(value: &Value) -> Option<String> {
    value
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| value.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
