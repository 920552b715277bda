//! Session vocabulary shared by the bridge and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// What the bridge believes about the messaging session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    #[default]
    Initializing,
    Connected,
    Disconnected,
}

impl ConnectionState {
    /// Map a raw state string reported by the messaging client.
    ///
    /// Returns `None` for values that say nothing usable about the session
    /// (unknown strings, empty values), so callers keep their previous state.
    pub fn from_client_state(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CONNECTED" => Some(Self::Connected),
            "OPENING" | "PAIRING" | "INITIALIZING" => Some(Self::Initializing),
            "DISCONNECTED" | "UNPAIRED" | "UNPAIRED_IDLE" | "CONFLICT" | "TIMEOUT"
            | "UNLAUNCHED" | "DEPRECATED_VERSION" | "PROXYBLOCK" | "TOS_BLOCK"
            | "SMB_TOS_BLOCK" => Some(Self::Disconnected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound chat message observed by the session client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Client-assigned message id.
    pub id: String,
    /// Sender chat id (e.g. `5511999887766@c.us`).
    pub from: String,
    /// Recipient chat id.
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub body: String,
    /// Whether the message was sent from the paired account itself.
    #[serde(default)]
    pub from_me: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle callbacks emitted by a session client.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A pairing challenge is waiting to be scanned.
    Qr { code: String },
    Authenticated,
    /// The session is usable. `info` carries whatever the client reports
    /// about the paired account.
    Ready { info: Value },
    AuthFailure { message: String },
    Disconnected { reason: String },
    Message(InboundMessage),
}

impl LifecycleEvent {
    /// Stable event name, as used on the webhook wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Qr { .. } => "qr",
            Self::Authenticated => "authenticated",
            Self::Ready { .. } => "ready",
            Self::AuthFailure { .. } => "auth_failure",
            Self::Disconnected { .. } => "disconnected",
            Self::Message(_) => "message",
        }
    }
}
