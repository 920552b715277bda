use thiserror::Error;

/// Top-level error type for wabridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Error from the messaging session client.
    #[error("client error: {0}")]
    Client(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Webhook delivery error.
    #[error("webhook error: {0}")]
    Webhook(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
