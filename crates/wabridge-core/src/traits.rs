use crate::{
    error::BridgeError,
    session::{ConnectionState, LifecycleEvent},
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Messaging session client driven by the bridge.
///
/// Wraps whatever actually drives the chat account (a browser automation
/// sidecar, a native protocol client). The bridge only ever asks it to bring
/// the session up or down, report its state, and send text.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Human-readable client name.
    fn name(&self) -> &str;

    /// Start listening for lifecycle events.
    /// Calling this again replaces the previous subscriber.
    async fn subscribe(&self) -> Result<mpsc::Receiver<LifecycleEvent>, BridgeError>;

    /// Resolve once the client can take commands. Clients that are always
    /// reachable keep the default.
    async fn wait_available(&self) {}

    /// Bring the session up. Progress is reported through lifecycle events.
    async fn initialize(&self) -> Result<(), BridgeError>;

    /// Log the paired account out, invalidating the stored session.
    async fn logout(&self) -> Result<(), BridgeError>;

    /// Tear the session down without logging out.
    async fn destroy(&self) -> Result<(), BridgeError>;

    /// Query the live session state. `None` when the client reports nothing usable.
    async fn get_state(&self) -> Result<Option<ConnectionState>, BridgeError>;

    /// Send a text message, returning the client-generated message id.
    async fn send_message(&self, chat_id: &str, content: &str) -> Result<String, BridgeError>;
}
