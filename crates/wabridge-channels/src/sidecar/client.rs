//! SessionClient trait implementation for the sidecar.

use super::protocol::{message_id, Command};
use super::SidecarClient;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use wabridge_core::{
    error::BridgeError,
    session::{ConnectionState, LifecycleEvent},
    traits::SessionClient,
};

#[async_trait]
impl SessionClient for SidecarClient {
    fn name(&self) -> &str {
        "sidecar"
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<LifecycleEvent>, BridgeError> {
        let (tx, rx) = mpsc::channel(64);
        *self.shared.events.lock().await = Some(tx);
        Ok(rx)
    }

    async fn wait_available(&self) {
        self.wait_linked().await;
    }

    async fn initialize(&self) -> Result<(), BridgeError> {
        self.request(Command::Initialize).await.map(|_| ())
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        self.request(Command::Logout).await.map(|_| ())
    }

    async fn destroy(&self) -> Result<(), BridgeError> {
        self.request(Command::Destroy).await.map(|_| ())
    }

    async fn get_state(&self) -> Result<Option<ConnectionState>, BridgeError> {
        let value = self.request(Command::GetState).await?;
        let state = match &value {
            Value::String(raw) => ConnectionState::from_client_state(raw),
            _ => None,
        };
        if state.is_none() {
            debug!("sidecar reported unusable state: {value}");
        }
        Ok(state)
    }

    async fn send_message(&self, chat_id: &str, content: &str) -> Result<String, BridgeError> {
        let value = self
            .request(Command::SendMessage {
                chat_id: chat_id.to_string(),
                content: content.to_string(),
            })
            .await?;
        message_id(&value)
            .ok_or_else(|| BridgeError::Client("sidecar returned no message id".into()))
    }
}
