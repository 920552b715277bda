//! Session lifecycle coordination.
//!
//! [`SessionManager`] is the only place that drives the session client:
//! guarded initialization, logout/restart teardowns with deferred
//! re-initialization, reconnect after disconnects, and the mapping from
//! client events to state transitions and webhook notifications.

mod events;
pub mod state;


pub use events::spawn_event_pump;
pub use state::SessionState;
use state::Transition;

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wabridge_core::{
    config::Config,
    error::BridgeError,
    sanitize::mask_chat_id,
    session::{ConnectionState, LifecycleEvent},
    traits::SessionClient,
};

use crate::webhook::WebhookNotifier;

pub const LOGGED_OUT: &str = "Logged out. Reinitializing session...";
pub const LOGGED_OUT_FORCED: &str = "Logged out (forced). Reinitializing session...";
pub const RESTARTING: &str = "Restarting session...";

/// Knobs the manager needs from the config.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub session_id: String,
    /// Wait between a completed teardown and the re-initialization.
    pub settle_delay: Duration,
    /// Wait between a disconnect and the reconnect attempt.
    pub reconnect_delay: Duration,
    /// Render pairing QR codes to the log.
    pub log_qr: bool,
    /// Forward inbound messages to the webhook.
    pub relay_messages: bool,
}

impl LifecycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            session_id: config.bridge.session_id.clone(),
            settle_delay: config.lifecycle.settle_delay(),
            reconnect_delay: config.lifecycle.reconnect_delay(),
            log_qr: config.lifecycle.log_qr,
            relay_messages: config.webhook.relay_messages,
        }
    }
}

/// Result of a send attempt that reached the client-state check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { message_id: String },
    /// The session is not connected; nothing was sent.
    NotReady(ConnectionState),
}

/// Result of a logout or restart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Teardown finished; re-initialization is scheduled.
    Started(&'static str),
    /// Another logout/restart holds the slot.
    AlreadyInProgress,
}

/// Drives one session client.
#[derive(Clone)]
pub struct SessionManager {
    client: Arc<dyn SessionClient>,
    state: Arc<SessionState>,
    notifier: WebhookNotifier,
    settings: LifecycleSettings,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn SessionClient>,
        state: Arc<SessionState>,
        notifier: WebhookNotifier,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            client,
            state,
            notifier,
            settings,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Start an initialize attempt unless one is already running.
    ///
    /// Returns immediately. The attempt runs on its own task, which is
    /// returned so callers that care can wait for the call to return.
    pub fn safe_initialize(&self, reason: &str) -> Option<JoinHandle<()>> {
        if !self.state.apply(Transition::BeginInitialize) {
            info!("initialize ({reason}) skipped: already in progress");
            return None;
        }
        info!(
            "initializing session {} via {} ({reason})",
            self.settings.session_id,
            self.client.name()
        );

        let manager = self.clone();
        let reason = reason.to_string();
        Some(tokio::spawn(async move {
            if let Err(e) = manager.client.initialize().await {
                error!("initialize ({reason}) failed: {e}");
                manager.state.apply(Transition::InitializeFailed);
            }
        }))
    }

    /// Live state query. A usable answer overwrites the cache; an
    /// unrecognised one leaves the cache as it was.
    pub async fn refresh_state(&self) -> Result<ConnectionState, BridgeError> {
        if let Some(live) = self.client.get_state().await? {
            self.state.apply(Transition::Refreshed(live));
        }
        Ok(self.state.connection())
    }

    /// State used to gate sends: trust a cached `Connected`, otherwise ask.
    async fn state_for_send(&self) -> Result<ConnectionState, BridgeError> {
        let cached = self.state.connection();
        if cached == ConnectionState::Connected {
            return Ok(cached);
        }
        self.refresh_state().await
    }

    /// Send a text message if the session is connected.
    pub async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
    ) -> Result<SendOutcome, BridgeError> {
        let state = self.state_for_send().await?;
        if state != ConnectionState::Connected {
            warn!(
                "send to {} refused: session is {state}",
                mask_chat_id(chat_id)
            );
            return Ok(SendOutcome::NotReady(state));
        }

        let message_id = self.client.send_message(chat_id, content).await?;
        info!("sent message {message_id} to {}", mask_chat_id(chat_id));
        Ok(SendOutcome::Sent { message_id })
    }

    /// Log out, forcing a destroy if the logout itself fails.
    pub async fn logout(&self) -> Result<TeardownOutcome, BridgeError> {
        if !self.state.apply(Transition::BeginTeardown) {
            warn!("logout requested while a teardown is in progress");
            return Ok(TeardownOutcome::AlreadyInProgress);
        }
        info!("logging out session {}", self.settings.session_id);

        let message = match self.client.logout().await {
            Ok(()) => LOGGED_OUT,
            Err(logout_err) => {
                warn!("logout failed, forcing destroy: {logout_err}");
                if let Err(destroy_err) = self.client.destroy().await {
                    error!("forced destroy failed: {destroy_err}");
                    self.state.apply(Transition::TeardownAborted);
                    return Err(logout_err);
                }
                LOGGED_OUT_FORCED
            }
        };

        self.state.apply(Transition::TeardownComplete);
        self.schedule_reinitialize("logout");
        Ok(TeardownOutcome::Started(message))
    }

    /// Destroy the session and bring it back up after the settle delay.
    pub async fn restart(&self) -> Result<TeardownOutcome, BridgeError> {
        if !self.state.apply(Transition::BeginTeardown) {
            warn!("restart requested while a teardown is in progress");
            return Ok(TeardownOutcome::AlreadyInProgress);
        }
        info!("restarting session {}", self.settings.session_id);

        if let Err(e) = self.client.destroy().await {
            error!("restart failed to destroy session: {e}");
            self.state.apply(Transition::TeardownAborted);
            return Err(e);
        }

        self.state.apply(Transition::TeardownComplete);
        self.schedule_reinitialize("restart");
        Ok(TeardownOutcome::Started(RESTARTING))
    }

    /// Best-effort destroy on process exit.
    pub async fn shutdown(&self) {
        info!("shutting down session {}", self.settings.session_id);
        if let Err(e) = self.client.destroy().await {
            warn!("destroy on shutdown failed: {e}");
        }
        self.state.apply(Transition::Disconnected);
    }

    /// Re-initialize after the settle delay, then release the teardown slot.
    fn schedule_reinitialize(&self, reason: &'static str) -> JoinHandle<()> {
        let manager = self.clone();
        let delay = self.settings.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.safe_initialize(reason);
            manager.state.apply(Transition::TeardownSettled);
        })
    }

    /// Wait until the client is reachable, then initialize.
    pub fn initialize_when_available(&self, reason: &'static str) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            manager.client.wait_available().await;
            manager.safe_initialize(reason);
        })
    }

    /// Reconnect after a disconnect unless a teardown owns the session.
    ///
    /// If the client is unreachable when the delay runs out, the attempt
    /// waits for it instead of failing against a dead link.
    fn schedule_reconnect(&self) -> JoinHandle<()> {
        let manager = self.clone();
        let delay = self.settings.reconnect_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.client.wait_available().await;
            if manager.state.snapshot().restarting {
                debug!("reconnect skipped: teardown in progress");
                return;
            }
            manager.safe_initialize("disconnected");
        })
    }

    /// Apply one client event. Never blocks on the client or the webhook.
    pub fn handle_event(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Qr { code } => {
                self.state.apply(Transition::QrIssued);
                if self.settings.log_qr {
                    match wabridge_channels::qr::render_terminal(&code) {
                        Ok(art) => info!("scan to pair session {}:\n{art}", self.settings.session_id),
                        Err(e) => warn!("could not render pairing QR: {e}"),
                    }
                } else {
                    info!("pairing QR received");
                }
                self.notify("qr", json!({ "qr": code }));
            }
            LifecycleEvent::Authenticated => {
                self.state.apply(Transition::Authenticated);
                info!("session {} authenticated", self.settings.session_id);
            }
            LifecycleEvent::Ready { info } => {
                self.state.apply(Transition::Ready);
                info!("session {} ready", self.settings.session_id);
                let data = if info.is_null() { json!({}) } else { info };
                self.notify("ready", data);
            }
            LifecycleEvent::AuthFailure { message } => {
                self.state.apply(Transition::AuthFailure);
                error!("authentication failed: {message}");
                self.notify("auth_failure", json!({ "message": message }));
            }
            LifecycleEvent::Disconnected { reason } => {
                self.state.apply(Transition::Disconnected);
                warn!("session {} disconnected: {reason}", self.settings.session_id);
                self.notify("disconnected", json!({ "reason": reason }));
                if !self.state.snapshot().restarting {
                    self.schedule_reconnect();
                }
            }
            LifecycleEvent::Message(message) => {
                if !self.settings.relay_messages {
                    debug!("inbound message from {} not relayed", mask_chat_id(&message.from));
                    return;
                }
                debug!("relaying inbound message from {}", mask_chat_id(&message.from));
                match serde_json::to_value(&message) {
                    Ok(data) => self.notify("message", data),
                    Err(e) => warn!("could not encode inbound message: {e}"),
                }
            }
        }
    }

    fn notify(&self, event: &str, data: Value) {
        // Detached: delivery outcome is logged by the notifier.
        let _ = self.notifier.notify(event, data);
    }
}
