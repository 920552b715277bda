//! Outbound webhook notifier.
//!
//! Posts lifecycle events to the one configured endpoint. Delivery happens on
//! its own task; callers never wait for it and never see its failures.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wabridge_core::{config::WebhookConfig, error::BridgeError};

/// Body of every webhook request.
#[derive(Debug, Serialize)]
pub struct WebhookEvent<'a> {
    pub event: &'a str,
    pub session: &'a str,
    pub data: Value,
}

/// Fire-and-forget lifecycle notifier.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Option<String>,
    api_key: String,
    session_id: String,
}

impl WebhookNotifier {
    /// Build a notifier. Without a URL every `notify` is a no-op.
    pub fn new(
        config: &WebhookConfig,
        api_key: &str,
        session_id: &str,
    ) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BridgeError::Webhook(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            url: config.url.clone(),
            api_key: api_key.to_string(),
            session_id: session_id.to_string(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Queue one delivery. Returns the delivery task, or `None` when disabled.
    pub fn notify(&self, event: &str, data: Value) -> Option<JoinHandle<()>> {
        let url = self.url.clone()?;
        let notifier = self.clone();
        let event = event.to_string();

        Some(tokio::spawn(async move {
            match notifier.deliver(&url, &event, data).await {
                Ok(()) => debug!("webhook {event} delivered"),
                Err(e) => warn!("webhook {event} failed: {e}"),
            }
        }))
    }

    async fn deliver(&self, url: &str, event: &str, data: Value) -> Result<(), BridgeError> {
        let body = WebhookEvent {
            event,
            session: &self.session_id,
            data,
        };

        let resp = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::Webhook(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BridgeError::Webhook(format!("endpoint returned {status}")));
        }
        Ok(())
    }
}
