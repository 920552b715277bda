mod defaults;


use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::BridgeError;
use defaults::*;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub sidecar: SidecarConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// General bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// The one logical session this bridge drives. Sent with every webhook.
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for rolling log files. Unset = stdout only.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

/// HTTP API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Shared secret expected in `x-api-key`. Also sent on outbound webhooks.
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
        }
    }
}

/// Outbound webhook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint receiving lifecycle events. Unset = notifications disabled.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
    /// Forward every inbound chat message as a `message` event.
    #[serde(default)]
    pub relay_messages: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_webhook_timeout(),
            relay_messages: false,
        }
    }
}

/// Browser-automation sidecar connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    #[serde(default = "default_sidecar_url")]
    pub url: String,
    /// Delay between link reconnect attempts, in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            url: default_sidecar_url(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl SidecarConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Session lifecycle timing and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Wait after logout/destroy before initializing again, in milliseconds.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Wait after a disconnect before initializing again, in milliseconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Render pairing QR codes into the log.
    #[serde(default)]
    pub log_qr: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            reconnect_delay_ms: default_reconnect_delay(),
            log_qr: false,
        }
    }
}

impl LifecycleConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Values taken from CLI flags or environment variables.
///
/// Every `Some` wins over the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub webhook_url: Option<String>,
    pub relay_messages: Option<bool>,
    pub sidecar_url: Option<String>,
    pub log_qr: Option<bool>,
    pub log_dir: Option<String>,
}

impl Config {
    /// Layer overrides on top of the loaded file.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(key) = overrides.api_key {
            self.api.api_key = key;
        }
        if let Some(host) = overrides.host {
            self.api.host = host;
        }
        if let Some(port) = overrides.port {
            self.api.port = port;
        }
        if let Some(url) = overrides.webhook_url {
            self.webhook.url = Some(url);
        }
        if let Some(relay) = overrides.relay_messages {
            self.webhook.relay_messages = relay;
        }
        if let Some(url) = overrides.sidecar_url {
            self.sidecar.url = url;
        }
        if let Some(log_qr) = overrides.log_qr {
            self.lifecycle.log_qr = log_qr;
        }
        if let Some(dir) = overrides.log_dir {
            self.bridge.log_dir = Some(dir);
        }

        // An empty webhook URL means "disabled", same as unset.
        if self.webhook.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            self.webhook.url = None;
        }
    }

    /// Reject configurations the bridge cannot safely run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.api.api_key.trim().is_empty() {
            return Err(BridgeError::Config(
                "api_key is required. Set it in config.toml or the API_KEY env var.".into(),
            ));
        }
        if self.bridge.session_id.trim().is_empty() {
            return Err(BridgeError::Config("session_id must not be empty".into()));
        }
        if !self.sidecar.url.starts_with("ws://") && !self.sidecar.url.starts_with("wss://") {
            return Err(BridgeError::Config(format!(
                "sidecar url must be ws:// or wss://, got '{}'",
                self.sidecar.url
            )));
        }
        Ok(())
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, BridgeError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| BridgeError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| BridgeError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
