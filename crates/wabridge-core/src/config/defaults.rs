//! Default value functions used by serde for config deserialization.

pub fn default_session_id() -> String {
    "main".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_api_port() -> u16 {
    3000
}

pub fn default_webhook_timeout() -> u64 {
    10
}

pub fn default_sidecar_url() -> String {
    "ws://127.0.0.1:9876".to_string()
}

pub fn default_retry_delay() -> u64 {
    2000
}

pub fn default_settle_delay() -> u64 {
    3000
}

pub fn default_reconnect_delay() -> u64 {
    5000
}
