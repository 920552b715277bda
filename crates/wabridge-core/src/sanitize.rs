//! Redaction helpers for log output.

/// Number of trailing characters of a chat id left visible in logs.
const VISIBLE_TAIL: usize = 4;

/// Mask a chat id for logging, keeping only the last few characters of the
/// user part and the server suffix.
///
/// `1234567890@c.us` becomes `******7890@c.us`.
pub fn mask_chat_id(chat_id: &str) -> String {
    let (user, server) = match chat_id.split_once('@') {
        Some((user, server)) => (user, Some(server)),
        None => (chat_id, None),
    };

    let len = user.chars().count();
    let masked: String = user
        .chars()
        .enumerate()
        .map(|(i, c)| if i + VISIBLE_TAIL < len { '*' } else { c })
        .collect();

    match server {
        Some(server) => format!("{masked}@{server}"),
        None => masked,
    }
}

/// Mask a secret for display, keeping only its length visible.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(unset)".to_string();
    }
    "*".repeat(secret.chars().count().min(12))
}
