// Authentication Audit Logging
// Structured auth events with identifiers redacted before they reach the log

use tracing::{info, warn};

/// Keep the first 8 characters of an identifier or token
pub fn redact_id(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    if value.chars().count() > 8 {
        format!("{}...", prefix)
    } else {
        prefix
    }
}

/// Keep the first 3 characters of an email address
pub fn mask_email(email: &str) -> String {
    let prefix: String = email.chars().take(3).collect();
    format!("{}***", prefix)
}

pub fn log_auth_attempt(state: &str, redirect_uri: &str) {
    info!(
        event = "auth_attempt",
        state = %redact_id(state),
        redirect_uri = redirect_uri,
        "Initiating OAuth2 authorization code flow"
    );
}

pub fn log_auth_success(subject_id: &str, email: Option<&str>, username: Option<&str>) {
    info!(
        event = "auth_success",
        user_id = %redact_id(subject_id),
        email = %email.map(mask_email).unwrap_or_else(|| "N/A".to_string()),
        username = username.unwrap_or("N/A"),
        "User authenticated"
    );
}

pub fn log_auth_failure(reason: &str, detail: &str) {
    warn!(
        event = "auth_failure",
        reason = reason,
        detail = detail,
        "Authentication failed"
    );
}
