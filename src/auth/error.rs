// Authentication Error Types
// Covers the OAuth2 callback, session credential verification and provisioning

use thiserror::Error;

use crate::user_repository::UserRepositoryError;

#[derive(Debug, Error)]
pub enum AuthError {
    // OAuth2-related errors
    #[error("Invalid or expired OAuth2 state parameter")]
    InvalidState,

    #[error("OAuth2 provider error: {0}")]
    ProviderError(String),

    #[error("Authorization code missing from callback")]
    MissingCode,

    #[error("OAuth2 code exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Invalid identity token: {0}")]
    InvalidIdentityToken(String),

    // Session-related errors
    #[error("Session signature verification failed")]
    InvalidSignature,

    #[error("Session expired")]
    Expired,

    #[error("Not authenticated")]
    NotAuthenticated,

    // Provisioning errors
    #[error("User provisioning failed: {0}")]
    Provisioning(#[from] UserRepositoryError),

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        AuthError::InvalidConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidSignature | AuthError::Expired | AuthError::NotAuthenticated => 401,

            AuthError::InvalidState
            | AuthError::ProviderError(_)
            | AuthError::MissingCode
            | AuthError::InvalidIdentityToken(_) => 400,

            AuthError::TokenExchangeFailed(_) => 502,

            AuthError::Provisioning(_)
            | AuthError::InvalidConfig { .. }
            | AuthError::Internal(_) => 500,
        }
    }

    /// Coarse, browser-safe code carried in the `error` query parameter when a
    /// callback fails. Never includes internal detail.
    pub fn callback_error_code(&self) -> String {
        match self {
            AuthError::InvalidState => "invalid_state".to_string(),
            AuthError::MissingCode => "no_code".to_string(),
            AuthError::ProviderError(code) => code.clone(),
            _ => "token_exchange_failed".to_string(),
        }
    }
}
