/// Identity provider client
///
/// This module defines the `IdentityProvider` trait that the login flow talks
/// to, plus the hosted-UI (Cognito-style) implementation used in production.
use crate::auth::error::AuthError;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod cognito;

pub use cognito::CognitoProvider;

/// Tokens returned by the provider's token endpoint
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderTokens {
    /// Access token for provider APIs
    pub access_token: String,

    /// OpenID Connect identity token (JWT)
    pub id_token: String,

    /// Refresh token, when the provider issues one
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds
    pub expires_in: Option<u64>,
}

// Tokens are credentials; keep them out of debug output and logs.
impl fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &"<redacted>")
            .field("id_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Identity extracted from the provider's identity token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityClaims {
    /// Stable subject identifier (`sub`)
    pub subject_id: String,

    pub email: Option<String>,

    pub username: Option<String>,
}

/// Claims read from an identity token payload
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawIdentityClaims {
    pub sub: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(rename = "cognito:username", default)]
    pub cognito_username: Option<String>,

    #[serde(default)]
    pub preferred_username: Option<String>,
}

impl From<RawIdentityClaims> for IdentityClaims {
    fn from(raw: RawIdentityClaims) -> Self {
        Self {
            subject_id: raw.sub,
            email: raw.email,
            username: raw.cognito_username.or(raw.preferred_username),
        }
    }
}

/// Decode a JWT payload without checking its signature.
///
/// Only for tokens received directly from the provider's token endpoint over
/// the client-secret authenticated channel.
pub(crate) fn decode_unverified_claims(token: &str) -> Result<RawIdentityClaims, AuthError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(AuthError::InvalidIdentityToken(
                "expected three dot-separated segments".to_string(),
            ));
        }
    };

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::InvalidIdentityToken(format!("payload is not base64url: {}", e)))?;

    let claims: RawIdentityClaims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidIdentityToken(format!("payload is not valid JSON: {}", e)))?;

    if claims.sub.is_empty() {
        return Err(AuthError::InvalidIdentityToken(
            "subject claim is empty".to_string(),
        ));
    }

    Ok(claims)
}

/// OAuth2 authorization-code client for a single identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the provider authorization URL carrying the given state
    fn authorization_url(&self, state: &str) -> Result<String, AuthError>;

    /// Redeem an authorization code for tokens.
    /// Every failure mode is reported as `TokenExchangeFailed`.
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError>;

    /// Extract the authenticated identity from an identity token
    async fn decode_identity(&self, id_token: &str) -> Result<IdentityClaims, AuthError>;
}
