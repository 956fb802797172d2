// Authentication Configuration
// OAuth2 client settings, session signing secret and cookie attributes

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::AuthError;

/// Minimum length of the session signing secret, in bytes
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Main authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth2 client identifier issued by the identity provider
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret (never logged)
    #[serde(default)]
    pub client_secret: String,

    /// HMAC secret for signing session credentials (minimum 32 bytes)
    #[serde(default)]
    pub session_secret: String,

    /// Callback URL registered with the provider
    #[serde(default)]
    pub redirect_uri: String,

    /// Base URL of the frontend; login and dashboard redirects are built from it
    #[serde(default)]
    pub frontend_url: String,

    /// Lifetime of an unconsumed OAuth2 state parameter, in seconds
    #[serde(default = "default_state_ttl")]
    pub state_ttl_secs: u64,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub cookie: CookieConfig,
}

impl AuthConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::invalid_config("auth.client_id", "cannot be empty"));
        }

        if self.client_secret.is_empty() {
            return Err(AuthError::invalid_config(
                "auth.client_secret",
                "cannot be empty",
            ));
        }

        if self.session_secret.is_empty() {
            return Err(AuthError::invalid_config(
                "auth.session_secret",
                "is required in every environment",
            ));
        }

        if self.session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(AuthError::invalid_config(
                "auth.session_secret",
                format!("must be at least {} bytes", MIN_SESSION_SECRET_LEN),
            ));
        }

        validate_http_url("auth.redirect_uri", &self.redirect_uri)?;
        validate_http_url("auth.frontend_url", &self.frontend_url)?;

        if self.state_ttl_secs == 0 {
            return Err(AuthError::invalid_config(
                "auth.state_ttl_secs",
                "must be at least 1 second",
            ));
        }

        if chrono::Duration::from_std(self.state_ttl()).is_err() {
            return Err(AuthError::invalid_config(
                "auth.state_ttl_secs",
                "is out of range",
            ));
        }

        self.provider.validate()?;
        self.cookie.validate()?;

        Ok(())
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    /// Frontend base URL without a trailing slash
    pub fn frontend_base(&self) -> &str {
        self.frontend_url.trim_end_matches('/')
    }

    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.frontend_base())
    }

    pub fn login_error_url(&self, code: &str) -> String {
        format!(
            "{}/login?error={}",
            self.frontend_base(),
            urlencoding::encode(code)
        )
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            session_secret: String::new(), // Must be set explicitly
            redirect_uri: "http://localhost:3001/auth/callback".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            state_ttl_secs: default_state_ttl(),
            provider: ProviderConfig::default(),
            cookie: CookieConfig::default(),
        }
    }
}

/// Hosted identity provider (Cognito-style OAuth2 domain) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the hosted OAuth2 domain, e.g. `https://auth.example.com`
    #[serde(default)]
    pub domain: String,

    /// Upstream federated provider forced on the hosted login page
    #[serde(default = "default_identity_provider")]
    pub identity_provider: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Upper bound on the code exchange round trip, in seconds
    #[serde(default = "default_token_timeout")]
    pub token_timeout_secs: u64,

    /// Verify the identity token against the issuer's JWKS. When disabled the
    /// payload is trusted because it arrived over the secret-authenticated
    /// token exchange.
    #[serde(default = "default_true")]
    pub verify_identity_signature: bool,

    /// Token issuer, e.g. `https://cognito-idp.eu-west-2.amazonaws.com/<pool>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl ProviderConfig {
    fn validate(&self) -> Result<(), AuthError> {
        validate_http_url("auth.provider.domain", &self.domain)?;

        if self.scopes.is_empty() {
            return Err(AuthError::invalid_config(
                "auth.provider.scopes",
                "at least one scope is required",
            ));
        }

        if self.token_timeout_secs == 0 {
            return Err(AuthError::invalid_config(
                "auth.provider.token_timeout_secs",
                "must be at least 1 second",
            ));
        }

        if self.verify_identity_signature {
            match self.issuer.as_deref() {
                Some(issuer) => validate_http_url("auth.provider.issuer", issuer)?,
                None => {
                    return Err(AuthError::invalid_config(
                        "auth.provider.issuer",
                        "required when verify_identity_signature is enabled",
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    pub fn jwks_url(&self) -> Option<String> {
        self.issuer
            .as_deref()
            .map(|issuer| format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/')))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            identity_provider: default_identity_provider(),
            scopes: default_scopes(),
            token_timeout_secs: default_token_timeout(),
            verify_identity_signature: true,
            issuer: None,
        }
    }
}

/// Cookie configuration for the session credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,

    /// Cookie domain (None = host-only cookie). Use a leading dot to share the
    /// session across subdomains, e.g. `.example.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Secure flag (HTTPS only) - should be true in production
    #[serde(default)]
    pub secure: bool,

    #[serde(default = "default_cookie_path")]
    pub path: String,
}

impl CookieConfig {
    fn validate(&self) -> Result<(), AuthError> {
        if self.name.is_empty() {
            return Err(AuthError::invalid_config("auth.cookie.name", "cannot be empty"));
        }

        if self
            .name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '=' | ','))
        {
            return Err(AuthError::invalid_config(
                "auth.cookie.name",
                "contains characters not allowed in a cookie name",
            ));
        }

        if let Some(domain) = &self.domain
            && domain.trim().is_empty()
        {
            return Err(AuthError::invalid_config(
                "auth.cookie.domain",
                "cannot be blank; omit it for a host-only cookie",
            ));
        }

        Ok(())
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            domain: None,
            secure: false, // Development default
            path: default_cookie_path(),
        }
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), AuthError> {
    if value.is_empty() {
        return Err(AuthError::invalid_config(key, "cannot be empty"));
    }

    let parsed = url::Url::parse(value)
        .map_err(|e| AuthError::invalid_config(key, format!("invalid URL: {}", e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AuthError::invalid_config(
            key,
            "must start with http:// or https://",
        ));
    }

    Ok(())
}

// Default value functions
fn default_state_ttl() -> u64 {
    300 // 5 minutes
}

fn default_identity_provider() -> String {
    "Google".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "email".to_string(),
        "openid".to_string(),
        "profile".to_string(),
        "phone".to_string(),
    ]
}

fn default_token_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_cookie_name() -> String {
    "bndy_session".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}
