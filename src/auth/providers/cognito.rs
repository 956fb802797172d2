/// Hosted-UI OAuth2 provider (AWS Cognito style)
///
/// Drives the authorization-code flow against a hosted OAuth2 domain that
/// federates to an upstream identity provider (Google by default). Identity
/// tokens are verified against the issuer's JWKS unless configured otherwise.
use super::{
    IdentityClaims, IdentityProvider, ProviderTokens, RawIdentityClaims, decode_unverified_claims,
};
use crate::auth::config::{AuthConfig, ProviderConfig};
use crate::auth::error::AuthError;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Token endpoint request (form encoded). Not `Debug`: it carries the secret.
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(Deserialize)]
struct TokenResponseRaw {
    access_token: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
}

pub struct CognitoProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    config: ProviderConfig,
    http_client: reqwest::Client,
    /// Cached JWKS `keys` array
    jwks: RwLock<Vec<serde_json::Value>>,
}

impl CognitoProvider {
    pub fn new(auth: &AuthConfig) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(auth.provider.token_timeout())
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        if !auth.provider.verify_identity_signature {
            warn!(
                "Identity token signature verification is disabled; trusting tokens from the code exchange channel"
            );
        }

        Ok(Self {
            client_id: auth.client_id.clone(),
            client_secret: auth.client_secret.clone(),
            redirect_uri: auth.redirect_uri.clone(),
            config: auth.provider.clone(),
            http_client,
            jwks: RwLock::new(Vec::new()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.domain.trim_end_matches('/'), path)
    }

    async fn fetch_jwks(&self) -> Result<Vec<serde_json::Value>, AuthError> {
        let jwks_url = self.config.jwks_url().ok_or_else(|| {
            AuthError::InvalidIdentityToken("no issuer configured for JWKS lookup".to_string())
        })?;

        let response = self
            .http_client
            .get(&jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::InvalidIdentityToken(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidIdentityToken(format!(
                "JWKS request failed with status {}",
                response.status()
            )));
        }

        let jwks = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AuthError::InvalidIdentityToken(format!("Failed to parse JWKS: {}", e)))?;

        jwks["keys"]
            .as_array()
            .cloned()
            .ok_or_else(|| AuthError::InvalidIdentityToken("Invalid JWKS format".to_string()))
    }

    /// Find the JWK for `kid`, refreshing the cache once on a miss
    async fn signing_key(&self, kid: &str) -> Result<serde_json::Value, AuthError> {
        let find = |keys: &[serde_json::Value]| {
            keys.iter().find(|k| k["kid"].as_str() == Some(kid)).cloned()
        };

        if let Some(key) = find(self.jwks.read().await.as_slice()) {
            return Ok(key);
        }

        debug!("JWKS cache miss, refreshing signing keys");
        let keys = self.fetch_jwks().await?;
        let key = find(keys.as_slice());
        *self.jwks.write().await = keys;

        key.ok_or_else(|| {
            AuthError::InvalidIdentityToken(format!("Key ID {} not found in JWKS", kid))
        })
    }

    async fn verify_id_token(&self, id_token: &str) -> Result<RawIdentityClaims, AuthError> {
        let header = decode_header(id_token).map_err(|e| {
            AuthError::InvalidIdentityToken(format!("Failed to decode header: {}", e))
        })?;

        let kid = header.kid.ok_or_else(|| {
            AuthError::InvalidIdentityToken("ID token missing key ID (kid)".to_string())
        })?;

        let jwk = self.signing_key(&kid).await?;

        let n = jwk["n"]
            .as_str()
            .ok_or_else(|| AuthError::InvalidIdentityToken("Missing 'n' in JWK".to_string()))?;
        let e = jwk["e"]
            .as_str()
            .ok_or_else(|| AuthError::InvalidIdentityToken("Missing 'e' in JWK".to_string()))?;

        let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|e| {
            AuthError::InvalidIdentityToken(format!("Failed to create decoding key: {}", e))
        })?;

        let issuer = self.config.issuer.as_deref().unwrap_or_default();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[issuer]);

        let token_data = decode::<RawIdentityClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| AuthError::InvalidIdentityToken(format!("validation failed: {}", e)))?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl IdentityProvider for CognitoProvider {
    fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        let mut url = url::Url::parse(&self.endpoint("/oauth2/authorize"))
            .map_err(|e| AuthError::invalid_config("auth.provider.domain", e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("identity_provider", &self.config.identity_provider);

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError> {
        let token_request = TokenRequest {
            grant_type: "authorization_code",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            code,
            redirect_uri: &self.redirect_uri,
        };

        let response = self
            .http_client
            .post(self.endpoint("/oauth2/token"))
            .form(&token_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::TokenExchangeFailed("token request timed out".to_string())
                } else {
                    AuthError::TokenExchangeFailed(format!("token request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AuthError::TokenExchangeFailed(format!("failed to read token response: {}", e))
        })?;

        if !status.is_success() {
            let upstream = serde_json::from_str::<TokenErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(AuthError::TokenExchangeFailed(format!(
                "token endpoint returned {} ({})",
                status, upstream
            )));
        }

        let raw: TokenResponseRaw = serde_json::from_str(&body).map_err(|e| {
            AuthError::TokenExchangeFailed(format!("malformed token response: {}", e))
        })?;

        let id_token = raw.id_token.ok_or_else(|| {
            AuthError::TokenExchangeFailed("token response missing id_token".to_string())
        })?;

        Ok(ProviderTokens {
            access_token: raw.access_token,
            id_token,
            refresh_token: raw.refresh_token,
            expires_in: raw.expires_in,
        })
    }

    async fn decode_identity(&self, id_token: &str) -> Result<IdentityClaims, AuthError> {
        let claims = if self.config.verify_identity_signature {
            self.verify_id_token(id_token).await?
        } else {
            decode_unverified_claims(id_token)?
        };

        Ok(claims.into())
    }
}
