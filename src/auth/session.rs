// Session Credential Codec
// Signs the session record into a self-contained HS256 JWT and verifies it

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::MIN_SESSION_SECRET_LEN;
use super::error::AuthError;
use super::providers::{IdentityClaims, ProviderTokens};

/// How long a signed session credential is accepted
pub const SESSION_VALIDITY_DAYS: i64 = 7;

pub fn session_validity() -> Duration {
    Duration::days(SESSION_VALIDITY_DAYS)
}

/// Authenticated session carried inside the credential
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    /// Identity provider subject id
    pub user_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    /// Millisecond precision, so the record survives a sign/verify round trip
    pub issued_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(identity: IdentityClaims, tokens: ProviderTokens) -> Self {
        let now = Utc::now();
        let issued_at = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        Self {
            user_id: identity.subject_id,
            username: identity.username,
            email: identity.email,
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            issued_at,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + session_validity()
    }
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

/// JWT claims - the wire form of a `SessionRecord`
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    access_token: String,
    id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(rename = "issuedAt", with = "chrono::serde::ts_milliseconds")]
    issued_at: DateTime<Utc>,
    iat: i64,
    exp: i64,
}

/// Issues and verifies session credentials with a server-held secret
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    /// Create a codec. The secret is mandatory and must be at least 32 bytes.
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        if secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(AuthError::invalid_config(
                "auth.session_secret",
                format!("must be at least {} bytes", MIN_SESSION_SECRET_LEN),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Sign a record; the credential expires `issued_at + 7 days`
    pub fn sign(&self, record: &SessionRecord) -> Result<String, AuthError> {
        let claims = SessionClaims {
            sub: record.user_id.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
            access_token: record.access_token.clone(),
            id_token: record.id_token.clone(),
            refresh_token: record.refresh_token.clone(),
            issued_at: record.issued_at,
            iat: record.issued_at.timestamp(),
            exp: record.expires_at().timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign session: {}", e)))
    }

    /// Verify the signature, then the validity window, then hand back the record
    pub fn verify(&self, credential: &str) -> Result<SessionRecord, AuthError> {
        let claims = jsonwebtoken::decode::<SessionClaims>(
            credential,
            &self.decoding_key,
            &self.validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidSignature,
        })?;

        let record = SessionRecord {
            user_id: claims.sub,
            username: claims.username,
            email: claims.email,
            access_token: claims.access_token,
            id_token: claims.id_token,
            refresh_token: claims.refresh_token,
            issued_at: claims.issued_at,
        };

        // The window is anchored on issuedAt, whatever `exp` says
        if Utc::now() >= record.expires_at() {
            return Err(AuthError::Expired);
        }

        Ok(record)
    }
}
