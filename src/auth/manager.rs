/// Authentication Manager
///
/// Central orchestrator for the login flow: issues and consumes state,
/// drives the provider code exchange, signs session credentials and hands
/// verified sessions to the middleware.
use crate::auth::{
    AuthConfig, AuthError, CognitoProvider, IdentityProvider, InMemoryStateStore, SessionCodec,
    SessionCookie, SessionRecord, StateStore, UserProvisioner, security,
};
use crate::user_repository::UserStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Query parameters the provider sends back to the callback endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of a successful callback
#[derive(Debug)]
pub struct CompletedLogin {
    /// Signed session credential for the cookie
    pub credential: String,
    pub session: SessionRecord,
    /// Where the login started (advisory)
    pub origin_hint: String,
}

/// Central authentication manager
pub struct AuthManager {
    config: Arc<AuthConfig>,
    states: Arc<dyn StateStore>,
    provider: Arc<dyn IdentityProvider>,
    codec: SessionCodec,
    cookie: SessionCookie,
    users: UserProvisioner,
}

impl AuthManager {
    /// Create a new authentication manager from explicit collaborators
    pub fn new(
        config: AuthConfig,
        states: Arc<dyn StateStore>,
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self, AuthError> {
        let codec = SessionCodec::new(&config.session_secret)?;
        let cookie = SessionCookie::new(&config.cookie);

        Ok(Self {
            config: Arc::new(config),
            states,
            provider,
            codec,
            cookie,
            users: UserProvisioner::new(users),
        })
    }

    /// Wire the production collaborators: in-process state store and the
    /// hosted-UI provider client. Expects a config that already passed
    /// `AuthConfig::validate`.
    pub fn from_config(config: AuthConfig, users: Arc<dyn UserStore>) -> Result<Self, AuthError> {
        let states = Arc::new(InMemoryStateStore::new(config.state_ttl())?);
        let provider = Arc::new(CognitoProvider::new(&config)?);

        Self::new(config, states, provider, users)
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    pub fn users(&self) -> &UserProvisioner {
        &self.users
    }

    /// Issue a state and build the provider authorization URL
    pub async fn start_login(&self, origin_hint: &str) -> Result<String, AuthError> {
        let state = self.states.issue(origin_hint).await?;
        let url = self.provider.authorization_url(&state)?;

        security::log_auth_attempt(&state, &self.config.redirect_uri);
        Ok(url)
    }

    /// Complete the authorization-code flow.
    ///
    /// The state is consumed before anything else, so a provider error or a
    /// missing code still burns it.
    pub async fn handle_callback(
        &self,
        params: CallbackParams,
    ) -> Result<CompletedLogin, AuthError> {
        let origin_hint = match params.state.as_deref() {
            Some(state) if !state.is_empty() => self.states.consume(state).await,
            _ => Err(AuthError::InvalidState),
        }
        .inspect_err(|e| security::log_auth_failure("invalid_state", &e.to_string()))?;

        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            security::log_auth_failure(
                &error,
                params.error_description.as_deref().unwrap_or("no description"),
            );
            return Err(AuthError::ProviderError(error));
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCode)
            .inspect_err(|e| security::log_auth_failure("no_code", &e.to_string()))?;

        let tokens = self
            .provider
            .exchange_code(&code)
            .await
            .inspect_err(|e| security::log_auth_failure("token_exchange_failed", &e.to_string()))?;

        let identity = self
            .provider
            .decode_identity(&tokens.id_token)
            .await
            .inspect_err(|e| security::log_auth_failure("invalid_identity_token", &e.to_string()))?;

        security::log_auth_success(
            &identity.subject_id,
            identity.email.as_deref(),
            identity.username.as_deref(),
        );

        let session = SessionRecord::new(identity, tokens);
        let credential = self.codec.sign(&session)?;

        Ok(CompletedLogin {
            credential,
            session,
            origin_hint,
        })
    }

    /// Verify a session credential taken from the cookie
    pub fn authenticate(&self, credential: &str) -> Result<SessionRecord, AuthError> {
        let session = self.codec.verify(credential)?;
        debug!(user_id = %security::redact_id(&session.user_id), "Session verified");
        Ok(session)
    }
}
