// Authentication Module
// OAuth2 login via a hosted identity provider with signed cookie sessions

pub mod config;
pub mod cookie;
pub mod error;
pub mod manager;
pub mod middleware;
pub mod providers;
pub mod provisioning;
pub mod routes;
pub mod security;
pub mod session;
pub mod state;

pub use config::{AuthConfig, CookieConfig, ProviderConfig};
pub use cookie::SessionCookie;
pub use error::AuthError;
pub use manager::{AuthManager, CallbackParams, CompletedLogin};
pub use middleware::{AuthErrorResponse, require_session};
pub use providers::{CognitoProvider, IdentityClaims, IdentityProvider, ProviderTokens};
pub use provisioning::UserProvisioner;
pub use routes::create_auth_router;
pub use session::{SessionCodec, SessionRecord};
pub use state::{InMemoryStateStore, StateStore};
