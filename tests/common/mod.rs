#![allow(dead_code)]

pub mod mock_idp;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use bandgate::auth::{
    AuthConfig, AuthError, AuthManager, CookieConfig, IdentityClaims, IdentityProvider,
    InMemoryStateStore, ProviderConfig, ProviderTokens,
};
use bandgate::build_router;
use bandgate::user_repository::InMemoryUserStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

pub const TEST_SESSION_SECRET: &str = "integration-session-secret-32byt";
pub const FRONTEND_URL: &str = "http://localhost:5173";
pub const SUBJECT: &str = "0b5c4a1e-1111-2222-3333-444455556666";

/// Identity provider double: `good-code` redeems, everything else is rejected
#[derive(Default)]
pub struct FakeProvider {
    exchanges: AtomicUsize,
}

impl FakeProvider {
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        Ok(format!(
            "https://auth.example.com/oauth2/authorize?response_type=code&state={}",
            state
        ))
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);

        if code != "good-code" {
            return Err(AuthError::TokenExchangeFailed(
                "token endpoint returned 400 Bad Request (invalid_grant)".to_string(),
            ));
        }

        Ok(ProviderTokens {
            access_token: "access-token".to_string(),
            id_token: "identity-token".to_string(),
            refresh_token: Some("refresh-token".to_string()),
            expires_in: Some(3600),
        })
    }

    async fn decode_identity(&self, _id_token: &str) -> Result<IdentityClaims, AuthError> {
        Ok(IdentityClaims {
            subject_id: SUBJECT.to_string(),
            email: Some("drummer@example.com".to_string()),
            username: Some("google_12345".to_string()),
        })
    }
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        session_secret: TEST_SESSION_SECRET.to_string(),
        redirect_uri: "http://localhost:3001/auth/callback".to_string(),
        frontend_url: FRONTEND_URL.to_string(),
        provider: ProviderConfig {
            domain: "https://auth.example.com".to_string(),
            verify_identity_signature: false,
            ..Default::default()
        },
        cookie: CookieConfig::default(),
        ..Default::default()
    }
}

/// In-process application wired with fakes, driven through `oneshot`
pub struct TestApp {
    pub router: Router,
    pub provider: Arc<FakeProvider>,
    pub users: Arc<InMemoryUserStore>,
    pub config: AuthConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_auth_config())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let provider = Arc::new(FakeProvider::default());
        let users = Arc::new(InMemoryUserStore::new());

        let manager = AuthManager::new(
            config.clone(),
            Arc::new(InMemoryStateStore::new(config.state_ttl()).expect("state ttl")),
            provider.clone(),
            users.clone(),
        )
        .expect("auth manager");

        let router = build_router(Arc::new(manager), None).expect("router");

        Self {
            router,
            provider,
            users,
            config,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Start a login and return the issued state
    pub async fn begin_login(&self) -> String {
        let response = self.get("/auth/google", None).await;
        state_from_location(&location(&response))
    }

    /// Full login; returns the `name=value` pair to send back as a cookie
    pub async fn login(&self) -> String {
        let state = self.begin_login().await;
        let response = self
            .get(
                &format!("/auth/callback?code=good-code&state={}", state),
                None,
            )
            .await;
        cookie_pair(&set_cookie(&response))
    }
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn set_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` from a `Set-Cookie` header
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().trim().to_string()
}

pub fn state_from_location(location: &str) -> String {
    url::Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state parameter")
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
