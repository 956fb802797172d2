/// Mock hosted identity provider for exercising the real provider client.
/// Serves the OAuth2 token endpoint and a JWKS document, and signs identity
/// tokens with a fixed RSA test key.
use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};

pub const CLIENT_ID: &str = "mock-client-id";
pub const CLIENT_SECRET: &str = "mock-client-secret";
pub const SIGNING_KID: &str = "mock-key-1";
pub const SUBJECT: &str = "9f1c2d3e-aaaa-bbbb-cccc-0123456789ab";

const SIGNING_KEY_PEM: &str = include_str!("../fixtures/idp_signing_key.pem");

/// Base64url modulus of the fixture key
const SIGNING_KEY_N: &str = "m1HX6hjk-dIRABjEfiwjr9ONB99nyDtVdMylPcZxYyx-JNnlV94WjyfwJW6jpI5ode1XCYh_QKTKMu_DBHt1Ube4ex-vtdGq3A3TCm1tUoMc5pjV7yDUNZ42YkfRzdB6uLdRZTbfu2rCFqNy4LUPyL2ogn4O79f4AjEm6S_efx68HXp1Yi7wE7FxaC3UbexnaA9vgSf5quzoeRd-MLE4f-JbNMPF1Wba9ECny-ya9qDpW07gbzoSQHln6yp_lPRDP-J6OsrUkN-1SgIOq5X6i-Imwbp3k6ypJ6h8hWNO4Fr6tQMc1MgFCWi7jl84OwHDBC4D3CyEb-MbWx-q6e2LVQ";

#[derive(Default)]
struct Recorded {
    token_requests: Mutex<Vec<HashMap<String, String>>>,
    jwks_fetches: AtomicUsize,
}

#[derive(Clone)]
struct IdpState {
    issuer: String,
    recorded: Arc<Recorded>,
}

pub struct MockIdp {
    pub port: u16,
    recorded: Arc<Recorded>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockIdp {
    /// Start a mock provider on a random available port
    pub async fn start() -> anyhow::Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        let recorded = Arc::new(Recorded::default());
        let state = IdpState {
            issuer: format!("http://127.0.0.1:{}/pool", port),
            recorded: recorded.clone(),
        };

        let app = Router::new()
            .route("/oauth2/token", post(handle_token))
            .route("/pool/.well-known/jwks.json", get(handle_jwks))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Mock identity provider failed");
        });

        Ok(Self {
            port,
            recorded,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn domain(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn issuer(&self) -> String {
        format!("http://127.0.0.1:{}/pool", self.port)
    }

    /// Identity token signed the way the provider signs them
    pub fn identity_token(&self, kid: &str, audience: &str) -> String {
        sign_identity_token(&self.issuer(), kid, audience)
    }

    pub async fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.recorded.token_requests.lock().await.clone()
    }

    pub fn jwks_fetches(&self) -> usize {
        self.recorded.jwks_fetches.load(Ordering::SeqCst)
    }
}

impl Drop for MockIdp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn sign_identity_token(issuer: &str, kid: &str, audience: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "sub": SUBJECT,
        "email": "singer@example.com",
        "cognito:username": "google_10987654321",
        "aud": audience,
        "iss": issuer,
        "token_use": "id",
        "iat": now,
        "exp": now + 3600,
    });

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());

    let key = EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes()).expect("fixture key");
    jsonwebtoken::encode(&header, &claims, &key).expect("sign identity token")
}

// Handler functions

/// Behavior is selected by the authorization code
async fn handle_token(
    State(state): State<IdpState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let code = form.get("code").cloned().unwrap_or_default();
    state.recorded.token_requests.lock().await.push(form);

    let tokens = |id_token: Option<String>| {
        let mut body = json!({
            "access_token": "mock-access-token",
            "refresh_token": "mock-refresh-token",
            "token_type": "Bearer",
            "expires_in": 3600,
        });
        if let Some(id_token) = id_token {
            body["id_token"] = json!(id_token);
        }
        Json(body).into_response()
    };

    match code.as_str() {
        "valid-code" => tokens(Some(sign_identity_token(
            &state.issuer,
            SIGNING_KID,
            CLIENT_ID,
        ))),
        "rotated-key-code" => tokens(Some(sign_identity_token(
            &state.issuer,
            "rotated-key",
            CLIENT_ID,
        ))),
        "no-id-token-code" => tokens(None),
        "malformed-code" => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        "slow-code" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            tokens(Some(sign_identity_token(
                &state.issuer,
                SIGNING_KID,
                CLIENT_ID,
            )))
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response(),
    }
}

async fn handle_jwks(State(state): State<IdpState>) -> Json<serde_json::Value> {
    state.recorded.jwks_fetches.fetch_add(1, Ordering::SeqCst);

    Json(json!({
        "keys": [{
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": SIGNING_KID,
            "n": SIGNING_KEY_N,
            "e": "AQAB",
        }]
    }))
}
