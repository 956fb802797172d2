/// Authentication Routes
///
/// HTTP route handlers for the OAuth2 login flow (initiation, callback and
/// logout) plus the session-protected identity endpoints.
use crate::auth::{AuthErrorResponse, AuthManager, CallbackParams, SessionRecord, require_session};
use crate::user_repository::BandMembership;
use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Local user as reported by `/api/me`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeUser {
    pub id: Uuid,
    pub cognito_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub profile_completed: bool,
}

/// Session timing in milliseconds since the epoch
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTiming {
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: MeUser,
    pub bands: Vec<BandMembership>,
    pub session: SessionTiming,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: SessionUser,
}

/// 302 Found with a `Location` header
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(e) => {
            error!("Invalid redirect location {}: {}", location, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Start the login flow by redirecting to the identity provider
async fn start_login(
    State(auth_manager): State<Arc<AuthManager>>,
    headers: HeaderMap,
) -> Result<Response, AuthErrorResponse> {
    let origin_hint = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(auth_manager.config().frontend_url.as_str())
        .to_string();

    let auth_url = auth_manager.start_login(&origin_hint).await?;
    Ok(found(&auth_url))
}

/// Handle the provider callback: set the session cookie and land on the dashboard,
/// or bounce back to the login page with a coarse error code
async fn oauth_callback(
    State(auth_manager): State<Arc<AuthManager>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let config = auth_manager.config();

    let login = match auth_manager.handle_callback(params).await {
        Ok(login) => login,
        Err(e) => return found(&config.login_error_url(&e.callback_error_code())),
    };

    let mut response = found(&config.dashboard_url());
    if let Err(e) = auth_manager.cookie().attach(&mut response, &login.credential) {
        error!("Failed to set session cookie: {}", e);
        return found(&config.login_error_url("token_exchange_failed"));
    }

    info!(origin = %login.origin_hint, "Login completed, redirecting to dashboard");
    response
}

async fn logout(State(auth_manager): State<Arc<AuthManager>>) -> Response {
    let mut response = Json(serde_json::json!({ "success": true })).into_response();
    if let Err(e) = auth_manager.cookie().clear(&mut response) {
        return AuthErrorResponse::from(e).into_response();
    }

    info!("Session cookie cleared");
    response
}

/// Identity, local user, active bands and session timing
async fn current_user(
    State(auth_manager): State<Arc<AuthManager>>,
    Extension(session): Extension<SessionRecord>,
) -> Result<Json<MeResponse>, AuthErrorResponse> {
    let users = auth_manager.users();
    let user = users
        .resolve(&session.user_id, session.email.as_deref())
        .await?;
    let bands = users.active_memberships(&user).await?;

    Ok(Json(MeResponse {
        session: SessionTiming {
            issued_at: session.issued_at.timestamp_millis(),
            expires_at: session.expires_at().timestamp_millis(),
        },
        user: MeUser {
            id: user.id,
            profile_completed: user.profile_completed(),
            cognito_id: session.user_id,
            username: session.username,
            email: session.email,
            phone: user.phone,
            created_at: user.created_at,
        },
        bands,
    }))
}

async fn session_status(Extension(session): Extension<SessionRecord>) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: true,
        user: SessionUser {
            id: session.user_id,
            username: session.username,
            email: session.email,
        },
    })
}

/// Create authentication router
pub fn create_auth_router(auth_manager: Arc<AuthManager>) -> Router {
    let protected = Router::new()
        .route("/api/me", get(current_user))
        .route("/auth/session", get(session_status))
        .route_layer(middleware::from_fn_with_state(
            auth_manager.clone(),
            require_session,
        ));

    Router::new()
        .route("/auth/google", get(start_login))
        .route("/auth/callback", get(oauth_callback))
        .route("/auth/logout", post(logout))
        .merge(protected)
        .with_state(auth_manager)
}
