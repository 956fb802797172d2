/// Authentication Middleware
///
/// Axum middleware that verifies the session cookie and injects the
/// `SessionRecord` into request extensions for downstream handlers.
use crate::auth::{AuthError, AuthManager};
use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Required authentication middleware - requires a valid session or returns 401
pub async fn require_session(
    State(auth_manager): State<Arc<AuthManager>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(credential) = auth_manager.cookie().extract(req.headers()) else {
        debug!(path = %req.uri().path(), "No session cookie on protected route");
        return AuthErrorResponse::from(AuthError::NotAuthenticated).into_response();
    };

    match auth_manager.authenticate(&credential) {
        Ok(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        Err(e) => {
            warn!(path = %req.uri().path(), "Rejected session: {}", e);

            let mut response = (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Invalid session" })),
            )
                .into_response();
            if let Err(e) = auth_manager.cookie().clear(&mut response) {
                warn!("Failed to clear session cookie: {}", e);
            }
            response
        }
    }
}

/// Error response for authentication failures
#[derive(Debug)]
pub struct AuthErrorResponse {
    pub error: AuthError,
}

impl IntoResponse for AuthErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Server-side detail stays in the log
        let message = match status {
            StatusCode::UNAUTHORIZED => "Not authenticated",
            s if s.is_server_error() => "Internal server error",
            _ => "Bad request",
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self.error);
        }

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for AuthErrorResponse {
    fn from(error: AuthError) -> Self {
        Self { error }
    }
}
