use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

pub mod auth;
pub mod config;
pub mod database;
pub mod user_repository;

use auth::{AuthManager, create_auth_router};
use config::DatabaseConfig;
use database::Database;
use user_repository::{InMemoryUserStore, PgUserStore, UserStore};

/// Liveness, plus a database probe when one is configured
async fn health(State(database): State<Option<Arc<Database>>>) -> Response {
    let Some(db) = database else {
        return Json(serde_json::json!({ "status": "ok" })).into_response();
    };

    match db.health_check().await {
        Ok(()) => Json(serde_json::json!({ "status": "ok", "database": "ok" })).into_response(),
        Err(e) => {
            warn!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "degraded", "database": "unavailable" })),
            )
                .into_response()
        }
    }
}

/// CORS for the single frontend origin, with credentials so the session cookie travels
fn cors_layer(frontend_url: &str) -> anyhow::Result<CorsLayer> {
    let origin = url::Url::parse(frontend_url)?.origin().ascii_serialization();
    let origin = HeaderValue::from_str(&origin)?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Build the full application router around an auth manager
pub fn build_router(
    auth_manager: Arc<AuthManager>,
    database: Option<Arc<Database>>,
) -> anyhow::Result<Router> {
    let cors = cors_layer(&auth_manager.config().frontend_url)?;

    Ok(Router::new()
        .route("/health", get(health))
        .with_state(database)
        .merge(create_auth_router(auth_manager))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Pick the user store: PostgreSQL when a URL is configured, memory otherwise
pub fn build_user_store(
    config: &DatabaseConfig,
) -> anyhow::Result<(Arc<dyn UserStore>, Option<Arc<Database>>)> {
    match config.url {
        Some(_) => {
            let db = Arc::new(Database::new(config)?);
            let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(db.clone()));
            Ok((store, Some(db)))
        }
        None => {
            warn!("No database configured; users are kept in memory and lost on restart");
            let store: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
            Ok((store, None))
        }
    }
}

/// Start server with the given configuration and return the bound port.
/// The server runs in the background until `shutdown_rx` fires.
pub async fn start_server_with_config(
    config: config::Config,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<u16> {
    config.validate()?;

    let (users, database) = build_user_store(&config.database)?;
    let auth_manager = Arc::new(AuthManager::from_config(config.auth.clone(), users)?);
    let app = build_router(auth_manager, database.clone())?;

    let listener = tokio::net::TcpListener::bind(config.server_addr()).await?;
    let port = listener.local_addr()?.port();
    info!("bandgate listening on {}:{}", config.server.host, port);

    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
            info!("Shutdown signal received");
        });

        if let Err(e) = server.await {
            error!("Server error: {}", e);
        }

        if let Some(db) = database {
            db.close().await;
        }
    });

    Ok(port)
}
