mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use bandgate::auth::{SessionCodec, SessionRecord};
use bandgate::user_repository::{BandMembership, UserStore};
use chrono::{Duration, Utc};
use common::{
    FRONTEND_URL, SUBJECT, TEST_SESSION_SECRET, TestApp, cookie_pair, json_body, location,
    set_cookie, state_from_location,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().compact())
        .try_init();
}

#[tokio::test]
async fn test_login_redirects_to_provider_with_state() {
    init_tracing();
    let app = TestApp::new();

    let response = app.get("/auth/google", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location(&response);
    assert!(location.starts_with("https://auth.example.com/oauth2/authorize"));
    assert_eq!(state_from_location(&location).len(), 64);
}

#[tokio::test]
async fn test_state_accepted_exactly_once() {
    let app = TestApp::new();
    let state = app.begin_login().await;
    let callback = format!("/auth/callback?code=good-code&state={}", state);

    let first = app.get(&callback, None).await;
    assert_eq!(first.status(), StatusCode::FOUND);
    assert_eq!(location(&first), format!("{}/dashboard", FRONTEND_URL));

    let replay = app.get(&callback, None).await;
    assert_eq!(replay.status(), StatusCode::FOUND);
    assert_eq!(
        location(&replay),
        format!("{}/login?error=invalid_state", FRONTEND_URL)
    );
    assert!(replay.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_unknown_state_never_reaches_provider() {
    let app = TestApp::new();

    let response = app
        .get("/auth/callback?code=good-code&state=forged-state", None)
        .await;

    assert_eq!(
        location(&response),
        format!("{}/login?error=invalid_state", FRONTEND_URL)
    );
    assert_eq!(app.provider.exchanges(), 0);
}

#[tokio::test]
async fn test_provider_error_is_forwarded_and_burns_state() {
    let app = TestApp::new();
    let state = app.begin_login().await;

    let response = app
        .get(
            &format!(
                "/auth/callback?error=access_denied&error_description=User+cancelled&state={}",
                state
            ),
            None,
        )
        .await;
    assert_eq!(
        location(&response),
        format!("{}/login?error=access_denied", FRONTEND_URL)
    );

    // The state is gone even though the login failed
    let retry = app
        .get(
            &format!("/auth/callback?code=good-code&state={}", state),
            None,
        )
        .await;
    assert_eq!(
        location(&retry),
        format!("{}/login?error=invalid_state", FRONTEND_URL)
    );
    assert_eq!(app.provider.exchanges(), 0);
}

#[tokio::test]
async fn test_blank_provider_error_continues_to_exchange() {
    let app = TestApp::new();
    let state = app.begin_login().await;

    let response = app
        .get(
            &format!("/auth/callback?error=&code=good-code&state={}", state),
            None,
        )
        .await;

    assert_eq!(location(&response), format!("{}/dashboard", FRONTEND_URL));
    assert_eq!(app.provider.exchanges(), 1);
}

#[tokio::test]
async fn test_missing_code_and_failed_exchange() {
    let app = TestApp::new();

    let state = app.begin_login().await;
    let response = app
        .get(&format!("/auth/callback?state={}", state), None)
        .await;
    assert_eq!(
        location(&response),
        format!("{}/login?error=no_code", FRONTEND_URL)
    );

    let state = app.begin_login().await;
    let response = app
        .get(
            &format!("/auth/callback?code=expired-code&state={}", state),
            None,
        )
        .await;
    assert_eq!(
        location(&response),
        format!("{}/login?error=token_exchange_failed", FRONTEND_URL)
    );
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_callback_sets_session_cookie() {
    let app = TestApp::new();
    let state = app.begin_login().await;

    let response = app
        .get(
            &format!("/auth/callback?code=good-code&state={}", state),
            None,
        )
        .await;

    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("bndy_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=604800"));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_me_provisions_user_and_lists_active_bands() {
    init_tracing();
    let app = TestApp::new();
    let cookie = app.login().await;

    let response = app.get("/api/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["user"]["cognitoId"], SUBJECT);
    assert_eq!(body["user"]["username"], "google_12345");
    assert_eq!(body["user"]["email"], "drummer@example.com");
    assert_eq!(body["user"]["profileCompleted"], false);
    assert!(body["bands"].as_array().unwrap().is_empty());

    let issued_at = body["session"]["issuedAt"].as_i64().unwrap();
    let expires_at = body["session"]["expiresAt"].as_i64().unwrap();
    assert_eq!(expires_at - issued_at, 7 * 24 * 60 * 60 * 1000);

    // Seed a membership for the provisioned user and ask again
    let user = app.users.find_by_subject(SUBJECT).await.unwrap().unwrap();
    assert_eq!(body["user"]["id"], user.id.to_string());
    app.users
        .add_membership(
            user.id,
            BandMembership {
                id: Uuid::new_v4(),
                name: "The Regulars".to_string(),
                role: "owner".to_string(),
                status: "active".to_string(),
            },
        )
        .await;

    let body = json_body(app.get("/api/me", Some(&cookie)).await).await;
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert_eq!(body["bands"][0]["name"], "The Regulars");
    assert_eq!(body["bands"][0]["role"], "owner");
    assert_eq!(app.users.user_count().await, 1);
}

#[tokio::test]
async fn test_session_endpoint() {
    let app = TestApp::new();
    let cookie = app.login().await;

    let response = app.get("/auth/session", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["id"], SUBJECT);
    assert_eq!(body["user"]["username"], "google_12345");
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = TestApp::new();
    let cookie = app.login().await;

    let response = app.post("/auth/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cleared = set_cookie(&response);
    assert!(cleared.starts_with("bndy_session=;"));
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(json_body(response).await["success"], true);

    // The browser now sends the cleared cookie
    let response = app.get("/api/me", Some(&cookie_pair(&cleared))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Not authenticated");
}

#[tokio::test]
async fn test_protected_routes_require_cookie() {
    let app = TestApp::new();

    for path in ["/api/me", "/auth/session"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(json_body(response).await["error"], "Not authenticated");
    }
}

#[tokio::test]
async fn test_tampered_cookie_rejected_and_cleared() {
    let app = TestApp::new();
    let cookie = app.login().await;

    let mut tampered = cookie.clone();
    tampered.push_str("tampered");

    let response = app.get("/api/me", Some(&tampered)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response).contains("Max-Age=0"));
    assert_eq!(json_body(response).await["error"], "Invalid session");
}

#[tokio::test]
async fn test_expired_cookie_rejected() {
    let app = TestApp::new();
    let codec = SessionCodec::new(TEST_SESSION_SECRET).unwrap();

    let record = SessionRecord {
        user_id: SUBJECT.to_string(),
        username: None,
        email: None,
        access_token: "access".to_string(),
        id_token: "id".to_string(),
        refresh_token: None,
        issued_at: Utc::now() - Duration::days(8),
    };
    let cookie = format!("bndy_session={}", codec.sign(&record).unwrap());

    let response = app.get("/auth/session", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid session");
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_cors_allows_frontend_with_credentials() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/me")
        .header(header::ORIGIN, FRONTEND_URL)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        FRONTEND_URL
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_production_cookie_attributes() {
    let mut config = common::test_auth_config();
    config.cookie.domain = Some(".example.com".to_string());
    config.cookie.secure = true;
    let app = TestApp::with_config(config);

    let cookie = app.login().await;
    assert!(cookie.starts_with("bndy_session="));

    let state = app.begin_login().await;
    let response = app
        .get(
            &format!("/auth/callback?code=good-code&state={}", state),
            None,
        )
        .await;
    let set = set_cookie(&response);
    assert!(set.contains("Domain=.example.com"));
    assert!(set.contains("Secure"));
}
