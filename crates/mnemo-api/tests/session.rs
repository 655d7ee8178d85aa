mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{Auth, TestApp};

#[tokio::test]
async fn health_needs_no_credentials() {
    let app = TestApp::new();
    let (status, body) = app.request(Method::GET, "/api/health", Auth::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "data": { "status": "ok" } }));
}

#[tokio::test]
async fn current_session_reports_the_user() {
    let app = TestApp::new();
    let (user_id, session) = app.signed_in("ada@example.com");

    let (status, body) = app.request(Method::GET, "/api/auth/session", Auth::Session(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["id"], user_id.as_str());
    assert!(body["data"]["expiresAt"].is_string());

    let (status, body) = app.request(Method::GET, "/api/auth/session", Auth::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "success": false, "error": "Unauthorized" }));
}

#[tokio::test]
async fn signout_ends_the_session() {
    let app = TestApp::new();
    let (_, session) = app.signed_in("ada@example.com");

    let (status, body) = app.request(Method::POST, "/api/auth/signout", Auth::Session(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.request(Method::GET, "/api/folders", Auth::Session(&session), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_session_is_rejected() {
    let app = TestApp::new();
    let user_id = app.user("ada@example.com");
    app.state
        .db
        .create_session("stale", &user_id, Utc::now() - Duration::minutes(1))
        .unwrap();

    let (status, _) = app.request(Method::GET, "/api/folders", Auth::Session("stale"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.state.db.get_session("stale").unwrap().is_none());
}

#[tokio::test]
async fn unknown_session_falls_back_to_bearer() {
    let app = TestApp::new();
    let (user_id, session) = app.signed_in("ada@example.com");
    let token = app.issue_token(&session, "cli").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/folders",
            Auth::Both { session: "bogus", token: &token },
            Some(json!({ "name": "Ops" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["userId"], user_id.as_str());
}

#[tokio::test]
async fn sign_in_is_unavailable_without_a_provider() {
    let app = TestApp::new();
    let (status, body) = app
        .request(Method::GET, "/api/auth/signin/github", Auth::Anonymous, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn session_wins_when_both_credentials_are_sent() {
    let app = TestApp::new();
    let (_, session) = app.signed_in("ada@example.com");
    let token = app.issue_token(&session, "cli").await;

    // A token alone may create outside a folder; a session may not.
    let (status, body) = app
        .request(
            Method::POST,
            "/api/mnemonics",
            Auth::Both { session: &session, token: &token },
            Some(json!({ "name": "deploy", "commands": [{ "command": "make" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "folderId is required");
}
