#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use mnemo_api::{AppState, AppStateInner, auth::start_session};
use mnemo_crypto::keys::generate_key;
use mnemo_db::Database;
use mnemo_db::models::NewUser;

pub const JWT_SECRET: &str = "test-secret-for-integration-tests";

/// How a test request authenticates.
#[derive(Clone, Copy)]
pub enum Auth<'a> {
    Anonymous,
    Session(&'a str),
    Bearer(&'a str),
    Both { session: &'a str, token: &'a str },
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().expect("in-memory db"),
            jwt_secret: JWT_SECRET.into(),
            encryption_key: generate_key(),
            public_url: "http://localhost:3000".into(),
            secure_cookies: false,
            github: None,
            http: reqwest::Client::new(),
        });
        let router = mnemo_api::router(state.clone());
        Self { state, router }
    }

    /// Create a user and return its id.
    pub fn user(&self, email: &str) -> String {
        self.state
            .db
            .upsert_user(&NewUser {
                email,
                name: Some("Test User"),
                image: None,
                provider: "github",
                provider_account_id: email,
            })
            .expect("upsert user")
            .id
    }

    /// Create a user with a browser session; returns (user id, session id).
    pub fn signed_in(&self, email: &str) -> (String, String) {
        let user_id = self.user(email);
        let cookie = start_session(&self.state, &user_id).expect("start session");
        (user_id, cookie.value().to_string())
    }

    /// Issue a CLI token through the API for the given session.
    pub async fn issue_token(&self, session: &str, name: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/tokens",
                Auth::Session(session),
                Some(serde_json::json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["token"].as_str().expect("raw token").to_string()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        auth: Auth<'_>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let (session, token) = match auth {
            Auth::Anonymous => (None, None),
            Auth::Session(s) => (Some(s), None),
            Auth::Bearer(t) => (None, Some(t)),
            Auth::Both { session, token } => (Some(session), Some(token)),
        };
        if let Some(session) = session {
            builder = builder.header(header::COOKIE, format!("mnemo_session={session}"));
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
