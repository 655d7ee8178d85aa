use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use tracing::{info, warn};

use mnemo_crypto::keys::random_hex;
use mnemo_db::Database;
use mnemo_db::models::NewUser;
use mnemo_types::api::{ApiResponse, SessionInfo};

use crate::error::{ApiError, ApiResult};
use crate::middleware::{SESSION_COOKIE, require_session, session_id};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub encryption_key: [u8; 32],
    /// Externally visible base URL, used to build OAuth redirect URIs.
    pub public_url: String,
    pub secure_cookies: bool,
    pub github: Option<GithubOAuth>,
    pub http: reqwest::Client,
}

pub const SESSION_TTL_DAYS: i64 = 30;

const OAUTH_STATE_COOKIE: &str = "mnemo_oauth_state";
const GITHUB_PROVIDER: &str = "github";

/// GitHub OAuth app credentials and endpoints.
#[derive(Debug, Clone)]
pub struct GithubOAuth {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_url: String,
}

impl GithubOAuth {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorize_url: "https://github.com/login/oauth/authorize".into(),
            token_url: "https://github.com/login/oauth/access_token".into(),
            api_url: "https://api.github.com".into(),
        }
    }
}

impl AppStateInner {
    fn callback_url(&self) -> String {
        format!(
            "{}/api/auth/callback/github",
            self.public_url.trim_end_matches('/')
        )
    }

    fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .build()
    }
}

/// Create a browser session for `user_id` and the cookie that carries it.
pub fn start_session(state: &AppStateInner, user_id: &str) -> ApiResult<Cookie<'static>> {
    let id = random_hex(32);
    let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
    state.db.create_session(&id, user_id, expires_at)?;
    Ok(state.cookie(SESSION_COOKIE, id))
}

// -- GitHub sign-in --

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

struct GithubProfile {
    account_id: String,
    email: String,
    name: Option<String>,
    image: Option<String>,
}

/// GET /api/auth/signin/github
pub async fn github_signin(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    let github = state.github.as_ref().ok_or(ApiError::NotFound("Sign-in provider"))?;

    let csrf = random_hex(16);
    let url = reqwest::Url::parse_with_params(
        &github.authorize_url,
        &[
            ("client_id", github.client_id.as_str()),
            ("redirect_uri", state.callback_url().as_str()),
            ("scope", "read:user user:email"),
            ("state", csrf.as_str()),
        ],
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    let jar = jar.add(state.cookie(OAUTH_STATE_COOKIE, csrf));
    Ok((jar, Redirect::to(url.as_str())))
}

/// GET /api/auth/callback/github
pub async fn github_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<impl IntoResponse> {
    let github = state.github.as_ref().ok_or(ApiError::NotFound("Sign-in provider"))?;

    if let Some(error) = &query.error {
        warn!("GitHub sign-in denied: {}", error);
        return Err(ApiError::Unauthorized);
    }

    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let (Some(code), Some(returned)) = (query.code.as_deref(), query.state.as_deref()) else {
        return Err(ApiError::Unauthorized);
    };
    if expected.as_deref() != Some(returned) {
        warn!("GitHub sign-in state mismatch");
        return Err(ApiError::Unauthorized);
    }

    let profile = fetch_github_profile(&state, github, code).await.map_err(|e| {
        warn!("GitHub sign-in failed: {:#}", e);
        ApiError::Unauthorized
    })?;

    let user = state.db.upsert_user(&NewUser {
        email: &profile.email,
        name: profile.name.as_deref(),
        image: profile.image.as_deref(),
        provider: GITHUB_PROVIDER,
        provider_account_id: &profile.account_id,
    })?;
    let session = start_session(&state, &user.id)?;
    info!("User {} signed in via GitHub", user.id);

    let jar = jar
        .remove(Cookie::build(OAUTH_STATE_COOKIE).path("/"))
        .add(session);
    Ok((jar, Redirect::to("/")))
}

async fn fetch_github_profile(
    state: &AppStateInner,
    github: &GithubOAuth,
    code: &str,
) -> anyhow::Result<GithubProfile> {
    let redirect_uri = state.callback_url();
    let token: AccessTokenResponse = state
        .http
        .post(&github.token_url)
        .header(ACCEPT, "application/json")
        .form(&[
            ("client_id", github.client_id.as_str()),
            ("client_secret", github.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let access_token = token
        .access_token
        .ok_or_else(|| anyhow::anyhow!("No access token: {}", token.error.unwrap_or_default()))?;

    let api = github.api_url.trim_end_matches('/');
    let user: GithubUser = state
        .http
        .get(format!("{}/user", api))
        .bearer_auth(&access_token)
        .header(USER_AGENT, "mnemo")
        .header(ACCEPT, "application/vnd.github+json")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    // Private profile emails are only visible through /user/emails.
    let email = match user.email {
        Some(email) => email,
        None => {
            let emails: Vec<GithubEmail> = state
                .http
                .get(format!("{}/user/emails", api))
                .bearer_auth(&access_token)
                .header(USER_AGENT, "mnemo")
                .header(ACCEPT, "application/vnd.github+json")
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            emails
                .into_iter()
                .find(|e| e.primary && e.verified)
                .map(|e| e.email)
                .ok_or_else(|| anyhow::anyhow!("GitHub account {} has no verified email", user.login))?
        }
    };

    Ok(GithubProfile {
        account_id: user.id.to_string(),
        email,
        name: user.name.or(Some(user.login)),
        image: user.avatar_url,
    })
}

// -- Session endpoints --

/// GET /api/auth/session
pub async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<SessionInfo>>> {
    let auth = require_session(&state, &headers)?;
    Ok(Json(ApiResponse::ok(SessionInfo {
        expires_at: auth.expires_at.unwrap_or_default(),
        user: auth.user,
    })))
}

/// POST /api/auth/signout
pub async fn signout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    if let Some(id) = session_id(&headers) {
        state.db.delete_session(&id)?;
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Json(ApiResponse::ok(()))))
}
