//! Caller identity resolution.
//!
//! Handlers call one of [`require_session`], [`require_bearer`] or
//! [`require_hybrid`] with the request headers and get back an [`AuthUser`]
//! tagged with the [`AuthSource`] that proved it. Every failure is the same
//! `ApiError::Unauthorized`.

use axum::http::{HeaderMap, header};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use mnemo_types::api::TokenMeta;
use mnemo_types::models::{AuthSource, User};

use crate::auth::AppStateInner;
use crate::error::{ApiError, ApiResult};
use crate::tokens;

pub const SESSION_COOKIE: &str = "mnemo_session";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub source: AuthSource,
    /// Present for token-sourced identities.
    pub token: Option<TokenMeta>,
    /// When the presented credential stops being accepted.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn is_session(&self) -> bool {
        self.source == AuthSource::Session
    }
}

/// The raw credential from `Authorization: Bearer <jwt>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn session_id(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Browser-session lookup. `Ok(None)` means "no usable session".
pub fn session_user(state: &AppStateInner, headers: &HeaderMap) -> ApiResult<Option<AuthUser>> {
    let Some(id) = session_id(headers) else {
        return Ok(None);
    };
    let Some(session) = state.db.get_session(&id)? else {
        debug!("Unknown session cookie");
        return Ok(None);
    };

    let expires_at = session
        .expires_at
        .parse::<DateTime<Utc>>()
        .unwrap_or_default();
    if expires_at <= Utc::now() {
        debug!("Session for user {} expired", session.user_id);
        if let Err(e) = state.db.delete_session(&session.id) {
            warn!("Failed to drop expired session: {}", e);
        }
        return Ok(None);
    }

    let Some(user) = state.db.get_user_by_id(&session.user_id)? else {
        return Ok(None);
    };

    Ok(Some(AuthUser {
        user: user.into_user(),
        source: AuthSource::Session,
        token: None,
        expires_at: Some(expires_at),
    }))
}

pub fn require_session(state: &AppStateInner, headers: &HeaderMap) -> ApiResult<AuthUser> {
    session_user(state, headers)?.ok_or(ApiError::Unauthorized)
}

pub fn require_bearer(state: &AppStateInner, headers: &HeaderMap) -> ApiResult<AuthUser> {
    let raw = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    tokens::verify_token(state, raw)
}

/// Session first, then bearer token. Fails only when both do.
pub fn require_hybrid(state: &AppStateInner, headers: &HeaderMap) -> ApiResult<AuthUser> {
    if let Some(user) = session_user(state, headers)? {
        return Ok(user);
    }
    require_bearer(state, headers)
}
