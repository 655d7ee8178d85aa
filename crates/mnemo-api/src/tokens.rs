//! CLI bearer tokens: issue, verify, list, rename, revoke.
//!
//! A token is an HS256 JWT carrying `{userId, email, tokenId}` with a 30-day
//! expiry. Only its AES-GCM encryption is stored. A token is accepted when the
//! signature and expiry check out, a record with its `tokenId` still exists
//! (revocation deletes it), and the stored copy decrypts to the exact
//! presented string.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{debug, info, warn};
use uuid::Uuid;

use mnemo_crypto::keys::random_hex;
use mnemo_crypto::{decrypt_token, encrypt_token};
use mnemo_db::queries::NewToken;
use mnemo_types::api::{
    ApiResponse, CreateTokenRequest, IssuedToken, TokenClaims, TokenMeta, UpdateTokenRequest,
};
use mnemo_types::models::{AuthSource, TokenInfo, User};
use mnemo_types::validate::validate_label;

use crate::auth::{AppState, AppStateInner};
use crate::error::{ApiError, ApiResult, JsonBody};
use crate::middleware::{AuthUser, require_session};

pub const TOKEN_TTL_DAYS: i64 = 30;

const DUPLICATE_NAME: &str = "A token with this name already exists";

/// Issue a new token for `user`. The returned `token` is the only time the
/// raw credential is visible.
pub fn issue_token(state: &AppStateInner, user: &User, name: &str) -> ApiResult<IssuedToken> {
    let name = validate_label("name", name)?;

    if state.db.token_name_exists(&user.id, &name, None)? {
        return Err(ApiError::Conflict(DUPLICATE_NAME.into()));
    }

    let token_id = random_hex(32);
    let now = Utc::now();
    let claims = TokenClaims {
        user_id: user.id.clone(),
        email: user.email.clone(),
        token_id: token_id.clone(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;
    let hashed_token = encrypt_token(&state.encryption_key, &token)?;

    let id = Uuid::new_v4().to_string();
    let row = state
        .db
        .create_token(&NewToken {
            id: &id,
            user_id: &user.id,
            name: &name,
            token_id: &token_id,
            hashed_token: &hashed_token,
        })
        .map_err(|e| ApiError::from_write(e, DUPLICATE_NAME))?;

    info!("Issued token '{}' for user {}", row.name, user.id);
    let info = row.into_info();
    Ok(IssuedToken {
        id: info.id,
        name: info.name,
        token,
        created_at: info.created_at,
    })
}

/// Verify a presented bearer token and record its use.
pub fn verify_token(state: &AppStateInner, raw: &str) -> ApiResult<AuthUser> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let claims = decode::<TokenClaims>(
        raw,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Bearer token rejected: {}", e);
        ApiError::Unauthorized
    })?
    .claims;

    let Some(record) = state.db.find_token(&claims.user_id, &claims.token_id)? else {
        debug!("Bearer token {} has been revoked", claims.token_id);
        return Err(ApiError::Unauthorized);
    };

    let stored = decrypt_token(&state.encryption_key, &record.hashed_token).map_err(|e| {
        warn!("Stored token {} could not be decrypted: {}", record.id, e);
        ApiError::Unauthorized
    })?;
    if stored.as_bytes() != raw.as_bytes() {
        debug!("Bearer token does not match stored token {}", record.id);
        return Err(ApiError::Unauthorized);
    }

    let Some(user) = state.db.get_user_by_id(&claims.user_id)? else {
        debug!("Bearer token owner {} no longer exists", claims.user_id);
        return Err(ApiError::Unauthorized);
    };

    let now = Utc::now();
    if let Err(e) = state.db.touch_token(&record.id, now) {
        warn!("Failed to update last-used for token {}: {}", record.id, e);
    }

    Ok(AuthUser {
        user: user.into_user(),
        source: AuthSource::Token,
        token: Some(TokenMeta {
            name: record.name,
            last_used: Some(now),
        }),
        expires_at: DateTime::<Utc>::from_timestamp(claims.exp as i64, 0),
    })
}

// -- Handlers --

/// POST /api/tokens
pub async fn create_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<CreateTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let auth = require_session(&state, &headers)?;
    let Json(req) = body?;
    let issued = issue_token(&state, &auth.user, &req.name)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(issued))))
}

/// GET /api/tokens
pub async fn list_tokens(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<Vec<TokenInfo>>>> {
    let auth = require_session(&state, &headers)?;
    let tokens = state
        .db
        .list_tokens(auth.id())?
        .into_iter()
        .map(|row| row.into_info())
        .collect();
    Ok(Json(ApiResponse::ok(tokens)))
}

/// PUT /api/tokens/{id}
pub async fn update_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: JsonBody<UpdateTokenRequest>,
) -> ApiResult<Json<ApiResponse<TokenInfo>>> {
    let auth = require_session(&state, &headers)?;
    let Json(req) = body?;
    let name = validate_label("name", &req.name)?;

    if state.db.token_name_exists(auth.id(), &name, Some(&id))? {
        return Err(ApiError::Conflict(DUPLICATE_NAME.into()));
    }

    let row = state
        .db
        .rename_token(&id, auth.id(), &name)
        .map_err(|e| ApiError::from_write(e, DUPLICATE_NAME))?
        .ok_or(ApiError::NotFound("Token"))?;
    Ok(Json(ApiResponse::ok(row.into_info())))
}

/// DELETE /api/tokens/{id}
pub async fn revoke_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<()>>> {
    let auth = require_session(&state, &headers)?;
    if !state.db.delete_token(&id, auth.id())? {
        return Err(ApiError::NotFound("Token"));
    }
    info!("Revoked token {} for user {}", id, auth.id());
    Ok(Json(ApiResponse::ok(())))
}
