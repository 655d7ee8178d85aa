use axum::{Json, extract::State, http::HeaderMap};
use serde_json::{Value, json};

use mnemo_types::api::{ApiResponse, WhoAmI};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::require_bearer;

/// GET /api/me: who the presented CLI token belongs to.
pub async fn whoami(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<WhoAmI>>> {
    let auth = require_bearer(&state, &headers)?;
    let token = auth.token.ok_or(ApiError::Unauthorized)?;
    Ok(Json(ApiResponse::ok(WhoAmI {
        user: auth.user,
        token,
    })))
}

/// GET /api/health
pub async fn health() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::ok(json!({ "status": "ok" })))
}
