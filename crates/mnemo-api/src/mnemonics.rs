//! Mnemonic CRUD.
//!
//! Mnemonics belong to a user and optionally to one of that user's folders.
//! Browser sessions always work inside a folder; CLI tokens may leave the
//! folder out entirely.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use mnemo_db::models::MnemonicRow;
use mnemo_types::api::{ApiResponse, CreateMnemonicRequest, MnemonicQuery, UpdateMnemonicRequest};
use mnemo_types::models::Mnemonic;
use mnemo_types::validate::{normalize_commands, validate_mnemonic_name};

use crate::auth::{AppState, AppStateInner};
use crate::error::{ApiError, ApiResult, JsonBody};
use crate::folders::owned_folder;
use crate::middleware::{AuthUser, require_bearer, require_hybrid};

const DUPLICATE_NAME: &str = "A mnemonic with this name already exists";

/// Rows whose stored commands cannot be read are logged and left out.
fn to_models(rows: Vec<MnemonicRow>) -> Vec<Mnemonic> {
    rows.into_iter()
        .filter_map(|row| match row.into_mnemonic() {
            Ok(mnemonic) => Some(mnemonic),
            Err(e) => {
                warn!("Skipping unreadable mnemonic: {:#}", e);
                None
            }
        })
        .collect()
}

/// Session-sourced requests must prove the mnemonic's folder is theirs too.
fn check_folder_scope(state: &AppStateInner, auth: &AuthUser, row: &MnemonicRow) -> ApiResult<()> {
    if !auth.is_session() {
        return Ok(());
    }
    if let Some(folder_id) = row.folder_id.as_deref() {
        owned_folder(state, auth, folder_id)?;
    }
    Ok(())
}

/// The folder a list/create request targets. Required for sessions,
/// optional for tokens; must be the caller's either way.
fn target_folder(
    state: &AppStateInner,
    auth: &AuthUser,
    folder_id: Option<String>,
) -> ApiResult<Option<String>> {
    match folder_id.filter(|id| !id.is_empty()) {
        Some(id) => {
            owned_folder(state, auth, &id)?;
            Ok(Some(id))
        }
        None if auth.is_session() => Err(ApiError::validation("folderId is required")),
        None => Ok(None),
    }
}

/// GET /api/mnemonics?folderId=…
pub async fn list_mnemonics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<MnemonicQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Mnemonic>>>> {
    let auth = require_hybrid(&state, &headers)?;

    let folder_id = target_folder(&state, &auth, query.folder_id)?;
    let rows = state.db.list_mnemonics(auth.id(), folder_id.as_deref())?;
    Ok(Json(ApiResponse::ok(to_models(rows))))
}

/// POST /api/mnemonics
pub async fn create_mnemonic(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<CreateMnemonicRequest>,
) -> ApiResult<impl IntoResponse> {
    let auth = require_hybrid(&state, &headers)?;
    let Json(req) = body?;

    validate_mnemonic_name(&req.name)?;
    let commands = normalize_commands(&req.commands)?;

    let folder_id = target_folder(&state, &auth, req.folder_id)?;

    if state.db.mnemonic_name_exists(auth.id(), &req.name, None)? {
        return Err(ApiError::Conflict(DUPLICATE_NAME.into()));
    }

    let id = Uuid::new_v4().to_string();
    let row = state
        .db
        .create_mnemonic(&id, auth.id(), folder_id.as_deref(), &req.name, &commands)
        .map_err(|e| ApiError::from_write(e, DUPLICATE_NAME))?;

    info!(
        "Mnemonic '{}' created by {} ({} commands, via {:?})",
        row.name,
        auth.id(),
        commands.len(),
        auth.source
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(row.into_mnemonic()?))))
}

/// PUT /api/mnemonics/{id}
///
/// Replaces name and commands wholesale; `folderId`, when given, moves it.
pub async fn update_mnemonic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: JsonBody<UpdateMnemonicRequest>,
) -> ApiResult<Json<ApiResponse<Mnemonic>>> {
    let auth = require_hybrid(&state, &headers)?;
    let Json(req) = body?;

    let existing = state
        .db
        .get_mnemonic(&id, auth.id())?
        .ok_or(ApiError::NotFound("Mnemonic"))?;
    check_folder_scope(&state, &auth, &existing)?;

    validate_mnemonic_name(&req.name)?;
    let commands = normalize_commands(&req.commands)?;

    let folder_id = req.folder_id.filter(|id| !id.is_empty());
    if let Some(folder_id) = folder_id.as_deref() {
        owned_folder(&state, &auth, folder_id)?;
    }

    if state.db.mnemonic_name_exists(auth.id(), &req.name, Some(&id))? {
        return Err(ApiError::Conflict(DUPLICATE_NAME.into()));
    }

    let row = state
        .db
        .update_mnemonic(&id, auth.id(), folder_id.as_deref(), &req.name, &commands)
        .map_err(|e| ApiError::from_write(e, DUPLICATE_NAME))?
        .ok_or(ApiError::NotFound("Mnemonic"))?;
    Ok(Json(ApiResponse::ok(row.into_mnemonic()?)))
}

/// DELETE /api/mnemonics/{id}
pub async fn delete_mnemonic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<()>>> {
    let auth = require_hybrid(&state, &headers)?;

    let existing = state
        .db
        .get_mnemonic(&id, auth.id())?
        .ok_or(ApiError::NotFound("Mnemonic"))?;
    check_folder_scope(&state, &auth, &existing)?;

    if !state.db.delete_mnemonic(&id, auth.id())? {
        return Err(ApiError::NotFound("Mnemonic"));
    }
    info!("Mnemonic {} deleted by {}", id, auth.id());
    Ok(Json(ApiResponse::ok(())))
}

/// GET /api/mnemonics/{id}/edit
///
/// The mnemonic as the edit form wants it: never without a command row.
pub async fn get_mnemonic_for_editing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<Mnemonic>>> {
    let auth = require_hybrid(&state, &headers)?;

    let row = state
        .db
        .get_mnemonic(&id, auth.id())?
        .ok_or(ApiError::NotFound("Mnemonic"))?;
    check_folder_scope(&state, &auth, &row)?;
    Ok(Json(ApiResponse::ok(row.into_editable()?)))
}

/// GET /api/mnemonics/{name} and GET /api/mnemonics/name/{name}
///
/// What the CLI calls to fetch the commands it is about to run.
pub async fn get_mnemonic_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<Mnemonic>>> {
    let auth = require_bearer(&state, &headers)?;
    let row = state
        .db
        .get_mnemonic_by_name(auth.id(), &name)?
        .ok_or(ApiError::NotFound("Mnemonic"))?;
    Ok(Json(ApiResponse::ok(row.into_mnemonic()?)))
}
