use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use mnemo_db::models::FolderRow;
use mnemo_types::api::{ApiResponse, CreateFolderRequest, FolderDeleted, UpdateFolderRequest};
use mnemo_types::models::Folder;
use mnemo_types::validate::validate_label;

use crate::auth::{AppState, AppStateInner};
use crate::error::{ApiError, ApiResult, JsonBody};
use crate::middleware::{AuthUser, require_hybrid};

const DUPLICATE_NAME: &str = "A folder with this name already exists";

/// Resolve a folder referenced from a request body or query string.
/// Absent is 404; someone else's is 403.
pub fn owned_folder(state: &AppStateInner, auth: &AuthUser, folder_id: &str) -> ApiResult<FolderRow> {
    let folder = state
        .db
        .get_folder(folder_id)?
        .ok_or(ApiError::NotFound("Folder"))?;
    if folder.user_id != auth.id() {
        return Err(ApiError::Forbidden("Folder does not belong to you".into()));
    }
    Ok(folder)
}

/// GET /api/folders
pub async fn list_folders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<Vec<Folder>>>> {
    let auth = require_hybrid(&state, &headers)?;
    let folders = state
        .db
        .list_folders(auth.id())?
        .into_iter()
        .map(FolderRow::into_folder)
        .collect();
    Ok(Json(ApiResponse::ok(folders)))
}

/// POST /api/folders
pub async fn create_folder(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<CreateFolderRequest>,
) -> ApiResult<impl IntoResponse> {
    let auth = require_hybrid(&state, &headers)?;
    let Json(req) = body?;
    let name = validate_label("name", &req.name)?;

    if state.db.folder_name_exists(auth.id(), &name, None)? {
        return Err(ApiError::Conflict(DUPLICATE_NAME.into()));
    }

    let id = Uuid::new_v4().to_string();
    let folder = state
        .db
        .create_folder(&id, auth.id(), &name)
        .map_err(|e| ApiError::from_write(e, DUPLICATE_NAME))?;

    info!("Folder '{}' created by {}", folder.name, auth.id());
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(folder.into_folder()))))
}

/// PUT /api/folders/{id}
pub async fn update_folder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: JsonBody<UpdateFolderRequest>,
) -> ApiResult<Json<ApiResponse<Folder>>> {
    let auth = require_hybrid(&state, &headers)?;
    let Json(req) = body?;
    let name = validate_label("name", &req.name)?;

    if state.db.folder_name_exists(auth.id(), &name, Some(&id))? {
        return Err(ApiError::Conflict(DUPLICATE_NAME.into()));
    }

    let folder = state
        .db
        .rename_folder(&id, auth.id(), &name)
        .map_err(|e| ApiError::from_write(e, DUPLICATE_NAME))?
        .ok_or(ApiError::NotFound("Folder"))?;
    Ok(Json(ApiResponse::ok(folder.into_folder())))
}

/// DELETE /api/folders/{id}
///
/// Removes the folder and every mnemonic filed under it.
pub async fn delete_folder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<FolderDeleted>>> {
    let auth = require_hybrid(&state, &headers)?;
    let deleted_mnemonics = state
        .db
        .delete_folder(&id, auth.id())?
        .ok_or(ApiError::NotFound("Folder"))?;

    info!(
        "Folder {} deleted by {} ({} mnemonics removed)",
        id,
        auth.id(),
        deleted_mnemonics
    );
    Ok(Json(ApiResponse::ok(FolderDeleted { deleted_mnemonics })))
}
