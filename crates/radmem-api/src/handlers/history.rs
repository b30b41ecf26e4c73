//! Medical-history browser handlers.
//!
//! Every route is scoped by the `patient_id` path segment; items that
//! belong to another patient answer 403.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use radmem_core::{HistoryEntry, HistoryFileType};

use super::UploadForm;
use crate::services::{HistoryFileUpload, HistoryListing};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub path: String,
    pub items: Vec<HistoryListing>,
}

pub async fn list_items(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let path = query.path.unwrap_or_default();
    let items = state.history.list(&patient_id, &path).await?;
    Ok(Json(ListResponse {
        success: true,
        path,
        items,
    }))
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub success: bool,
    pub id: Uuid,
    pub name: String,
    pub path: String,
}

impl From<HistoryEntry> for EntryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            success: true,
            id: entry.id,
            name: entry.name,
            path: entry.path,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    /// Parent folder; empty or absent for the root.
    #[serde(default)]
    pub path: String,
}

pub async fn create_folder(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Json(req): Json<CreateFolderRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = state
        .history
        .create_folder(&patient_id, &req.path, &req.name)
        .await?;
    Ok(Json(entry.into()))
}

/// Upload a file into a history folder.
///
/// Multipart fields: `file` (required), `file_type`
/// (`scan|prescription|report|other`), `path`.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<EntryResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file()?;
    let upload = HistoryFileUpload {
        bytes: file.bytes,
        original_filename: file.filename,
        content_type: file.content_type,
        file_type: form
            .field("file_type")
            .map(|t| HistoryFileType::parse(&t))
            .unwrap_or_default(),
        parent_path: form.field("path").unwrap_or_default(),
    };
    let entry = state.history.upload_file(&patient_id, upload).await?;
    Ok(Json(entry.into()))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path((patient_id, item_id)): Path<(String, Uuid)>,
) -> Result<Response, ApiError> {
    let file = state.history.download(&patient_id, item_id).await?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(&file.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

pub async fn rename_item(
    State(state): State<AppState>,
    Path((patient_id, item_id)): Path<(String, Uuid)>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = state.history.rename(&patient_id, item_id, &req.name).await?;
    Ok(Json(entry.into()))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path((patient_id, item_id)): Path<(String, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.history.delete(&patient_id, item_id).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}
