//! Scan upload, analysis, timeline and file serving.

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use radmem_core::ScanStatus;
use radmem_db::ScanUpdate;
use radmem_search::ScanAnalysis;

use super::UploadForm;
use crate::services::{ScanUpload, TimelineEntry};
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct UploadScanResponse {
    pub success: bool,
    pub scan_id: Uuid,
    pub filename: String,
    pub upload_timestamp: DateTime<Utc>,
    pub message: String,
}

/// Upload a scan image.
///
/// Multipart fields: `file` (required, `image/*`), `patient_id` (required),
/// `scan_type`, `notes`.
pub async fn upload_scan(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadScanResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file()?;
    let patient_id = form
        .field("patient_id")
        .ok_or_else(|| ApiError::BadRequest("patient_id is required".to_string()))?;

    let scan = state
        .ingestion
        .upload(ScanUpload {
            content_type: file
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes: file.bytes,
            original_filename: file.filename,
            patient_id,
            scan_type: form.field("scan_type"),
            notes: form.field("notes"),
        })
        .await?;

    Ok(Json(UploadScanResponse {
        success: true,
        scan_id: scan.scan_id,
        filename: scan.filename,
        upload_timestamp: scan.upload_timestamp,
        message: "Scan uploaded and indexed successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeScanRequest {
    pub scan_id: Uuid,
}

pub async fn analyze_scan(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeScanRequest>,
) -> Result<Json<ScanAnalysis>, ApiError> {
    Ok(Json(state.analyzer.analyze(req.scan_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct PatientHistoryRequest {
    pub patient_id: String,
}

#[derive(Debug, Serialize)]
pub struct PatientHistoryResponse {
    pub success: bool,
    pub scans: Vec<TimelineEntry>,
}

/// The patient's scans, newest first.
pub async fn patient_history(
    State(state): State<AppState>,
    Json(req): Json<PatientHistoryRequest>,
) -> Result<Json<PatientHistoryResponse>, ApiError> {
    let scans = state.scans.patient_history(&req.patient_id).await?;
    Ok(Json(PatientHistoryResponse {
        success: true,
        scans,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateScanReportRequest {
    pub scan_id: Uuid,
    pub report_text: Option<String>,
    pub status: Option<String>,
}

pub async fn update_scan_report(
    State(state): State<AppState>,
    Json(req): Json<UpdateScanReportRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = req
        .status
        .as_deref()
        .map(str::parse::<ScanStatus>)
        .transpose()?;
    state
        .scans
        .update_report(
            req.scan_id,
            ScanUpdate {
                report_text: req.report_text,
                status,
            },
        )
        .await?;
    Ok(Json(json!({ "success": true, "scan_id": req.scan_id })))
}

/// Serve an uploaded scan image by its stored filename.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let file = state.ingestion.serve(&filename).await?;
    Ok(([(header::CONTENT_TYPE, file.content_type)], file.bytes))
}
