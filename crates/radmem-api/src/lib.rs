//! # radmem-api
//!
//! HTTP surface for radmem: scan upload, intent-routed chat, scan analysis,
//! the patient timeline, saved transcripts and the medical-history browser.
//!
//! The router is built here so tests can drive it in-process; `main.rs`
//! only wires configuration, backends and the listener.

pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use radmem_core::{defaults, GenerationBackend};
use radmem_db::{Database, FilesystemBackend};
use radmem_inference::Embedder;
use radmem_search::{ChatPipeline, ScanAnalyzer};

pub use config::{AppConfig, StoreBackend};
pub use error::ApiError;
use services::{HistoryService, IngestionService, ScanService};

/// Shared handler state. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub pipeline: ChatPipeline,
    pub analyzer: ScanAnalyzer,
    pub ingestion: IngestionService,
    pub scans: ScanService,
    pub history: HistoryService,
}

impl AppState {
    /// Wire every service over one store, embedder and generator.
    pub fn new(
        db: Database,
        embedder: Embedder,
        generator: Arc<dyn GenerationBackend>,
        uploads: FilesystemBackend,
        history_files: FilesystemBackend,
    ) -> Self {
        Self {
            pipeline: ChatPipeline::new(db.clone(), embedder.clone(), generator.clone()),
            analyzer: ScanAnalyzer::new(db.clone(), generator),
            ingestion: IngestionService::new(db.clone(), embedder.clone(), Arc::new(uploads)),
            scans: ScanService::new(db.clone(), embedder.clone()),
            history: HistoryService::new(db.clone(), embedder, Arc::new(history_files)),
            db,
        }
    }
}

/// Request ID generator using UUIDv7 for time-ordered tracing.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Parse a comma-separated CORS origin list. Empty input yields the local
/// development origins; invalid entries are logged and skipped.
pub fn parse_allowed_origins(raw: &str) -> Vec<HeaderValue> {
    if raw.trim().is_empty() {
        return vec![
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://localhost:8080"),
            HeaderValue::from_static("http://localhost:3000"),
        ];
    }

    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the full router with middleware applied.
pub fn router(state: AppState, origins: Vec<HeaderValue>, body_limit: usize) -> Router {
    use handlers::{chat, history, patients, scans};

    Router::new()
        .route("/health", get(health_check))
        // Scans
        .route("/upload-scan", post(scans::upload_scan))
        .route("/analyze-scan", post(scans::analyze_scan))
        .route("/patient-history", post(scans::patient_history))
        .route("/update-scan-report", post(scans::update_scan_report))
        .route("/uploads/:filename", get(scans::serve_upload))
        // Chat
        .route("/chat", post(chat::chat))
        .route("/save-chat", post(chat::save_chat))
        .route("/get-chat-history", post(chat::get_chat_history))
        // Medical history
        .route("/medical-history/:patient_id", get(history::list_items))
        .route("/medical-history/:patient_id/folder", post(history::create_folder))
        .route("/medical-history/:patient_id/upload", post(history::upload_file))
        .route(
            "/medical-history/:patient_id/download/:item_id",
            get(history::download_file),
        )
        .route(
            "/medical-history/:patient_id/item/:item_id/rename",
            patch(history::rename_item),
        )
        .route(
            "/medical-history/:patient_id/item/:item_id",
            delete(history::delete_item),
        )
        // Patients
        .route("/patients/register", post(patients::register))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(Duration::from_secs(defaults::CORS_MAX_AGE_SECS)),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
