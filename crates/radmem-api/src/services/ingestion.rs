//! Scan ingestion: store the image, embed it, persist the scan record.
//!
//! The declared content type is checked before any bytes touch storage. Once
//! the file is written, every later failure deletes it again so a failed
//! upload never leaves an orphaned image behind.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use radmem_core::{
    defaults, detect_content_type, ensure_image_content_type, new_record_id, upload_extension,
    Error, NamedVectors, Result, ScanRecord, ScanStatus, VectorSlot,
};
use radmem_db::{compute_content_hash, Database, FilesystemBackend, StorageBackend};
use radmem_inference::Embedder;

/// A scan as received from the upload form.
#[derive(Debug, Clone)]
pub struct ScanUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub original_filename: String,
    pub patient_id: String,
    pub scan_type: Option<String>,
    pub notes: Option<String>,
}

/// Bytes of a previously uploaded scan.
#[derive(Debug, Clone)]
pub struct ServedFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone)]
pub struct IngestionService {
    db: Database,
    embedder: Embedder,
    storage: Arc<FilesystemBackend>,
}

impl IngestionService {
    pub fn new(db: Database, embedder: Embedder, storage: Arc<FilesystemBackend>) -> Self {
        Self {
            db,
            embedder,
            storage,
        }
    }

    /// Store, embed and record one scan.
    #[instrument(
        skip(self, upload),
        fields(
            subsystem = "api",
            component = "ingestion",
            op = "upload_scan",
            patient_id = %upload.patient_id,
            size = upload.bytes.len()
        )
    )]
    pub async fn upload(&self, upload: ScanUpload) -> Result<ScanRecord> {
        ensure_image_content_type(&upload.content_type)?;
        if upload.patient_id.trim().is_empty() {
            return Err(Error::InvalidInput("patient_id is required".to_string()));
        }
        if upload.bytes.is_empty() {
            return Err(Error::InvalidInput("Uploaded file is empty".to_string()));
        }

        let scan_id = new_record_id();
        let filename = format!("{}{}", scan_id, upload_extension(&upload.original_filename));
        self.storage.write(&filename, &upload.bytes).await?;

        match self.index(scan_id, &filename, &upload).await {
            Ok(scan) => {
                info!(scan_id = %scan.scan_id, filename = %filename, "Scan uploaded and indexed");
                Ok(scan)
            }
            Err(e) => {
                warn!(filename = %filename, error = %e, "Upload failed, removing stored file");
                if let Err(cleanup) = self.storage.delete(&filename).await {
                    warn!(filename = %filename, error = %cleanup, "Failed to remove stored file");
                }
                Err(e)
            }
        }
    }

    async fn index(&self, scan_id: Uuid, filename: &str, upload: &ScanUpload) -> Result<ScanRecord> {
        // Embed what actually landed on disk.
        let stored = self.storage.read(filename).await?;
        let content_type = detect_content_type(&stored, &upload.content_type);

        let scan_type = non_empty(upload.scan_type.as_deref())
            .unwrap_or(defaults::DEFAULT_SCAN_TYPE)
            .to_string();
        let report_text = non_empty(upload.notes.as_deref())
            .unwrap_or(defaults::PENDING_REPORT)
            .to_string();

        let image_vector = self.embedder.embed_image(&stored, &content_type).await?;
        let text_vector = self
            .embedder
            .embed_text(&ScanRecord::embedding_text(&scan_type, &report_text))
            .await?;

        let now = Utc::now();
        let (scan_date, display_date) = ScanRecord::date_buckets(&now);
        let scan = ScanRecord {
            scan_id,
            patient_id: upload.patient_id.trim().to_string(),
            scan_type,
            report_text,
            upload_timestamp: now,
            scan_date,
            display_date,
            filename: filename.to_string(),
            original_filename: upload.original_filename.clone(),
            file_path: self.storage.base_path().join(filename).display().to_string(),
            file_url: format!("{}/{}", defaults::UPLOAD_URL_PREFIX, filename),
            file_size: stored.len() as u64,
            content_type,
            content_hash: Some(compute_content_hash(&stored)),
            status: ScanStatus::Pending,
            has_chat_history: false,
        };

        let vectors = NamedVectors::new()
            .with(VectorSlot::Image, image_vector)
            .with(VectorSlot::Text, text_vector);
        self.db.scans.create(&scan, vectors).await?;
        Ok(scan)
    }

    /// Bytes and detected type of an uploaded scan, by stored filename.
    pub async fn serve(&self, filename: &str) -> Result<ServedFile> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.starts_with('.')
        {
            return Err(Error::InvalidInput(format!("Invalid filename: {}", filename)));
        }
        let bytes = self.storage.read(filename).await?;
        let content_type = detect_content_type(&bytes, "application/octet-stream");
        Ok(ServedFile {
            bytes,
            content_type,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
