//! Bulk loading of verified reference cases into the knowledge collection.
//!
//! Input is a JSON array of cases:
//!
//! ```json
//! [{"report_text": "...", "diagnosis": "...", "scan_type": "X-ray", "image_path": "cases/0001.png"}]
//! ```
//!
//! `image_path` is resolved against the images directory. Cases whose image
//! is missing are skipped; ids derive from `image_path`, so re-running a
//! load replaces cases instead of duplicating them.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use radmem_core::{
    detect_content_type, Error, KnowledgeRecord, NamedVectors, Result, VectorSlot,
};
use radmem_db::Database;
use radmem_inference::Embedder;

/// Default number of cases embedded per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// One case as it appears in the input file.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseInput {
    pub report_text: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub scan_type: Option<String>,
    pub image_path: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub indexed: usize,
    pub skipped_missing: usize,
    pub failed: usize,
}

enum CaseOutcome {
    Indexed,
    Missing,
    Failed,
}

pub struct KnowledgeIngestor {
    db: Database,
    embedder: Embedder,
    images_dir: PathBuf,
    batch_size: usize,
}

impl KnowledgeIngestor {
    pub fn new(db: Database, embedder: Embedder, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            embedder,
            images_dir: images_dir.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Parse a case file.
    pub async fn read_cases(path: &Path) -> Result<Vec<CaseInput>> {
        let raw = tokio::fs::read(path).await?;
        let cases: Vec<CaseInput> = serde_json::from_slice(&raw)?;
        Ok(cases)
    }

    /// Embed and upsert every case. Individual failures are counted, not
    /// fatal.
    pub async fn ingest(&self, cases: Vec<CaseInput>) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let total = cases.len();
        for (batch_no, batch) in cases.chunks(self.batch_size).enumerate() {
            let outcomes: Vec<CaseOutcome> = stream::iter(batch)
                .map(|case| self.ingest_case(case))
                .buffer_unordered(self.embedder.max_concurrency())
                .collect()
                .await;
            for outcome in outcomes {
                match outcome {
                    CaseOutcome::Indexed => report.indexed += 1,
                    CaseOutcome::Missing => report.skipped_missing += 1,
                    CaseOutcome::Failed => report.failed += 1,
                }
            }
            info!(
                subsystem = "ingest",
                batch = batch_no + 1,
                processed = ((batch_no + 1) * self.batch_size).min(total),
                total,
                indexed = report.indexed,
                "Batch complete"
            );
        }
        Ok(report)
    }

    async fn ingest_case(&self, case: &CaseInput) -> CaseOutcome {
        let path = self.images_dir.join(&case.image_path);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(image = %path.display(), "Image missing, skipping case");
                return CaseOutcome::Missing;
            }
            Err(e) => {
                warn!(image = %path.display(), error = %e, "Failed to read image");
                return CaseOutcome::Failed;
            }
        };
        match self.store_case(case, &bytes).await {
            Ok(()) => CaseOutcome::Indexed,
            Err(e) => {
                warn!(image = %case.image_path, error = %e, "Failed to index case");
                CaseOutcome::Failed
            }
        }
    }

    async fn store_case(&self, case: &CaseInput, bytes: &[u8]) -> Result<()> {
        if case.report_text.trim().is_empty() {
            return Err(Error::InvalidInput("report_text is empty".to_string()));
        }
        let mime = detect_content_type(bytes, "image/jpeg");
        let image = self.embedder.embed_image(bytes, &mime).await?;
        let text = self.embedder.embed_text(&case.report_text).await?;
        let record = KnowledgeRecord {
            id: KnowledgeRecord::id_for_image(&case.image_path),
            report_text: case.report_text.clone(),
            diagnosis: case.diagnosis.clone(),
            scan_type: case.scan_type.clone(),
            image_path: Some(case.image_path.clone()),
        };
        self.db
            .knowledge
            .upsert(
                &record,
                NamedVectors::new()
                    .with(VectorSlot::Image, image)
                    .with(VectorSlot::Text, text),
            )
            .await
    }
}
