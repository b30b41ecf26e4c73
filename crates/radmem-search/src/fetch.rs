//! Fetch one of the patient's own scans by semantic match.
//!
//! No generation call: the reply is a summary of the best hit and its
//! confidence is the raw similarity score.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument};

use radmem_core::{defaults, ImageRef, Intent, Result, ScanRecord, VectorSlot};
use radmem_db::Database;
use radmem_inference::Embedder;

use crate::strategy::{ChatContext, Evidence, RetrievalConfig, RetrievalStrategy};

pub const NO_MATCH_MESSAGE: &str =
    "I couldn't find any of your scans matching that request. Try describing the scan type or date.";

#[derive(Clone)]
pub struct FetchStrategy {
    db: Database,
    embedder: Embedder,
    config: RetrievalConfig,
}

impl FetchStrategy {
    pub fn new(db: Database, embedder: Embedder, config: RetrievalConfig) -> Self {
        Self {
            db,
            embedder,
            config,
        }
    }
}

/// Markdown summary of a fetched scan.
pub fn summarize(scan: &ScanRecord) -> String {
    format!(
        "**{} scan** from {}\n\n{}",
        scan.scan_type, scan.display_date, scan.report_text
    )
}

/// Structured echo of a scan for the client.
pub fn scan_data(scan: &ScanRecord) -> serde_json::Value {
    json!({
        "scan_id": scan.scan_id,
        "scan_type": scan.scan_type,
        "scan_date": scan.scan_date,
        "display_date": scan.display_date,
        "report_text": scan.report_text,
        "status": scan.status,
        "file_url": scan.file_url,
    })
}

#[async_trait]
impl RetrievalStrategy for FetchStrategy {
    fn intent(&self) -> Intent {
        Intent::Fetch
    }

    #[instrument(
        skip(self, ctx),
        fields(subsystem = "search", component = "fetch", op = "gather", patient_id = %ctx.patient_id)
    )]
    async fn gather(&self, ctx: &ChatContext) -> Result<Evidence> {
        let query = self.embedder.embed_text(&ctx.message).await?;
        let hits = self
            .db
            .scans
            .search_for_patient(
                &ctx.patient_id,
                VectorSlot::Text,
                &query,
                None,
                self.config.fetch_top_k,
            )
            .await?;
        debug!(result_count = hits.len(), "Patient scans matched");

        let Some(best) = hits.into_iter().next() else {
            return Ok(Evidence::direct(
                NO_MATCH_MESSAGE,
                defaults::CONFIDENCE_GUIDANCE,
            ));
        };

        let scan = best.record;
        Ok(Evidence::direct(summarize(&scan), best.score)
            .with_images(vec![ImageRef::for_scan(&scan)])
            .with_scan_data(scan_data(&scan)))
    }
}
