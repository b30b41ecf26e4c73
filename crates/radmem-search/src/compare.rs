//! Compare the current scan with the patient's best-matching other scan.
//!
//! The prior scan is chosen by semantic match of the question against the
//! patient's other scans' text vectors, not by date.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument};

use radmem_core::{defaults, Error, ImageRef, Intent, Result, ScanRecord, VectorSlot};
use radmem_db::{Database, Stored};
use radmem_inference::Embedder;

use crate::prompts;
use crate::strategy::{ChatContext, Evidence, RetrievalConfig, RetrievalStrategy};

pub const SELECT_SCAN_MESSAGE: &str =
    "Please select the scan you want to compare, then ask again.";
pub const CURRENT_NOT_FOUND_MESSAGE: &str =
    "I couldn't find the selected scan. It may have been removed.";
pub const NO_PRIOR_MESSAGE: &str =
    "I couldn't find a previous scan to compare with this one.";

#[derive(Clone)]
pub struct CompareStrategy {
    db: Database,
    embedder: Embedder,
    config: RetrievalConfig,
}

impl CompareStrategy {
    pub fn new(db: Database, embedder: Embedder, config: RetrievalConfig) -> Self {
        Self {
            db,
            embedder,
            config,
        }
    }

    async fn supporting_narrative(&self, stored: &Stored<ScanRecord>) -> Result<String> {
        let vector = stored.vectors.get(VectorSlot::Image).ok_or_else(|| {
            Error::Store(format!("Scan {} has no image vector", stored.record.scan_id))
        })?;
        let hits = self
            .db
            .knowledge
            .search(VectorSlot::Image, vector, self.config.compare_knowledge_top_k)
            .await?;
        Ok(prompts::narrative(&hits, self.config.compare_narrative_chars))
    }
}

#[async_trait]
impl RetrievalStrategy for CompareStrategy {
    fn intent(&self) -> Intent {
        Intent::Compare
    }

    #[instrument(
        skip(self, ctx),
        fields(subsystem = "search", component = "compare", op = "gather", patient_id = %ctx.patient_id)
    )]
    async fn gather(&self, ctx: &ChatContext) -> Result<Evidence> {
        let Some(current_id) = ctx.current_scan_id else {
            return Ok(Evidence::direct(SELECT_SCAN_MESSAGE, defaults::CONFIDENCE_GUIDANCE));
        };

        let current = match self.db.scans.get_with_vectors(current_id).await {
            Ok(stored) => stored,
            Err(e) if e.is_not_found() => {
                return Ok(Evidence::direct(
                    CURRENT_NOT_FOUND_MESSAGE,
                    defaults::CONFIDENCE_GUIDANCE,
                ))
            }
            Err(e) => return Err(e),
        };

        let query = self.embedder.embed_text(&ctx.message).await?;
        let candidates = self
            .db
            .scans
            .search_for_patient(
                &ctx.patient_id,
                VectorSlot::Text,
                &query,
                Some(current_id),
                self.config.compare_prior_top_k,
            )
            .await?;
        let Some(prior) = candidates.into_iter().next() else {
            return Ok(Evidence::direct(NO_PRIOR_MESSAGE, defaults::CONFIDENCE_GUIDANCE));
        };
        debug!(
            scan_id = %current_id,
            previous_scan_id = %prior.record.scan_id,
            score = prior.score,
            "Prior scan selected"
        );

        // Search hits carry no vectors; re-read the prior scan for its image.
        let previous = self.db.scans.get_with_vectors(prior.record.scan_id).await?;

        let current_narrative = self.supporting_narrative(&current).await?;
        let previous_narrative = self.supporting_narrative(&previous).await?;

        let prompt = prompts::compare_prompt(
            &current.record,
            &current_narrative,
            &previous.record,
            &previous_narrative,
            &ctx.message,
        );

        let images = vec![
            ImageRef::for_scan(&current.record).labeled("Current Scan"),
            ImageRef::for_scan(&previous.record).labeled("Previous Scan"),
        ];
        let scan_data = json!({
            "current_scan_id": current.record.scan_id,
            "current_date": current.record.scan_date,
            "previous_scan_id": previous.record.scan_id,
            "previous_date": previous.record.scan_date,
        });

        Ok(Evidence::prompt(prompt, defaults::CONFIDENCE_COMPARE)
            .with_images(images)
            .with_scan_data(scan_data))
    }
}
