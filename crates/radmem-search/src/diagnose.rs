//! Diagnose by similarity to verified reference cases.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument};

use radmem_core::{defaults, Error, Intent, Result, VectorSlot};
use radmem_db::Database;
use radmem_inference::Embedder;

use crate::prompts;
use crate::strategy::{ChatContext, Evidence, RetrievalConfig, RetrievalStrategy};

/// With a current scan, searches the knowledge base by that scan's image;
/// otherwise by the embedded message text.
#[derive(Clone)]
pub struct DiagnoseStrategy {
    db: Database,
    embedder: Embedder,
    config: RetrievalConfig,
}

impl DiagnoseStrategy {
    pub fn new(db: Database, embedder: Embedder, config: RetrievalConfig) -> Self {
        Self {
            db,
            embedder,
            config,
        }
    }

    async fn by_image(&self, ctx: &ChatContext, scan_id: uuid::Uuid) -> Result<Evidence> {
        let stored = self.db.scans.get_with_vectors(scan_id).await?;
        let vector = stored
            .vectors
            .get(VectorSlot::Image)
            .ok_or_else(|| Error::Store(format!("Scan {} has no image vector", scan_id)))?;

        let mut hits = self
            .db
            .knowledge
            .search(VectorSlot::Image, vector, self.config.diagnose_image_top_k)
            .await?;
        hits.truncate(self.config.diagnose_context_hits);
        debug!(scan_id = %scan_id, result_count = hits.len(), "Image-similar cases found");

        let context = prompts::scored_context(&hits);
        Ok(Evidence::prompt(
            prompts::diagnose_prompt(&context, &ctx.message),
            defaults::CONFIDENCE_DIAGNOSE,
        ))
    }

    async fn by_text(&self, ctx: &ChatContext) -> Result<Evidence> {
        let query = self.embedder.embed_text(&ctx.message).await?;
        let hits = self
            .db
            .knowledge
            .search(VectorSlot::Text, &query, self.config.diagnose_text_top_k)
            .await?;
        debug!(result_count = hits.len(), "Text-similar cases found");

        let context = prompts::plain_context(&hits);
        Ok(Evidence::prompt(
            prompts::diagnose_prompt(&context, &ctx.message),
            defaults::CONFIDENCE_DIAGNOSE,
        ))
    }
}

#[async_trait]
impl RetrievalStrategy for DiagnoseStrategy {
    fn intent(&self) -> Intent {
        Intent::Diagnose
    }

    #[instrument(
        skip(self, ctx),
        fields(subsystem = "search", component = "diagnose", op = "gather", patient_id = %ctx.patient_id)
    )]
    async fn gather(&self, ctx: &ChatContext) -> Result<Evidence> {
        let start = Instant::now();
        let evidence = match ctx.current_scan_id {
            Some(scan_id) => self.by_image(ctx, scan_id).await?,
            None => self.by_text(ctx).await?,
        };
        debug!(duration_ms = start.elapsed().as_millis() as u64, "Diagnose evidence ready");
        Ok(evidence)
    }
}
