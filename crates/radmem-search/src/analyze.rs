//! Preliminary analysis of a stored scan against the reference cases.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use radmem_core::{defaults, Error, GenerationBackend, Result, VectorSlot};
use radmem_db::Database;

use crate::prompts;
use crate::strategy::RetrievalConfig;

/// One reference case similar to the analyzed scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCase {
    pub report_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanAnalysis {
    pub status: String,
    pub analysis: String,
    pub similar_cases: Vec<SimilarCase>,
}

#[derive(Clone)]
pub struct ScanAnalyzer {
    db: Database,
    generator: Arc<dyn GenerationBackend>,
    config: RetrievalConfig,
}

impl ScanAnalyzer {
    pub fn new(db: Database, generator: Arc<dyn GenerationBackend>) -> Self {
        Self {
            db,
            generator,
            config: RetrievalConfig::default(),
        }
    }

    /// Analyze a scan. A missing scan is an error; a failed generation
    /// falls back to the canned message with the cases still attached.
    #[instrument(
        skip(self),
        fields(subsystem = "search", component = "analyze", op = "analyze_scan")
    )]
    pub async fn analyze(&self, scan_id: Uuid) -> Result<ScanAnalysis> {
        let stored = self.db.scans.get_with_vectors(scan_id).await?;
        let vector = stored
            .vectors
            .get(VectorSlot::Image)
            .ok_or_else(|| Error::Store(format!("Scan {} has no image vector", scan_id)))?;

        let hits = self
            .db
            .knowledge
            .search(VectorSlot::Image, vector, self.config.diagnose_image_top_k)
            .await?;
        let top = &hits[..hits.len().min(self.config.diagnose_context_hits)];
        let prompt = prompts::analysis_prompt(&stored.record, &prompts::scored_context(top));

        let analysis = match self
            .generator
            .generate_with_system(&prompt.system, &prompt.user)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(scan_id = %scan_id, error = %e, "Analysis generation failed, using fallback");
                defaults::GENERATION_FALLBACK.to_string()
            }
        };

        let similar_cases = hits
            .into_iter()
            .map(|hit| SimilarCase {
                report_text: hit.record.report_text,
                diagnosis: hit.record.diagnosis,
                scan_type: hit.record.scan_type,
                similarity: hit.score,
            })
            .collect();

        Ok(ScanAnalysis {
            status: "success".to_string(),
            analysis,
            similar_cases,
        })
    }
}
