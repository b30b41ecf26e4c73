//! Shared strategy types.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use radmem_core::{defaults, ImageRef, Intent, Result};

/// Per-request chat context handed to every strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContext {
    pub patient_id: String,
    pub message: String,
    pub current_scan_id: Option<Uuid>,
}

impl ChatContext {
    pub fn new(patient_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            message: message.into(),
            current_scan_id: None,
        }
    }

    pub fn with_current_scan(mut self, scan_id: Uuid) -> Self {
        self.current_scan_id = Some(scan_id);
        self
    }
}

/// A generation request assembled from retrieved evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// What the composer turns into the reply text.
#[derive(Debug, Clone, PartialEq)]
pub enum EvidenceBody {
    /// Needs a generation call.
    Prompt(Prompt),
    /// Already user-facing text.
    Direct(String),
}

/// Evidence gathered by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    pub body: EvidenceBody,
    pub confidence: f32,
    pub images: Vec<ImageRef>,
    pub scan_data: Option<JsonValue>,
}

impl Evidence {
    pub fn prompt(prompt: Prompt, confidence: f32) -> Self {
        Self {
            body: EvidenceBody::Prompt(prompt),
            confidence,
            images: Vec::new(),
            scan_data: None,
        }
    }

    pub fn direct(message: impl Into<String>, confidence: f32) -> Self {
        Self {
            body: EvidenceBody::Direct(message.into()),
            confidence,
            images: Vec::new(),
            scan_data: None,
        }
    }

    pub fn with_images(mut self, images: Vec<ImageRef>) -> Self {
        self.images = images;
        self
    }

    pub fn with_scan_data(mut self, scan_data: JsonValue) -> Self {
        self.scan_data = Some(scan_data);
        self
    }
}

/// Result of running a strategy at its boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Ready(Evidence),
    /// Retrieval failed; the reason is logged, never shown.
    Degraded { reason: String },
}

impl From<Result<Evidence>> for StrategyOutcome {
    fn from(result: Result<Evidence>) -> Self {
        match result {
            Ok(evidence) => StrategyOutcome::Ready(evidence),
            Err(e) => StrategyOutcome::Degraded {
                reason: e.to_string(),
            },
        }
    }
}

/// One retrieval strategy.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Intent this strategy serves.
    fn intent(&self) -> Intent;

    /// Gather evidence for a message. Errors are degraded by the caller.
    async fn gather(&self, ctx: &ChatContext) -> Result<Evidence>;

    /// Run at the strategy boundary: errors never escape.
    async fn run(&self, ctx: &ChatContext) -> StrategyOutcome {
        self.gather(ctx).await.into()
    }
}

/// Retrieval sizes for the three strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    pub diagnose_image_top_k: usize,
    pub diagnose_context_hits: usize,
    pub diagnose_text_top_k: usize,
    pub fetch_top_k: usize,
    pub compare_prior_top_k: usize,
    pub compare_knowledge_top_k: usize,
    pub compare_narrative_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            diagnose_image_top_k: defaults::DIAGNOSE_IMAGE_TOP_K,
            diagnose_context_hits: defaults::DIAGNOSE_CONTEXT_HITS,
            diagnose_text_top_k: defaults::DIAGNOSE_TEXT_TOP_K,
            fetch_top_k: defaults::FETCH_TOP_K,
            compare_prior_top_k: defaults::COMPARE_PRIOR_TOP_K,
            compare_knowledge_top_k: defaults::COMPARE_KNOWLEDGE_TOP_K,
            compare_narrative_chars: defaults::COMPARE_NARRATIVE_CHARS,
        }
    }
}
