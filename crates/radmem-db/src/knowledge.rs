//! Verified reference cases (`radiology_memory`).
//!
//! Read-only on the serving path; populated offline by the ingest tool.

use tracing::info;
use uuid::Uuid;

use radmem_core::{Filter, KnowledgeRecord, NamedVectors, Result, VectorSlot};

use crate::records::{Records, Scored};

/// Placeholder report texts left behind by older upload code paths.
///
/// Points carrying one of these are not verified cases.
pub const PLACEHOLDER_REPORTS: &[&str] = &[
    "Medical scan uploaded",
    "Medical scan uploaded by patient",
    "Pending analysis",
];

#[derive(Clone)]
pub struct KnowledgeRepository {
    records: Records<KnowledgeRecord>,
}

impl KnowledgeRepository {
    pub fn new(records: Records<KnowledgeRecord>) -> Self {
        Self { records }
    }

    /// Nearest reference cases on one slot.
    pub async fn search(
        &self,
        slot: VectorSlot,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<Scored<KnowledgeRecord>>> {
        self.records.search(slot, vector, None, limit).await
    }

    pub async fn upsert(&self, record: &KnowledgeRecord, vectors: NamedVectors) -> Result<()> {
        self.records.upsert(record, vectors).await
    }

    /// Delete reference points whose report is a known placeholder.
    /// Returns the number removed. A zero page size is treated as one.
    pub async fn purge_placeholders(&self, page: usize) -> Result<usize> {
        let page = page.max(1);
        let mut removed = 0;
        for text in PLACEHOLDER_REPORTS {
            let filter = Filter::new().must_eq("report_text", *text);
            loop {
                let batch = self.records.scroll(&filter, page).await?;
                if batch.is_empty() {
                    break;
                }
                let ids: Vec<Uuid> = batch.iter().map(|r| r.id).collect();
                self.records.delete(&ids).await?;
                removed += ids.len();
                if batch.len() < page {
                    break;
                }
            }
        }
        info!(
            subsystem = "db",
            component = "knowledge",
            op = "purge_placeholders",
            removed,
            "Placeholder cases purged"
        );
        Ok(removed)
    }
}
