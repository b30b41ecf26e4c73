//! Storage for per-patient medical-history entries.
//!
//! Entries form a tree through `parent_path`; every lookup is a filtered
//! scroll on `patient_id` plus a path key. Tree-level rules (default root
//! folders, cascades, ownership) live in the API service layer.

use std::collections::VecDeque;

use serde_json::{json, Map};
use uuid::Uuid;

use radmem_core::{defaults, Filter, HistoryEntry, NamedVectors, Result};

use crate::records::Records;

#[derive(Clone)]
pub struct MedicalHistoryRepository {
    records: Records<HistoryEntry>,
}

impl MedicalHistoryRepository {
    pub fn new(records: Records<HistoryEntry>) -> Self {
        Self { records }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<HistoryEntry>> {
        self.records.get(id).await
    }

    pub async fn insert(&self, entry: &HistoryEntry, vectors: NamedVectors) -> Result<()> {
        self.records.upsert(entry, vectors).await
    }

    /// Direct children of `parent_path` (empty string for the root).
    pub async fn list_children(
        &self,
        patient_id: &str,
        parent_path: &str,
    ) -> Result<Vec<HistoryEntry>> {
        let filter = Filter::new()
            .must_eq("patient_id", patient_id)
            .must_eq("parent_path", parent_path);
        self.records.scroll(&filter, defaults::SCROLL_LIMIT).await
    }

    /// Entry at an exact path, if any.
    pub async fn find_by_path(&self, patient_id: &str, path: &str) -> Result<Option<HistoryEntry>> {
        let filter = Filter::new()
            .must_eq("patient_id", patient_id)
            .must_eq("path", path);
        Ok(self.records.scroll(&filter, 1).await?.into_iter().next())
    }

    /// Every entry below `path`, breadth-first (parents before children).
    pub async fn descendants(&self, patient_id: &str, path: &str) -> Result<Vec<HistoryEntry>> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([path.to_string()]);
        while let Some(parent) = queue.pop_front() {
            for child in self.list_children(patient_id, &parent).await? {
                if child.is_folder() {
                    queue.push_back(child.path.clone());
                }
                out.push(child);
            }
        }
        Ok(out)
    }

    /// Move an entry: rewrite its name and location fields in place.
    pub async fn relocate(
        &self,
        id: Uuid,
        name: &str,
        parent_path: &str,
        path: &str,
    ) -> Result<()> {
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(name));
        fields.insert("parent_path".to_string(), json!(parent_path));
        fields.insert("path".to_string(), json!(path));
        self.records.set_fields(id, fields).await
    }

    pub async fn delete(&self, ids: &[Uuid]) -> Result<()> {
        self.records.delete(ids).await
    }
}
