//! Scan record lifecycle.

use serde_json::{json, Map};
use tracing::{debug, info};
use uuid::Uuid;

use radmem_core::{defaults, Error, Filter, NamedVectors, Result, ScanRecord, ScanStatus, VectorSlot};

use crate::records::{Records, Scored, Stored};

/// Field-level changes to a stored scan.
#[derive(Debug, Clone, Default)]
pub struct ScanUpdate {
    pub report_text: Option<String>,
    pub status: Option<ScanStatus>,
}

impl ScanUpdate {
    pub fn is_empty(&self) -> bool {
        self.report_text.is_none() && self.status.is_none()
    }
}

/// Repository for patient scans.
#[derive(Clone)]
pub struct ScanRepository {
    records: Records<ScanRecord>,
}

impl ScanRepository {
    pub fn new(records: Records<ScanRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &Records<ScanRecord> {
        &self.records
    }

    /// Store a new scan with both its image and text vectors.
    pub async fn create(&self, scan: &ScanRecord, vectors: NamedVectors) -> Result<()> {
        self.records.upsert(scan, vectors).await?;
        info!(
            subsystem = "db",
            component = "scans",
            op = "create",
            scan_id = %scan.scan_id,
            patient_id = %scan.patient_id,
            "Scan stored"
        );
        Ok(())
    }

    /// Fetch a scan, failing with `ScanNotFound` when absent.
    pub async fn get(&self, scan_id: Uuid) -> Result<ScanRecord> {
        self.records
            .get(scan_id)
            .await?
            .ok_or(Error::ScanNotFound(scan_id))
    }

    /// Fetch a scan with its vectors, failing with `ScanNotFound` when absent.
    pub async fn get_with_vectors(&self, scan_id: Uuid) -> Result<Stored<ScanRecord>> {
        self.records
            .get_with_vectors(scan_id)
            .await?
            .ok_or(Error::ScanNotFound(scan_id))
    }

    /// All scans for a patient, newest upload first.
    pub async fn list_for_patient(&self, patient_id: &str) -> Result<Vec<ScanRecord>> {
        let filter = Filter::new().must_eq("patient_id", patient_id);
        let mut scans = self.records.scroll(&filter, defaults::SCROLL_LIMIT).await?;
        scans.sort_by(|a, b| b.upload_timestamp.cmp(&a.upload_timestamp));
        debug!(subsystem = "db", component = "scans", patient_id, result_count = scans.len(), "Listed patient scans");
        Ok(scans)
    }

    /// Similarity search over one patient's scans, optionally excluding one.
    pub async fn search_for_patient(
        &self,
        patient_id: &str,
        slot: VectorSlot,
        vector: &[f32],
        exclude: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<Scored<ScanRecord>>> {
        let mut filter = Filter::new().must_eq("patient_id", patient_id);
        if let Some(id) = exclude {
            filter = filter.must_not_eq("scan_id", id.to_string());
        }
        self.records.search(slot, vector, Some(&filter), limit).await
    }

    /// Apply report/status changes. Last writer wins per field.
    pub async fn update(&self, scan_id: Uuid, update: ScanUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(Error::InvalidInput(
                "Nothing to update: provide report_text or status".to_string(),
            ));
        }
        // Existence check so a missing scan is reported rather than ignored.
        self.get(scan_id).await?;

        let mut fields = Map::new();
        if let Some(text) = update.report_text {
            fields.insert("report_text".to_string(), json!(text));
        }
        if let Some(status) = update.status {
            fields.insert("status".to_string(), serde_json::to_value(status)?);
        }
        self.records.set_fields(scan_id, fields).await
    }

    /// Flag that a chat transcript exists for this scan.
    pub async fn mark_chat_history(&self, scan_id: Uuid) -> Result<()> {
        let mut fields = Map::new();
        fields.insert("has_chat_history".to_string(), json!(true));
        self.records.set_fields(scan_id, fields).await
    }
}
