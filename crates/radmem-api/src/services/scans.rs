//! Scan timeline, report updates and saved chat transcripts.

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use radmem_core::{
    ChatMessage, ChatSession, Error, NamedVectors, Result, ScanRecord, ScanStatus, VectorSlot,
};
use radmem_db::{Database, ScanUpdate};
use radmem_inference::Embedder;

/// One scan as shown on the patient timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub id: Uuid,
    pub date: String,
    #[serde(rename = "type")]
    pub scan_type: String,
    pub title: String,
    pub finding: String,
    pub status: ScanStatus,
    pub has_chat_history: bool,
    pub image_url: String,
}

impl From<ScanRecord> for TimelineEntry {
    fn from(scan: ScanRecord) -> Self {
        Self {
            id: scan.scan_id,
            date: scan.display_date,
            title: format!("{} Scan", scan.scan_type),
            scan_type: scan.scan_type,
            finding: scan.report_text,
            status: scan.status,
            has_chat_history: scan.has_chat_history,
            image_url: scan.file_url,
        }
    }
}

#[derive(Clone)]
pub struct ScanService {
    db: Database,
    embedder: Embedder,
}

impl ScanService {
    pub fn new(db: Database, embedder: Embedder) -> Self {
        Self { db, embedder }
    }

    /// A patient's scans, newest first.
    pub async fn patient_history(&self, patient_id: &str) -> Result<Vec<TimelineEntry>> {
        if patient_id.trim().is_empty() {
            return Err(Error::InvalidInput("patient_id is required".to_string()));
        }
        let scans = self.db.scans.list_for_patient(patient_id.trim()).await?;
        Ok(scans.into_iter().map(TimelineEntry::from).collect())
    }

    pub async fn update_report(&self, scan_id: Uuid, update: ScanUpdate) -> Result<()> {
        self.db.scans.update(scan_id, update).await?;
        info!(subsystem = "api", component = "scans", op = "update_report", scan_id = %scan_id, "Scan report updated");
        Ok(())
    }

    /// Save (or overwrite) the transcript for a (patient, scan) pair.
    #[instrument(
        skip(self, messages),
        fields(subsystem = "api", component = "scans", op = "save_chat", message_count = messages.len())
    )]
    pub async fn save_chat(
        &self,
        patient_id: &str,
        scan_id: Uuid,
        messages: Vec<ChatMessage>,
    ) -> Result<ChatSession> {
        if patient_id.trim().is_empty() {
            return Err(Error::InvalidInput("patient_id is required".to_string()));
        }
        // The scan must exist; a transcript for a missing scan is a 404.
        self.db.scans.get(scan_id).await?;

        let session = ChatSession::new(patient_id.trim(), scan_id, messages);
        let vector = self.embedder.embed_text(&session.summary()).await?;
        self.db
            .chat_sessions
            .save(&session, NamedVectors::new().with(VectorSlot::Text, vector))
            .await?;
        self.db.scans.mark_chat_history(scan_id).await?;
        Ok(session)
    }

    /// Saved messages for a pair; empty when nothing was saved.
    pub async fn chat_history(&self, patient_id: &str, scan_id: Uuid) -> Result<Vec<ChatMessage>> {
        Ok(self
            .db
            .chat_sessions
            .get(patient_id.trim(), scan_id)
            .await?
            .map(|session| session.messages)
            .unwrap_or_default())
    }
}
