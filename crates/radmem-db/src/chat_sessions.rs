//! Saved chat transcripts keyed by (patient, scan).

use tracing::info;
use uuid::Uuid;

use radmem_core::{chat_session_id, ChatSession, NamedVectors, Result};

use crate::records::Records;

#[derive(Clone)]
pub struct ChatSessionRepository {
    records: Records<ChatSession>,
}

impl ChatSessionRepository {
    pub fn new(records: Records<ChatSession>) -> Self {
        Self { records }
    }

    /// Upsert by derived id: saving the same pair twice leaves one session.
    pub async fn save(&self, session: &ChatSession, vectors: NamedVectors) -> Result<()> {
        self.records.upsert(session, vectors).await?;
        info!(
            subsystem = "db",
            component = "chat_sessions",
            op = "save",
            session_id = %session.session_id,
            scan_id = %session.scan_id,
            message_count = session.message_count,
            "Chat session saved"
        );
        Ok(())
    }

    pub async fn get(&self, patient_id: &str, scan_id: Uuid) -> Result<Option<ChatSession>> {
        self.records.get(chat_session_id(patient_id, scan_id)).await
    }
}
