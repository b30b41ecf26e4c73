//! Core data models for radmem.
//!
//! Each stored entity maps to exactly one collection and serializes to the
//! point payload. Vectors live beside the payload, never inside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::point::VectorSlot;
use crate::traits::Record;

// =============================================================================
// SCAN TYPES
// =============================================================================

/// Review status of a scan, shown on the patient timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    #[default]
    Pending,
    Normal,
    Abnormal,
    Critical,
}

impl std::str::FromStr for ScanStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ScanStatus::Pending),
            "normal" => Ok(ScanStatus::Normal),
            "abnormal" => Ok(ScanStatus::Abnormal),
            "critical" => Ok(ScanStatus::Critical),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown scan status: {}",
                other
            ))),
        }
    }
}

/// One uploaded patient scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: Uuid,
    pub patient_id: String,
    pub scan_type: String,
    pub report_text: String,
    pub upload_timestamp: DateTime<Utc>,
    /// `YYYY-MM-DD`
    pub scan_date: String,
    /// `Mon YYYY`
    pub display_date: String,
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_url: String,
    pub file_size: u64,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub status: ScanStatus,
    #[serde(default)]
    pub has_chat_history: bool,
}

impl ScanRecord {
    /// `(scan_date, display_date)` for a timestamp.
    pub fn date_buckets(ts: &DateTime<Utc>) -> (String, String) {
        (
            ts.format("%Y-%m-%d").to_string(),
            ts.format("%b %Y").to_string(),
        )
    }

    /// Sentence embedded into the text slot at upload time.
    pub fn embedding_text(scan_type: &str, report_text: &str) -> String {
        format!("{} medical scan. {}", scan_type, report_text)
    }
}

impl Record for ScanRecord {
    const COLLECTION: &'static str = defaults::SCAN_COLLECTION;
    const SLOTS: &'static [VectorSlot] = &[VectorSlot::Image, VectorSlot::Text];
    const INDEXED_FIELDS: &'static [&'static str] = &["patient_id", "scan_id"];

    fn point_id(&self) -> Uuid {
        self.scan_id
    }
}

// =============================================================================
// KNOWLEDGE TYPES
// =============================================================================

/// One verified reference case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Nil for reference cases loaded without one; use the point id.
    #[serde(default)]
    pub id: Uuid,
    pub report_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl KnowledgeRecord {
    /// Stable id for a reference case keyed by its source image.
    pub fn id_for_image(image_path: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, image_path.as_bytes())
    }
}

impl Record for KnowledgeRecord {
    const COLLECTION: &'static str = defaults::KNOWLEDGE_COLLECTION;
    const SLOTS: &'static [VectorSlot] = &[VectorSlot::Image, VectorSlot::Text];
    const INDEXED_FIELDS: &'static [&'static str] = &["report_text"];

    fn point_id(&self) -> Uuid {
        self.id
    }

    fn assign_point_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

// =============================================================================
// CHAT TYPES
// =============================================================================

/// One message of a saved transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Saved transcript for one (patient, scan) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: Uuid,
    pub patient_id: String,
    pub scan_id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub saved_at: DateTime<Utc>,
    pub message_count: usize,
}

impl ChatSession {
    /// Build a session, deriving its id from the pair.
    pub fn new(patient_id: &str, scan_id: Uuid, messages: Vec<ChatMessage>) -> Self {
        Self {
            session_id: crate::uuid_utils::chat_session_id(patient_id, scan_id),
            patient_id: patient_id.to_string(),
            scan_id,
            message_count: messages.len(),
            messages,
            saved_at: Utc::now(),
        }
    }

    /// Text embedded for the session: the first few messages, truncated.
    pub fn summary(&self) -> String {
        let joined = self
            .messages
            .iter()
            .take(defaults::CHAT_SUMMARY_MESSAGES)
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join(" ");
        truncate_chars(&joined, defaults::CHAT_SUMMARY_CHARS)
    }
}

impl Record for ChatSession {
    const COLLECTION: &'static str = defaults::CHAT_COLLECTION;
    const SLOTS: &'static [VectorSlot] = &[VectorSlot::Text];
    const INDEXED_FIELDS: &'static [&'static str] = &["patient_id", "scan_id"];

    fn point_id(&self) -> Uuid {
        self.session_id
    }
}

// =============================================================================
// MEDICAL HISTORY TYPES
// =============================================================================

/// Category of an uploaded history file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFileType {
    Scan,
    Prescription,
    Report,
    #[default]
    Other,
}

impl HistoryFileType {
    /// Lenient parse; unknown categories become `Other`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "scan" => HistoryFileType::Scan,
            "prescription" => HistoryFileType::Prescription,
            "report" => HistoryFileType::Report,
            _ => HistoryFileType::Other,
        }
    }
}

/// Kind-specific attributes of a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "lowercase")]
pub enum HistoryItem {
    Folder {
        created_at: DateTime<Utc>,
    },
    File {
        storage_path: String,
        size_bytes: u64,
        mime_type: String,
        uploaded_at: DateTime<Utc>,
        file_type: HistoryFileType,
    },
}

/// A file or folder in a patient's virtual filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub patient_id: String,
    pub name: String,
    /// Empty at the root.
    pub parent_path: String,
    pub path: String,
    #[serde(flatten)]
    pub item: HistoryItem,
}

impl HistoryEntry {
    pub fn is_folder(&self) -> bool {
        matches!(self.item, HistoryItem::Folder { .. })
    }

    /// Synthetic description embedded into the text slot.
    pub fn description(&self) -> String {
        match &self.item {
            HistoryItem::Folder { .. } => format!("Medical history folder {}", self.path),
            HistoryItem::File { file_type, .. } => {
                format!("Medical history {:?} file {}", file_type, self.path).to_lowercase()
            }
        }
    }
}

impl Record for HistoryEntry {
    const COLLECTION: &'static str = defaults::HISTORY_COLLECTION;
    const SLOTS: &'static [VectorSlot] = &[VectorSlot::Text];
    const INDEXED_FIELDS: &'static [&'static str] =
        &["patient_id", "path", "item_type", "parent_path"];

    fn point_id(&self) -> Uuid {
        self.id
    }
}

/// Join a parent path and a name into a full path.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

// =============================================================================
// PATIENT REGISTRY
// =============================================================================

/// E-mail identity registered to a derived patient id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub metadata: JsonValue,
    pub registered_at: DateTime<Utc>,
}

impl Record for PatientProfile {
    const COLLECTION: &'static str = defaults::PATIENT_COLLECTION;
    const SLOTS: &'static [VectorSlot] = &[];
    const INDEXED_FIELDS: &'static [&'static str] = &["email"];

    fn point_id(&self) -> Uuid {
        self.patient_id
    }
}

// =============================================================================
// CHAT RESPONSE TYPES
// =============================================================================

/// Retrieval strategy chosen for a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Diagnose,
    Fetch,
    Compare,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Diagnose => "diagnose",
            Intent::Fetch => "fetch",
            Intent::Compare => "compare",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image attached to a chat reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    pub url: String,
    pub scan_id: Uuid,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ImageRef {
    pub fn for_scan(scan: &ScanRecord) -> Self {
        Self {
            filename: scan.filename.clone(),
            url: scan.file_url.clone(),
            scan_id: scan.scan_id,
            date: scan.display_date.clone(),
            label: None,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Structured chat reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub intent: Intent,
    pub confidence: f32,
    pub message: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub scan_data: Option<JsonValue>,
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
