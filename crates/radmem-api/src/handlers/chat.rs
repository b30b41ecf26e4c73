//! Chat and saved transcripts.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use radmem_core::{ChatMessage, ChatReply};
use radmem_search::ChatContext;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub patient_id: String,
    pub message: String,
    /// Scan the conversation is about. Blank or malformed ids are treated
    /// as "no scan selected".
    #[serde(default)]
    pub current_scan_id: Option<String>,
}

/// Answer a chat message.
///
/// Always 200: retrieval or generation trouble is reported in the reply
/// with a lowered confidence.
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Json<ChatReply> {
    let mut ctx = ChatContext::new(req.patient_id.trim(), req.message);
    if let Some(raw) = req.current_scan_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        match Uuid::parse_str(raw) {
            Ok(scan_id) => ctx = ctx.with_current_scan(scan_id),
            Err(_) => debug!(current_scan_id = raw, "Ignoring malformed scan id"),
        }
    }
    Json(state.pipeline.handle(&ctx).await)
}

#[derive(Debug, Deserialize)]
pub struct SaveChatRequest {
    pub patient_id: String,
    pub scan_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct SaveChatResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub message_count: usize,
}

/// Save the transcript for a (patient, scan) pair, replacing any earlier one.
pub async fn save_chat(
    State(state): State<AppState>,
    Json(req): Json<SaveChatRequest>,
) -> Result<Json<SaveChatResponse>, ApiError> {
    let session = state
        .scans
        .save_chat(&req.patient_id, req.scan_id, req.messages)
        .await?;
    Ok(Json(SaveChatResponse {
        success: true,
        session_id: session.session_id,
        message_count: session.message_count,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChatHistoryRequest {
    pub patient_id: String,
    pub scan_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub success: bool,
    pub messages: Vec<ChatMessage>,
}

pub async fn get_chat_history(
    State(state): State<AppState>,
    Json(req): Json<ChatHistoryRequest>,
) -> Result<Json<ChatHistoryResponse>, ApiError> {
    let messages = state.scans.chat_history(&req.patient_id, req.scan_id).await?;
    Ok(Json(ChatHistoryResponse {
        success: true,
        messages,
    }))
}
