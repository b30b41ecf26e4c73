//! Centralized default constants for radmem.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// COLLECTIONS
// =============================================================================

/// Verified reference cases (image + text vectors).
pub const KNOWLEDGE_COLLECTION: &str = "radiology_memory";

/// Patient-uploaded scans (image + text vectors).
pub const SCAN_COLLECTION: &str = "patient_uploads";

/// Saved chat transcripts (text vector).
pub const CHAT_COLLECTION: &str = "chat_sessions";

/// Per-patient virtual filesystem entries (text vector).
pub const HISTORY_COLLECTION: &str = "medical_history";

/// E-mail to patient id registry (no vectors).
pub const PATIENT_COLLECTION: &str = "user_registry";

// =============================================================================
// EMBEDDING
// =============================================================================

/// Embedding vector dimension shared by image and text encoders.
pub const EMBED_DIMENSION: usize = 512;

/// Default embedding service base URL.
pub const EMBED_URL: &str = "http://127.0.0.1:8081";

/// Default embedding model identifier reported by the embedding service.
pub const EMBED_MODEL: &str = "biomedclip";

/// Maximum concurrent embedding calls per process.
pub const EMBED_CONCURRENCY: usize = 4;

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Knowledge hits fetched when diagnosing a stored scan.
pub const DIAGNOSE_IMAGE_TOP_K: usize = 5;

/// Knowledge hits actually quoted into the diagnose context.
pub const DIAGNOSE_CONTEXT_HITS: usize = 3;

/// Knowledge hits fetched when diagnosing from message text alone.
pub const DIAGNOSE_TEXT_TOP_K: usize = 3;

/// Patient scans considered by fetch.
pub const FETCH_TOP_K: usize = 3;

/// Prior scans considered by compare.
pub const COMPARE_PRIOR_TOP_K: usize = 1;

/// Knowledge hits fetched per side of a comparison.
pub const COMPARE_KNOWLEDGE_TOP_K: usize = 2;

/// Character budget for each side's narrative in a comparison prompt.
pub const COMPARE_NARRATIVE_CHARS: usize = 400;

/// Page cap for filtered scrolls (history listings, patient scans).
pub const SCROLL_LIMIT: usize = 1000;

// =============================================================================
// CONFIDENCE
// =============================================================================

/// Classifier confidence for compare intent.
pub const CONFIDENCE_COMPARE: f32 = 0.9;

/// Classifier confidence for fetch intent.
pub const CONFIDENCE_FETCH: f32 = 0.85;

/// Classifier confidence for diagnose intent (also the no-cue fallback).
pub const CONFIDENCE_DIAGNOSE: f32 = 0.8;

/// Confidence attached to guidance messages (nothing found, select a scan).
pub const CONFIDENCE_GUIDANCE: f32 = 0.7;

/// Confidence attached to degraded answers after a retrieval failure.
pub const CONFIDENCE_DEGRADED: f32 = 0.5;

// =============================================================================
// RECORDS
// =============================================================================

/// Report text stored when an upload carries no notes.
pub const PENDING_REPORT: &str = "Pending analysis";

/// Default scan type when the upload form omits one.
pub const DEFAULT_SCAN_TYPE: &str = "Unknown";

/// Folders materialized the first time a patient's history root is listed.
pub const DEFAULT_HISTORY_FOLDERS: &[&str] = &["Scans", "Prescriptions", "Reports", "Lab Results"];

/// Messages summarized into a chat session's text vector.
pub const CHAT_SUMMARY_MESSAGES: usize = 3;

/// Character cap for a chat session summary.
pub const CHAT_SUMMARY_CHARS: usize = 500;

/// Extension used when an uploaded filename has none.
pub const DEFAULT_IMAGE_EXTENSION: &str = ".jpg";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8000;

/// Default directory for uploaded scan images.
pub const UPLOAD_DIR: &str = "uploads";

/// Default directory for medical-history file bytes.
pub const HISTORY_DIR: &str = "medical_history_files";

/// Public URL prefix under which uploaded scans are served.
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/// Maximum request body size in bytes (50 MB).
pub const MAX_BODY_SIZE_BYTES: usize = 50 * 1024 * 1024;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Default maximum number of pooled PostgreSQL connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Seconds a request waits for a pooled connection.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Seconds before an idle pooled connection is closed.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "llama3.1:8b";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Returned to the user when the generation backend is unavailable.
pub const GENERATION_FALLBACK: &str =
    "I'm unable to generate a detailed response right now. Please try again shortly.";

/// Returned to the user when retrieval fails inside a chat strategy.
pub const DEGRADED_REPLY: &str =
    "I'm sorry, I ran into a problem while looking through the records. Please try again.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(CONFIDENCE_COMPARE > CONFIDENCE_FETCH);
        assert!(CONFIDENCE_FETCH > CONFIDENCE_DIAGNOSE);
        assert!(CONFIDENCE_DIAGNOSE > CONFIDENCE_GUIDANCE);
        assert!(CONFIDENCE_GUIDANCE > CONFIDENCE_DEGRADED);
    }

    #[test]
    fn test_context_hits_within_fetched() {
        assert!(DIAGNOSE_CONTEXT_HITS <= DIAGNOSE_IMAGE_TOP_K);
    }

    #[test]
    fn test_collections_are_distinct() {
        let names = [
            KNOWLEDGE_COLLECTION,
            SCAN_COLLECTION,
            CHAT_COLLECTION,
            HISTORY_COLLECTION,
            PATIENT_COLLECTION,
        ];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
