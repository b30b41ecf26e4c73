//! Structured logging field name constants for radmem.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), completed writes |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (search hits, payload rows) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the `x-request-id` header.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "search", "db", "inference"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pipeline", "diagnose", "points", "clip", "ollama"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "embed_image", "generate", "upsert"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Scan UUID being operated on.
pub const SCAN_ID: &str = "scan_id";

/// Patient identifier (opaque string).
pub const PATIENT_ID: &str = "patient_id";

/// Medical-history entry UUID.
pub const ITEM_ID: &str = "item_id";

/// Vector store collection name.
pub const COLLECTION: &str = "collection";

/// Classified chat intent.
pub const INTENT: &str = "intent";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or scroll.
pub const RESULT_COUNT: &str = "result_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Size of an uploaded file in bytes.
pub const FILE_SIZE: &str = "file_size";

// ─── Database fields ───────────────────────────────────────────────────────

/// Maximum connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";

// ─── Thresholds ────────────────────────────────────────────────────────────

/// Embedding calls slower than this are logged at WARN.
pub const SLOW_EMBED_MS: u64 = 5_000;

/// Generation calls slower than this are logged at WARN.
pub const SLOW_GENERATION_MS: u64 = 30_000;
