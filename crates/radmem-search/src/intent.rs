//! Keyword intent classifier.
//!
//! Deterministic and I/O free. Cues are matched as case-insensitive
//! substrings. Priority: compare, then fetch (only when no diagnose cue is
//! present, so "show me my diagnosis" stays a diagnosis), else diagnose.

use radmem_core::{defaults, Intent};

/// Cues asking to relate two scans.
pub const COMPARE_CUES: &[&str] = &[
    "compare",
    "comparison",
    "difference",
    "changed",
    "progress",
    "versus",
    " vs ",
    "previous scan",
    "last year",
    "improved",
    "worse",
];

/// Cues asking to retrieve one of the patient's own scans.
pub const FETCH_CUES: &[&str] = &[
    "show me",
    "find ",
    "fetch",
    "retrieve",
    "get my",
    "display",
    "pull up",
    "look up",
    "my scans",
    "open my",
];

/// Cues asking for an interpretation.
pub const DIAGNOSE_CUES: &[&str] = &[
    "diagnos",
    "analy",
    "interpret",
    "abnormal",
    "condition",
    "disease",
    "wrong with",
    "finding",
    "what is this",
];

/// Classify a chat message into an intent and its fixed confidence.
pub fn classify(message: &str) -> (Intent, f32) {
    let text = message.to_lowercase();
    let has = |cues: &[&str]| cues.iter().any(|cue| text.contains(cue));

    if has(COMPARE_CUES) {
        (Intent::Compare, defaults::CONFIDENCE_COMPARE)
    } else if has(FETCH_CUES) && !has(DIAGNOSE_CUES) {
        (Intent::Fetch, defaults::CONFIDENCE_FETCH)
    } else {
        (Intent::Diagnose, defaults::CONFIDENCE_DIAGNOSE)
    }
}
