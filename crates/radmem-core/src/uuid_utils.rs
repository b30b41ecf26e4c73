//! Identifier helpers.
//!
//! Scan and history identifiers are random (UUIDv4). Chat sessions and
//! e-mail-derived patients use name-based UUIDv5 so the same inputs always
//! produce the same identifier.
//!
//! # Derivation algorithm v1
//!
//! ```text
//! chat session id = uuid5(NAMESPACE_DNS, "{patient_id}_{scan_id}")
//! patient id      = uuid5(NAMESPACE_DNS, email)
//! ```
//!
//! `NAMESPACE_DNS` is `6ba7b810-9dad-11d1-80b4-00c04fd430c8`. Stored
//! sessions are keyed by this derivation; changing it orphans them.

use uuid::Uuid;

/// Version tag of the derivation scheme documented above.
pub const DERIVATION_VERSION: u32 = 1;

/// Generate a new random identifier for a scan or history entry.
#[inline]
pub fn new_record_id() -> Uuid {
    Uuid::new_v4()
}

/// Deterministic chat-session identifier for a (patient, scan) pair.
///
/// # Example
///
/// ```
/// use radmem_core::uuid_utils::chat_session_id;
/// use uuid::Uuid;
///
/// let scan = Uuid::new_v4();
/// assert_eq!(chat_session_id("p1", scan), chat_session_id("p1", scan));
/// ```
pub fn chat_session_id(patient_id: &str, scan_id: Uuid) -> Uuid {
    let name = format!("{}_{}", patient_id, scan_id);
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
}

/// Deterministic patient identifier for an e-mail identity.
pub fn patient_id_for_email(email: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, email.as_bytes())
}
