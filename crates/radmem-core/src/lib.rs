//! # radmem-core
//!
//! Core types, traits, and abstractions for radmem.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other radmem crates depend on: the vector-store point model, the
//! typed record entities, and the embedding/generation backend traits.

pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod logging;
pub mod models;
pub mod point;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use file_safety::{
    detect_content_type, ensure_image_content_type, sanitize_filename, upload_extension,
    validate_entry_name,
};
pub use models::*;
pub use point::*;
pub use traits::*;
pub use uuid_utils::{chat_session_id, new_record_id, patient_id_for_email};
