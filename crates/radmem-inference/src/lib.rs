//! # radmem-inference
//!
//! Embedding and generation backends for radmem.
//!
//! This crate provides:
//! - CLIP-style HTTP embedding backend (images and text in one space)
//! - Ollama generation backend
//! - `Embedder`, a concurrency-bounded, normalizing wrapper over any
//!   embedding backend
//! - Deterministic mock backends (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use radmem_inference::{ClipEmbeddingBackend, Embedder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = ClipEmbeddingBackend::with_config(
//!         "http://127.0.0.1:8081".to_string(),
//!         "biomedclip".to_string(),
//!         512,
//!         30,
//!     )
//!     .unwrap();
//!     let embedder = Embedder::new(Arc::new(backend), 4);
//!     let vector = embedder.embed_text("chest x-ray, left lower lobe").await.unwrap();
//! }
//! ```

pub mod clip;
pub mod embedder;
pub mod ollama;

// Mock inference backends for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use radmem_core::*;

pub use clip::ClipEmbeddingBackend;
pub use embedder::{normalize, Embedder};
pub use ollama::OllamaBackend;
