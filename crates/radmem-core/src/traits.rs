//! Core traits for radmem abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::point::{CollectionSpec, Filter, Payload, Point, ScoredPoint, VectorSlot};

// =============================================================================
// VECTOR STORE
// =============================================================================

/// A vector store holding named-vector points grouped into collections.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Create the collection if it does not exist. Idempotent.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()>;

    /// Insert or replace points by id.
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()>;

    /// Fetch points by id. Missing ids are skipped. Vectors are only
    /// populated when `with_vectors` is set.
    async fn retrieve(&self, collection: &str, ids: &[Uuid], with_vectors: bool)
        -> Result<Vec<Point>>;

    /// Cosine-similarity search on one slot, best first.
    async fn search(
        &self,
        collection: &str,
        slot: VectorSlot,
        vector: &[f32],
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;

    /// Filtered listing without vectors, capped at `limit`.
    async fn scroll(&self, collection: &str, filter: &Filter, limit: usize) -> Result<Vec<Point>>;

    /// Merge `fields` into the payload of each listed point.
    async fn set_payload(&self, collection: &str, ids: &[Uuid], fields: Payload) -> Result<()>;

    /// Remove points by id. Missing ids are ignored.
    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<()>;
}

/// A typed entity stored in exactly one collection.
///
/// `SLOTS` lists the vectors every write of this entity must carry.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection this record lives in.
    const COLLECTION: &'static str;

    /// Slots required on every upsert.
    const SLOTS: &'static [VectorSlot];

    /// Payload keys that filters are applied to.
    const INDEXED_FIELDS: &'static [&'static str] = &[];

    /// Point identifier of this record.
    fn point_id(&self) -> Uuid;

    /// Called after decoding a payload so records that do not persist their
    /// id can adopt the point id.
    fn assign_point_id(&mut self, _id: Uuid) {}
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend mapping images and text into a shared embedding space.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed one text string.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed one encoded image (PNG, JPEG, ...).
    async fn embed_image(&self, bytes: &[u8], mime_type: &str) -> Result<Vec<f32>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
