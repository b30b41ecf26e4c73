//! Bounded, normalizing front for an embedding backend.
//!
//! At most `max_concurrency` embedding calls are in flight per process.
//! Vectors are L2-normalized on the blocking pool before they are stored
//! or searched with, so cosine scores are comparable across slots.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use radmem_core::{EmbeddingBackend, Error, Result};

/// Shared embedding front used by ingestion and retrieval.
#[derive(Clone)]
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            backend,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Unit-length text embedding.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let raw = {
            let _permit = self.acquire().await?;
            self.backend.embed_text(text).await?
        };
        normalize_off_thread(raw).await
    }

    /// Unit-length image embedding.
    pub async fn embed_image(&self, bytes: &[u8], mime_type: &str) -> Result<Vec<f32>> {
        let raw = {
            let _permit = self.acquire().await?;
            self.backend.embed_image(bytes, mime_type).await?
        };
        normalize_off_thread(raw).await
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        if self.permits.available_permits() == 0 {
            debug!(
                subsystem = "inference",
                component = "embedder",
                max_concurrency = self.max_concurrency,
                "Waiting for embedding slot"
            );
        }
        self.permits
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("Embedding limiter closed: {}", e)))
    }
}

async fn normalize_off_thread(vector: Vec<f32>) -> Result<Vec<f32>> {
    tokio::task::spawn_blocking(move || normalize(vector))
        .await
        .map_err(|e| Error::Internal(format!("Normalization task failed: {}", e)))?
}

/// Scale a vector to unit length. A zero vector cannot be normalized.
pub fn normalize(mut vector: Vec<f32>) -> Result<Vec<f32>> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return Err(Error::Embedding(
            "Embedding has zero or non-finite magnitude".to_string(),
        ));
    }
    for x in vector.iter_mut() {
        *x /= norm;
    }
    Ok(vector)
}
