//! Mock inference backends for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use radmem_core::{EmbeddingBackend, GenerationBackend};
//! use radmem_inference::mock::{MockEmbeddingBackend, MockGenerationBackend};
//!
//! # async fn demo() {
//! let embedder = MockEmbeddingBackend::new().with_dimension(64);
//! let v = embedder.embed_text("left hilar mass").await.unwrap();
//! assert_eq!(v.len(), 64);
//!
//! let llm = MockGenerationBackend::new().with_fixed_response("No acute findings.");
//! assert_eq!(llm.generate("?").await.unwrap(), "No acute findings.");
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use radmem_core::{EmbeddingBackend, Error, GenerationBackend, Result};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: String,
    pub system: Option<String>,
    pub input: String,
}

#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<MockCall>>>);

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, operation: &str, system: Option<&str>, input: &str) {
        self.lock().push(MockCall {
            operation: operation.to_string(),
            system: system.map(str::to_string),
            input: input.to_string(),
        });
    }
}

// =============================================================================
// EMBEDDING
// =============================================================================

/// Deterministic embedding backend.
///
/// Text is embedded as hashed bag-of-words counts, so texts sharing words
/// score higher than unrelated texts. Images are embedded from hashed byte
/// windows, so identical bytes produce identical vectors. Every vector gets a
/// small constant bias and is never zero.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
    failing: bool,
    latency: Option<Duration>,
    calls: CallLog,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            dimension: 32,
            failing: false,
            latency: None,
            calls: CallLog::default(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }

    /// Every call fails with `Error::Embedding`.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Simulated latency per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// The vector `embed_text` returns for `text`, before normalization.
    pub fn text_vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.01f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(word.to_lowercase().as_bytes()) as usize % self.dimension;
            v[bucket] += 1.0;
        }
        v
    }

    /// The vector `embed_image` returns for `bytes`, before normalization.
    pub fn image_vector(&self, bytes: &[u8]) -> Vec<f32> {
        let mut v = vec![0.01f32; self.dimension];
        for window in bytes.chunks(4) {
            let bucket = fnv1a(window) as usize % self.dimension;
            v[bucket] += 1.0;
        }
        v
    }

    async fn run<F: FnOnce() -> Vec<f32>>(&self, op: &str, input: &str, f: F) -> Result<Vec<f32>> {
        self.calls.push(op, None, input);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::Embedding("mock embedding failure".to_string()));
        }
        Ok(f())
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.run("embed_text", text, || self.text_vector(text)).await
    }

    async fn embed_image(&self, bytes: &[u8], mime_type: &str) -> Result<Vec<f32>> {
        self.run("embed_image", mime_type, || self.image_vector(bytes))
            .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-clip"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

// =============================================================================
// GENERATION
// =============================================================================

/// Generation backend answering with a fixed response.
#[derive(Clone)]
pub struct MockGenerationBackend {
    response: String,
    failing: bool,
    calls: CallLog,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            response: "Mock response".to_string(),
            failing: false,
            calls: CallLog::default(),
        }
    }

    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// Every call fails with `Error::Inference`.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Prompt of the most recent call.
    pub fn last_prompt(&self) -> Option<String> {
        self.calls.lock().last().map(|c| c.input.clone())
    }

    fn answer(&self) -> Result<String> {
        if self.failing {
            return Err(Error::Inference("mock generation failure".to_string()));
        }
        Ok(self.response.clone())
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.push("generate", None, prompt);
        self.answer()
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.calls.push("generate", Some(system), prompt);
        self.answer()
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}
