//! HTTP client for a CLIP-style embedding service.
//!
//! The service embeds images and text into one shared space:
//!
//! - `POST {base}/embed/text`  `{"text": "..."}`
//! - `POST {base}/embed/image` `{"image": "<base64>", "mime_type": "image/png"}`
//!
//! Both answer `{"embedding": [f32, ...]}`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use radmem_core::{defaults, logging, EmbeddingBackend, Error, Result};

/// Remote image/text embedding backend.
pub struct ClipEmbeddingBackend {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl ClipEmbeddingBackend {
    pub fn with_config(
        base_url: String,
        model: String,
        dimension: usize,
        timeout_secs: u64,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config("Embedding dimension must be positive".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimension,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_embed<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> Result<Vec<f32>> {
        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/embed/{}", self.base_url, route))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Embedding service returned {}: {}",
                status, body
            )));
        }

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.embedding.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "Expected {} dimensions, service returned {}",
                self.dimension,
                result.embedding.len()
            )));
        }

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(duration_ms = elapsed, route, "Embedding complete");
        if elapsed > logging::SLOW_EMBED_MS {
            warn!(duration_ms = elapsed, route, slow = true, "Slow embedding operation");
        }
        Ok(result.embedding)
    }
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: String,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingBackend for ClipEmbeddingBackend {
    #[instrument(
        skip(self, text),
        fields(subsystem = "inference", component = "clip", op = "embed_text", prompt_len = text.len())
    )]
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.post_embed("text", &TextRequest { text }).await
    }

    #[instrument(
        skip(self, bytes),
        fields(subsystem = "inference", component = "clip", op = "embed_image", file_size = bytes.len())
    )]
    async fn embed_image(&self, bytes: &[u8], mime_type: &str) -> Result<Vec<f32>> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput("Image is empty".to_string()));
        }
        let request = ImageRequest {
            image: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type,
        };
        self.post_embed("image", &request).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer, dimension: usize) -> ClipEmbeddingBackend {
        ClipEmbeddingBackend::with_config(server.uri(), "clip-test".to_string(), dimension, 5)
            .unwrap()
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let result =
            ClipEmbeddingBackend::with_config("http://x".to_string(), "m".to_string(), 0, 5);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_embed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/text"))
            .and(body_json(serde_json::json!({"text": "chest x-ray"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embedding": [0.1, 0.2, 0.3]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let v = backend(&server, 3).embed_text("chest x-ray").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_embed_image_sends_base64() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/image"))
            .and(body_json(serde_json::json!({
                "image": "AQID",
                "mime_type": "image/png"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"embedding": [1.0, 0.0]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let v = backend(&server, 2)
            .embed_image(&[1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(v, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_empty_image_rejected_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = backend(&server, 2).embed_image(&[], "image/png").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/text"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"embedding": [0.5]})),
            )
            .mount(&server)
            .await;

        let err = backend(&server, 4).embed_text("x").await.unwrap_err();
        match err {
            Error::Embedding(msg) => assert!(msg.contains("Expected 4")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_error_is_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/text"))
            .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
            .mount(&server)
            .await;

        let err = backend(&server, 2).embed_text("x").await.unwrap_err();
        match err {
            Error::Embedding(msg) => assert!(msg.contains("warming up")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
