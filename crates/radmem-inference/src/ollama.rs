//! Ollama generation backend.
//!
//! Answers are composed through the `/api/chat` endpoint so system context
//! and the user prompt travel as separate messages.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use radmem_core::{defaults, logging, Error, GenerationBackend, Result};

/// Ollama-backed text generation.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a backend with default URL and model.
    pub fn new() -> Result<Self> {
        Self::with_config(
            defaults::OLLAMA_URL.to_string(),
            defaults::GEN_MODEL.to_string(),
            defaults::GEN_TIMEOUT_SECS,
        )
    }

    /// Create a backend against a specific server and model.
    pub fn with_config(base_url: String, gen_model: String, gen_timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            gen_model,
            gen_timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the server answers its model listing.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        match response {
            Ok(r) => Ok(r.status().is_success()),
            Err(e) => {
                debug!(error = %e, "Ollama health check failed");
                Ok(false)
            }
        }
    }

    #[instrument(
        skip(self, system, prompt),
        fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model)
    )]
    async fn chat(&self, system: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatTurn {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatTurn {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > logging::SLOW_GENERATION_MS {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatTurn {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatTurn>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatTurn,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt).await
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> OllamaBackend {
        OllamaBackend::with_config(server.uri(), "test-model".to_string(), 5).unwrap()
    }

    #[test]
    fn test_default_config() {
        let backend = OllamaBackend::new().unwrap();
        assert_eq!(backend.base_url(), defaults::OLLAMA_URL);
        assert_eq!(backend.model_name(), defaults::GEN_MODEL);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend =
            OllamaBackend::with_config("http://gpu-box:11434/".to_string(), "m".to_string(), 10)
                .unwrap();
        assert_eq!(backend.base_url(), "http://gpu-box:11434");
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "llama3.1:8b".to_string(),
            messages: vec![ChatTurn {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.1:8b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_generate_with_system_sends_both_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "You are a radiologist."},
                    {"role": "user", "content": "Describe the film."}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": "Clear lung fields."}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = backend(&server)
            .generate_with_system("You are a radiologist.", "Describe the film.")
            .await
            .unwrap();
        assert_eq!(answer, "Clear lung fields.");
    }

    #[tokio::test]
    async fn test_generate_without_system_sends_user_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "messages": [{"role": "user", "content": "ping"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": "pong"}
            })))
            .mount(&server)
            .await;

        assert_eq!(backend(&server).generate("ping").await.unwrap(), "pong");
    }

    #[tokio::test]
    async fn test_server_error_maps_to_inference_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let err = backend(&server).generate("x").await.unwrap_err();
        match err {
            Error::Inference(msg) => assert!(msg.contains("model not loaded")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_inference_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        assert!(matches!(
            backend(&server).generate("x").await,
            Err(Error::Inference(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&server)
            .await;
        assert!(backend(&server).health_check().await.unwrap());
    }
}
