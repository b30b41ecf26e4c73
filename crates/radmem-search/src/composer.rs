//! Turn a strategy outcome into the final chat reply.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use radmem_core::{defaults, ChatReply, GenerationBackend, Intent};

use crate::strategy::{Evidence, EvidenceBody, StrategyOutcome};

#[derive(Clone)]
pub struct ResponseComposer {
    generator: Arc<dyn GenerationBackend>,
}

impl ResponseComposer {
    pub fn new(generator: Arc<dyn GenerationBackend>) -> Self {
        Self { generator }
    }

    /// Shape the reply. Generation failures fail open with a canned message
    /// at degraded confidence; images and scan data are dropped with it.
    pub async fn compose(&self, intent: Intent, outcome: StrategyOutcome) -> ChatReply {
        let evidence = match outcome {
            StrategyOutcome::Ready(evidence) => evidence,
            StrategyOutcome::Degraded { reason } => {
                warn!(
                    subsystem = "search",
                    component = "composer",
                    intent = %intent,
                    error = %reason,
                    "Strategy degraded"
                );
                return degraded(intent, defaults::DEGRADED_REPLY);
            }
        };

        let Evidence {
            body,
            confidence,
            images,
            scan_data,
        } = evidence;

        let message = match body {
            EvidenceBody::Direct(text) => text,
            EvidenceBody::Prompt(prompt) => {
                let start = Instant::now();
                match self
                    .generator
                    .generate_with_system(&prompt.system, &prompt.user)
                    .await
                {
                    Ok(text) => {
                        info!(
                            subsystem = "search",
                            component = "composer",
                            intent = %intent,
                            prompt_len = prompt.user.len(),
                            response_len = text.len(),
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Reply generated"
                        );
                        text
                    }
                    Err(e) => {
                        warn!(
                            subsystem = "search",
                            component = "composer",
                            intent = %intent,
                            error = %e,
                            "Generation failed, using fallback"
                        );
                        return degraded(intent, defaults::GENERATION_FALLBACK);
                    }
                }
            }
        };

        ChatReply {
            intent,
            confidence,
            message,
            images,
            scan_data,
        }
    }
}

fn degraded(intent: Intent, message: &str) -> ChatReply {
    ChatReply {
        intent,
        confidence: defaults::CONFIDENCE_DEGRADED,
        message: message.to_string(),
        images: Vec::new(),
        scan_data: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Prompt;
    use radmem_inference::mock::MockGenerationBackend;

    fn prompt_evidence() -> Evidence {
        Evidence::prompt(
            Prompt {
                system: "sys".into(),
                user: "question".into(),
            },
            0.9,
        )
        .with_scan_data(serde_json::json!({"k": "v"}))
    }

    #[tokio::test]
    async fn test_direct_skips_generation() {
        let llm = MockGenerationBackend::new();
        let composer = ResponseComposer::new(Arc::new(llm.clone()));
        let reply = composer
            .compose(Intent::Fetch, StrategyOutcome::Ready(Evidence::direct("found", 0.42)))
            .await;
        assert_eq!(reply.message, "found");
        assert_eq!(reply.confidence, 0.42);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_prompt_uses_generation() {
        let llm = MockGenerationBackend::new().with_fixed_response("narrative");
        let composer = ResponseComposer::new(Arc::new(llm.clone()));
        let reply = composer
            .compose(Intent::Compare, StrategyOutcome::Ready(prompt_evidence()))
            .await;
        assert_eq!(reply.message, "narrative");
        assert_eq!(reply.confidence, 0.9);
        assert!(reply.scan_data.is_some());
        assert_eq!(llm.calls()[0].system.as_deref(), Some("sys"));
    }

    #[tokio::test]
    async fn test_generation_failure_fails_open() {
        let composer = ResponseComposer::new(Arc::new(MockGenerationBackend::new().failing()));
        let reply = composer
            .compose(Intent::Compare, StrategyOutcome::Ready(prompt_evidence()))
            .await;
        assert_eq!(reply.message, defaults::GENERATION_FALLBACK);
        assert_eq!(reply.confidence, 0.5);
        assert!(reply.scan_data.is_none());
    }

    #[tokio::test]
    async fn test_degraded_outcome() {
        let composer = ResponseComposer::new(Arc::new(MockGenerationBackend::new()));
        let reply = composer
            .compose(
                Intent::Diagnose,
                StrategyOutcome::Degraded {
                    reason: "store down".into(),
                },
            )
            .await;
        assert_eq!(reply.intent, Intent::Diagnose);
        assert_eq!(reply.confidence, 0.5);
        assert_eq!(reply.message, defaults::DEGRADED_REPLY);
    }
}
