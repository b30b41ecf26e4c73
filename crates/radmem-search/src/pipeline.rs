//! Intent-routed chat pipeline: classify, retrieve, compose.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};

use radmem_core::{ChatReply, GenerationBackend, Intent};
use radmem_db::Database;
use radmem_inference::Embedder;

use crate::compare::CompareStrategy;
use crate::composer::ResponseComposer;
use crate::diagnose::DiagnoseStrategy;
use crate::fetch::FetchStrategy;
use crate::intent::classify;
use crate::strategy::{ChatContext, RetrievalConfig, RetrievalStrategy};

#[derive(Clone)]
pub struct ChatPipeline {
    diagnose: DiagnoseStrategy,
    fetch: FetchStrategy,
    compare: CompareStrategy,
    composer: ResponseComposer,
}

impl ChatPipeline {
    pub fn new(db: Database, embedder: Embedder, generator: Arc<dyn GenerationBackend>) -> Self {
        Self::with_config(db, embedder, generator, RetrievalConfig::default())
    }

    pub fn with_config(
        db: Database,
        embedder: Embedder,
        generator: Arc<dyn GenerationBackend>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            diagnose: DiagnoseStrategy::new(db.clone(), embedder.clone(), config.clone()),
            fetch: FetchStrategy::new(db.clone(), embedder.clone(), config.clone()),
            compare: CompareStrategy::new(db, embedder, config),
            composer: ResponseComposer::new(generator),
        }
    }

    fn strategy(&self, intent: Intent) -> &dyn RetrievalStrategy {
        match intent {
            Intent::Diagnose => &self.diagnose,
            Intent::Fetch => &self.fetch,
            Intent::Compare => &self.compare,
        }
    }

    /// Answer one chat message. Never fails: retrieval and generation
    /// problems come back as a lowered-confidence reply.
    #[instrument(
        skip(self, ctx),
        fields(subsystem = "search", component = "pipeline", op = "chat", patient_id = %ctx.patient_id)
    )]
    pub async fn handle(&self, ctx: &ChatContext) -> ChatReply {
        let start = Instant::now();
        let (intent, _) = classify(&ctx.message);
        let outcome = self.strategy(intent).run(ctx).await;
        let reply = self.composer.compose(intent, outcome).await;
        info!(
            intent = %intent,
            confidence = reply.confidence,
            result_count = reply.images.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Chat handled"
        );
        reply
    }
}
