//! Chat pipeline behavior over the in-memory store with mock backends.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use radmem_core::{defaults, Error, Intent, KnowledgeRecord, NamedVectors, ScanRecord, ScanStatus, VectorSlot};
use radmem_db::Database;
use radmem_inference::mock::{MockEmbeddingBackend, MockGenerationBackend};
use radmem_inference::Embedder;
use radmem_search::{compare, fetch, ChatContext, ChatPipeline, ScanAnalyzer};

const DIM: usize = 256;

struct Harness {
    db: Database,
    embedder: Embedder,
    llm: MockGenerationBackend,
    pipeline: ChatPipeline,
}

async fn harness_with(backend: MockEmbeddingBackend, llm: MockGenerationBackend) -> Harness {
    let db = Database::in_memory(DIM);
    db.ensure_collections().await.unwrap();
    let embedder = Embedder::new(Arc::new(backend), 2);
    let pipeline = ChatPipeline::new(db.clone(), embedder.clone(), Arc::new(llm.clone()));
    Harness {
        db,
        embedder,
        llm,
        pipeline,
    }
}

async fn harness() -> Harness {
    harness_with(
        MockEmbeddingBackend::new().with_dimension(DIM),
        MockGenerationBackend::new().with_fixed_response("Generated narrative."),
    )
    .await
}

impl Harness {
    async fn add_scan(
        &self,
        patient: &str,
        scan_type: &str,
        report: &str,
        image: &[u8],
        age_days: i64,
    ) -> ScanRecord {
        let ts = Utc::now() - Duration::days(age_days);
        let (scan_date, display_date) = ScanRecord::date_buckets(&ts);
        let scan_id = Uuid::new_v4();
        let scan = ScanRecord {
            scan_id,
            patient_id: patient.to_string(),
            scan_type: scan_type.to_string(),
            report_text: report.to_string(),
            upload_timestamp: ts,
            scan_date,
            display_date,
            filename: format!("{}.png", scan_id),
            original_filename: "film.png".to_string(),
            file_path: format!("uploads/{}.png", scan_id),
            file_url: format!("/uploads/{}.png", scan_id),
            file_size: image.len() as u64,
            content_type: "image/png".to_string(),
            content_hash: None,
            status: ScanStatus::Pending,
            has_chat_history: false,
        };
        let vectors = NamedVectors::new()
            .with(
                VectorSlot::Image,
                self.embedder.embed_image(image, "image/png").await.unwrap(),
            )
            .with(
                VectorSlot::Text,
                self.embedder
                    .embed_text(&ScanRecord::embedding_text(scan_type, report))
                    .await
                    .unwrap(),
            );
        self.db.scans.create(&scan, vectors).await.unwrap();
        scan
    }

    async fn add_case(&self, report: &str, diagnosis: &str, image: &[u8]) {
        let case = KnowledgeRecord {
            id: Uuid::new_v4(),
            report_text: report.to_string(),
            diagnosis: Some(diagnosis.to_string()),
            scan_type: Some("X-Ray".to_string()),
            image_path: None,
        };
        let vectors = NamedVectors::new()
            .with(
                VectorSlot::Image,
                self.embedder.embed_image(image, "image/png").await.unwrap(),
            )
            .with(VectorSlot::Text, self.embedder.embed_text(report).await.unwrap());
        self.db.knowledge.upsert(&case, vectors).await.unwrap();
    }
}

// =============================================================================
// FETCH
// =============================================================================

#[tokio::test]
async fn test_fetch_with_no_scans_returns_not_found_message() {
    let h = harness().await;
    let reply = h
        .pipeline
        .handle(&ChatContext::new("p1", "show me my knee scan"))
        .await;
    assert_eq!(reply.intent, Intent::Fetch);
    assert_eq!(reply.message, fetch::NO_MATCH_MESSAGE);
    assert_eq!(reply.confidence, 0.7);
    assert!(reply.images.is_empty());
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test]
async fn test_fetch_returns_best_patient_scan_with_raw_score() {
    let h = harness().await;
    let knee = h
        .add_scan("p1", "Knee X-Ray", "meniscus tear medial knee", b"knee-bytes", 30)
        .await;
    h.add_scan("p1", "Chest CT", "small pulmonary nodule", b"chest-bytes", 10)
        .await;
    h.add_scan("p2", "Knee X-Ray", "meniscus tear medial knee", b"other", 1)
        .await;

    let reply = h
        .pipeline
        .handle(&ChatContext::new("p1", "show me my knee meniscus scan"))
        .await;

    assert_eq!(reply.intent, Intent::Fetch);
    assert_eq!(reply.images.len(), 1);
    assert_eq!(reply.images[0].scan_id, knee.scan_id);
    assert_eq!(reply.images[0].url, knee.file_url);
    assert!(reply.message.contains("Knee X-Ray"));
    assert!(reply.message.contains("meniscus tear"));
    assert!(reply.confidence > 0.0 && reply.confidence <= 1.0 + 1e-5);
    assert_ne!(reply.confidence, defaults::CONFIDENCE_FETCH);
    let data = reply.scan_data.unwrap();
    assert_eq!(data["scan_id"], knee.scan_id.to_string());
    assert_eq!(h.llm.call_count(), 0);
}

// =============================================================================
// COMPARE
// =============================================================================

#[tokio::test]
async fn test_compare_requires_current_scan() {
    let h = harness().await;
    let reply = h
        .pipeline
        .handle(&ChatContext::new("p1", "compare with my previous scan"))
        .await;
    assert_eq!(reply.intent, Intent::Compare);
    assert_eq!(reply.message, compare::SELECT_SCAN_MESSAGE);
    assert_eq!(reply.confidence, 0.7);
}

#[tokio::test]
async fn test_compare_with_missing_current_scan_is_not_an_error() {
    let h = harness().await;
    let reply = h
        .pipeline
        .handle(
            &ChatContext::new("p1", "compare with my previous scan")
                .with_current_scan(Uuid::new_v4()),
        )
        .await;
    assert_eq!(reply.message, compare::CURRENT_NOT_FOUND_MESSAGE);
    assert_eq!(reply.confidence, 0.7);
    assert!(reply.images.is_empty());
}

#[tokio::test]
async fn test_compare_ignores_other_patients_scans() {
    let h = harness().await;
    let current = h.add_scan("p1", "Chest X-Ray", "opacity", b"a", 0).await;
    h.add_scan("p2", "Chest X-Ray", "opacity", b"b", 100).await;

    let reply = h
        .pipeline
        .handle(
            &ChatContext::new("p1", "has it changed since last year?")
                .with_current_scan(current.scan_id),
        )
        .await;
    assert_eq!(reply.message, compare::NO_PRIOR_MESSAGE);
    assert_eq!(reply.confidence, 0.7);
}

#[tokio::test]
async fn test_compare_two_scans() {
    let h = harness().await;
    h.add_case("Right lower lobe consolidation.", "pneumonia", b"current-film")
        .await;
    h.add_case("Resolved consolidation.", "resolved", b"previous-film")
        .await;
    let previous = h
        .add_scan("p1", "Chest X-Ray", "consolidation right lower lobe", b"previous-film", 365)
        .await;
    let current = h
        .add_scan("p1", "Chest X-Ray", "follow-up film", b"current-film", 0)
        .await;

    let reply = h
        .pipeline
        .handle(
            &ChatContext::new("p1", "compare with my previous chest scan")
                .with_current_scan(current.scan_id),
        )
        .await;

    assert_eq!(reply.intent, Intent::Compare);
    assert_eq!(reply.confidence, 0.9);
    assert_eq!(reply.message, "Generated narrative.");
    assert_eq!(reply.images.len(), 2);
    assert_eq!(reply.images[0].scan_id, current.scan_id);
    assert_eq!(reply.images[0].label.as_deref(), Some("Current Scan"));
    assert_eq!(reply.images[1].scan_id, previous.scan_id);
    assert_eq!(reply.images[1].label.as_deref(), Some("Previous Scan"));

    let data = reply.scan_data.unwrap();
    assert_eq!(data["current_scan_id"], current.scan_id.to_string());
    assert_eq!(data["previous_scan_id"], previous.scan_id.to_string());

    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains(&current.scan_date));
    assert!(prompt.contains(&previous.scan_date));
    assert!(prompt.contains("compare with my previous chest scan"));
    assert!(prompt.contains("Right lower lobe consolidation."));
}

#[tokio::test]
async fn test_compare_generation_failure_discards_partial_results() {
    let h = harness_with(
        MockEmbeddingBackend::new().with_dimension(DIM),
        MockGenerationBackend::new().failing(),
    )
    .await;
    h.add_scan("p1", "MRI", "older", b"x", 50).await;
    let current = h.add_scan("p1", "MRI", "newer", b"y", 0).await;

    let reply = h
        .pipeline
        .handle(&ChatContext::new("p1", "compare these").with_current_scan(current.scan_id))
        .await;
    assert_eq!(reply.confidence, 0.5);
    assert!(reply.images.is_empty());
    assert!(reply.scan_data.is_none());
}

#[tokio::test]
async fn test_compare_knowledge_failure_after_prior_found_degrades() {
    // Only the scan collection exists, so the reference-case lookup fails
    // after both scans have been retrieved.
    let db = Database::in_memory(DIM);
    db.scans.records().ensure_collection().await.unwrap();
    let embedder = Embedder::new(Arc::new(MockEmbeddingBackend::new().with_dimension(DIM)), 2);
    let llm = MockGenerationBackend::new().with_fixed_response("Generated narrative.");
    let h = Harness {
        pipeline: ChatPipeline::new(db.clone(), embedder.clone(), Arc::new(llm.clone())),
        db,
        embedder,
        llm,
    };
    h.add_scan("p1", "CT", "baseline nodule", b"older-film", 90).await;
    let current = h.add_scan("p1", "CT", "nodule follow-up", b"newer-film", 0).await;

    let reply = h
        .pipeline
        .handle(
            &ChatContext::new("p1", "compare with my last CT").with_current_scan(current.scan_id),
        )
        .await;

    assert_eq!(reply.intent, Intent::Compare);
    assert_eq!(reply.confidence, defaults::CONFIDENCE_DEGRADED);
    assert_eq!(reply.message, defaults::DEGRADED_REPLY);
    assert!(reply.images.is_empty());
    assert!(reply.scan_data.is_none());
    assert_eq!(h.llm.call_count(), 0);
}

// =============================================================================
// DIAGNOSE
// =============================================================================

#[tokio::test]
async fn test_diagnose_by_text_uses_reference_cases() {
    let h = harness().await;
    h.add_case("Large left pleural effusion.", "effusion", b"e").await;

    let reply = h
        .pipeline
        .handle(&ChatContext::new("p1", "what could a pleural effusion mean?"))
        .await;

    assert_eq!(reply.intent, Intent::Diagnose);
    assert_eq!(reply.confidence, 0.8);
    assert_eq!(reply.message, "Generated narrative.");
    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains("Large left pleural effusion."));
    assert!(!prompt.contains("similarity"));
}

#[tokio::test]
async fn test_diagnose_by_current_scan_annotates_scores() {
    let h = harness().await;
    h.add_case("Displaced radial fracture.", "fracture", b"wrist").await;
    let scan = h.add_scan("p1", "X-Ray", "wrist pain", b"wrist", 0).await;

    let reply = h
        .pipeline
        .handle(&ChatContext::new("p1", "what is this?").with_current_scan(scan.scan_id))
        .await;

    assert_eq!(reply.confidence, 0.8);
    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains("Displaced radial fracture."));
    assert!(prompt.contains("similarity 1.00"));
}

#[tokio::test]
async fn test_diagnose_missing_scan_degrades() {
    let h = harness().await;
    let reply = h
        .pipeline
        .handle(&ChatContext::new("p1", "diagnose this").with_current_scan(Uuid::new_v4()))
        .await;
    assert_eq!(reply.intent, Intent::Diagnose);
    assert_eq!(reply.confidence, 0.5);
    assert_eq!(reply.message, defaults::DEGRADED_REPLY);
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test]
async fn test_diagnose_embedding_failure_degrades() {
    let h = harness_with(
        MockEmbeddingBackend::new().with_dimension(DIM).failing(),
        MockGenerationBackend::new(),
    )
    .await;
    let reply = h.pipeline.handle(&ChatContext::new("p1", "hello")).await;
    assert_eq!(reply.confidence, 0.5);
    assert_eq!(reply.message, defaults::DEGRADED_REPLY);
}

// =============================================================================
// ANALYZE
// =============================================================================

fn film(i: usize) -> String {
    format!("{i}{i}{i}{i}-{i}{i}{i}{i}-{i}{i}{i}{i}")
}

#[tokio::test]
async fn test_analyze_scan() {
    let h = harness().await;
    for i in 0..7 {
        h.add_case(&format!("Case report {}", i), "dx", film(i).as_bytes())
            .await;
    }
    let scan = h.add_scan("p1", "CT", "headache", film(3).as_bytes(), 0).await;

    let analyzer = ScanAnalyzer::new(h.db.clone(), Arc::new(h.llm.clone()));
    let result = analyzer.analyze(scan.scan_id).await.unwrap();

    assert_eq!(result.status, "success");
    assert_eq!(result.analysis, "Generated narrative.");
    assert_eq!(result.similar_cases.len(), 5);
    assert_eq!(result.similar_cases[0].report_text, "Case report 3");
    assert!(result.similar_cases[0].similarity >= result.similar_cases[1].similarity);
}

#[tokio::test]
async fn test_analyze_missing_scan_is_not_found() {
    let h = harness().await;
    let analyzer = ScanAnalyzer::new(h.db.clone(), Arc::new(h.llm.clone()));
    let missing = Uuid::new_v4();
    match analyzer.analyze(missing).await {
        Err(Error::ScanNotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected ScanNotFound, got {:?}", other.map(|a| a.status)),
    }
}
