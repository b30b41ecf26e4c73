//! In-process HTTP tests over the in-memory store and mock backends.

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use radmem_api::{parse_allowed_origins, router, AppState};
use radmem_db::{Database, FilesystemBackend};
use radmem_inference::mock::{MockEmbeddingBackend, MockGenerationBackend};
use radmem_inference::Embedder;

const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R', 1, 2, 3,
    4,
];
const BOUNDARY: &str = "radmem-test-boundary";

struct TestApp {
    app: Router,
    uploads: TempDir,
    history: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let embedder = Embedder::new(Arc::new(MockEmbeddingBackend::new()), 4);
        let db = Database::in_memory(embedder.dimension());
        db.ensure_collections().await.unwrap();
        let uploads = tempfile::tempdir().unwrap();
        let history = tempfile::tempdir().unwrap();
        let state = AppState::new(
            db,
            embedder,
            Arc::new(MockGenerationBackend::new().with_fixed_response("Generated answer")),
            FilesystemBackend::new(uploads.path()),
            FilesystemBackend::new(history.path()),
        );
        Self {
            app: router(state, parse_allowed_origins(""), 10 * 1024 * 1024),
            uploads,
            history,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields, file)))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn upload_scan(&self, patient: &str, notes: &str) -> Value {
        let (status, body) = self
            .multipart(
                "/upload-scan",
                &[("patient_id", patient), ("scan_type", "X-ray"), ("notes", notes)],
                Some(("chest.png", "image/png", PNG)),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body
    }
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| {
                    let path = e.path();
                    if path.is_dir() {
                        count_files(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

fn approx(value: &Value, expected: f64) -> bool {
    value.as_f64().map(|v| (v - expected).abs() < 1e-4).unwrap_or(false)
}

fn find<'a>(items: &'a Value, name: &str) -> &'a Value {
    items
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["name"] == name)
        .unwrap_or_else(|| panic!("{} not in listing {}", name, items))
}

// =============================================================================
// SCANS
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_upload_rejects_non_image_without_writing() {
    let app = TestApp::new().await;
    let (status, body) = app
        .multipart(
            "/upload-scan",
            &[("patient_id", "P1")],
            Some(("report.pdf", "application/pdf", b"%PDF-1.4")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("image"));
    assert_eq!(count_files(app.uploads.path()), 0);
}

#[tokio::test]
async fn test_upload_without_file_is_bad_request() {
    let app = TestApp::new().await;
    let (status, _) = app
        .multipart("/upload-scan", &[("patient_id", "P1")], None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_then_patient_history() {
    let app = TestApp::new().await;
    let uploaded = app.upload_scan("P1", "follow-up").await;
    assert_eq!(uploaded["success"], true);
    assert_eq!(uploaded["message"], "Scan uploaded and indexed successfully");
    let scan_id = uploaded["scan_id"].as_str().unwrap().to_string();
    let filename = uploaded["filename"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(
            Method::POST,
            "/patient-history",
            Some(json!({"patient_id": "P1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let scans = body["scans"].as_array().unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0]["id"], scan_id.as_str());
    assert_eq!(scans[0]["finding"], "follow-up");
    assert_eq!(scans[0]["has_chat_history"], false);
    assert_eq!(scans[0]["type"], "X-ray");
    assert_eq!(scans[0]["image_url"], format!("/uploads/{}", filename));

    let (status, bytes) = app
        .send(
            Request::builder()
                .uri(format!("/uploads/{}", filename))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, PNG);

    let (_, other) = app
        .json(
            Method::POST,
            "/patient-history",
            Some(json!({"patient_id": "P2"})),
        )
        .await;
    assert!(other["scans"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_save_and_get_chat_history() {
    let app = TestApp::new().await;
    let scan_id = app.upload_scan("P1", "nodule").await["scan_id"].clone();
    let messages = json!([
        {"role": "user", "content": "What is this?"},
        {"role": "assistant", "content": "A small nodule."}
    ]);

    let (status, saved) = app
        .json(
            Method::POST,
            "/save-chat",
            Some(json!({"patient_id": "P1", "scan_id": scan_id, "messages": messages})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["message_count"], 2);

    let (_, again) = app
        .json(
            Method::POST,
            "/save-chat",
            Some(json!({"patient_id": "P1", "scan_id": scan_id, "messages": messages})),
        )
        .await;
    assert_eq!(again["session_id"], saved["session_id"]);

    let (status, history) = app
        .json(
            Method::POST,
            "/get-chat-history",
            Some(json!({"patient_id": "P1", "scan_id": scan_id})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["messages"], messages);

    let (_, timeline) = app
        .json(
            Method::POST,
            "/patient-history",
            Some(json!({"patient_id": "P1"})),
        )
        .await;
    assert_eq!(timeline["scans"][0]["has_chat_history"], true);
}

#[tokio::test]
async fn test_save_chat_for_missing_scan_is_not_found() {
    let app = TestApp::new().await;
    let (status, _) = app
        .json(
            Method::POST,
            "/save-chat",
            Some(json!({
                "patient_id": "P1",
                "scan_id": "00000000-0000-4000-8000-000000000000",
                "messages": []
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_scan_report() {
    let app = TestApp::new().await;
    let scan_id = app.upload_scan("P1", "").await["scan_id"].clone();

    let (status, _) = app
        .json(
            Method::POST,
            "/update-scan-report",
            Some(json!({"scan_id": scan_id, "report_text": "No acute findings", "status": "normal"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, timeline) = app
        .json(
            Method::POST,
            "/patient-history",
            Some(json!({"patient_id": "P1"})),
        )
        .await;
    assert_eq!(timeline["scans"][0]["finding"], "No acute findings");
    assert_eq!(timeline["scans"][0]["status"], "normal");

    let (status, _) = app
        .json(
            Method::POST,
            "/update-scan-report",
            Some(json!({"scan_id": scan_id, "status": "excellent"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_missing_scan_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(
            Method::POST,
            "/analyze-scan",
            Some(json!({"scan_id": "00000000-0000-4000-8000-000000000000"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Scan not found"));
}

#[tokio::test]
async fn test_analyze_uploaded_scan() {
    let app = TestApp::new().await;
    let scan_id = app.upload_scan("P1", "opacity").await["scan_id"].clone();
    let (status, body) = app
        .json(Method::POST, "/analyze-scan", Some(json!({"scan_id": scan_id})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["analysis"], "Generated answer");
    assert!(body["similar_cases"].as_array().unwrap().is_empty());
}

// =============================================================================
// CHAT
// =============================================================================

#[tokio::test]
async fn test_chat_compare_without_scan_asks_for_one() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(
            Method::POST,
            "/chat",
            Some(json!({"patient_id": "P1", "message": "Compare with my previous scan"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "compare");
    assert!(approx(&body["confidence"], 0.7));
}

#[tokio::test]
async fn test_chat_tolerates_malformed_scan_id() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(
            Method::POST,
            "/chat",
            Some(json!({
                "patient_id": "P1",
                "message": "show me my scans",
                "current_scan_id": "not-a-uuid"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "fetch");
    assert!(body["images"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_fetch_finds_uploaded_scan() {
    let app = TestApp::new().await;
    let scan_id = app.upload_scan("P1", "chest x-ray follow-up").await["scan_id"].clone();
    let (status, body) = app
        .json(
            Method::POST,
            "/chat",
            Some(json!({"patient_id": "P1", "message": "show me my chest x-ray"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "fetch");
    assert_eq!(body["images"][0]["scan_id"], scan_id);
}

// =============================================================================
// MEDICAL HISTORY
// =============================================================================

#[tokio::test]
async fn test_history_root_lists_default_folders() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::GET, "/medical-history/P1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let items = &body["items"];
    assert_eq!(items.as_array().unwrap().len(), 4);
    for name in ["Scans", "Prescriptions", "Reports", "Lab Results"] {
        let folder = find(items, name);
        assert_eq!(folder["type"], "folder");
        assert_eq!(folder["itemCount"], 0);
    }

    // Listing again does not duplicate them.
    let (_, body) = app.json(Method::GET, "/medical-history/P1?path=", None).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_history_folder_create_conflict_and_missing_parent() {
    let app = TestApp::new().await;
    app.json(Method::GET, "/medical-history/P1", None).await;

    let create = json!({"name": "2024", "path": "Scans"});
    let (status, body) = app
        .json(Method::POST, "/medical-history/P1/folder", Some(create.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "Scans/2024");

    let (status, _) = app
        .json(Method::POST, "/medical-history/P1/folder", Some(create))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            Method::POST,
            "/medical-history/P1/folder",
            Some(json!({"name": "x", "path": "Nowhere"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            Method::POST,
            "/medical-history/P1/folder",
            Some(json!({"name": "a/b", "path": ""})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_rename_cascades_and_delete_recurses() {
    let app = TestApp::new().await;
    app.json(Method::GET, "/medical-history/P1", None).await;
    app.json(
        Method::POST,
        "/medical-history/P1/folder",
        Some(json!({"name": "2024", "path": "Scans"})),
    )
    .await;
    let (status, file) = app
        .multipart(
            "/medical-history/P1/upload",
            &[("patient_id", "P1"), ("file_type", "scan"), ("path", "Scans/2024")],
            Some(("knee.png", "image/png", PNG)),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", file);
    assert_eq!(file["path"], "Scans/2024/knee.png");
    assert_eq!(count_files(app.history.path()), 1);

    let (_, root) = app.json(Method::GET, "/medical-history/P1", None).await;
    let scans = find(&root["items"], "Scans");
    assert_eq!(scans["itemCount"], 2);
    let scans_id = scans["id"].as_str().unwrap().to_string();

    let (status, renamed) = app
        .json(
            Method::PATCH,
            &format!("/medical-history/P1/item/{}/rename", scans_id),
            Some(json!({"name": "Imaging"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["path"], "Imaging");

    let (status, nested) = app
        .json(Method::GET, "/medical-history/P1?path=Imaging%2F2024", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let knee = find(&nested["items"], "knee.png");
    assert_eq!(knee["path"], "Imaging/2024/knee.png");
    assert_eq!(knee["fileType"], "scan");
    assert_eq!(knee["mimeType"], "image/png");

    let (status, _) = app
        .json(Method::GET, "/medical-history/P1?path=Scans", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, downloaded) = app
        .send(
            Request::builder()
                .uri(format!(
                    "/medical-history/P1/download/{}",
                    knee["id"].as_str().unwrap()
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(downloaded, PNG);

    let (status, deleted) = app
        .json(
            Method::DELETE,
            &format!("/medical-history/P1/item/{}", scans_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], 3);
    assert_eq!(count_files(app.history.path()), 0);

    let (_, root) = app.json(Method::GET, "/medical-history/P1", None).await;
    assert_eq!(root["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_history_ownership_is_enforced() {
    let app = TestApp::new().await;
    let (_, root) = app.json(Method::GET, "/medical-history/P1", None).await;
    let reports_id = find(&root["items"], "Reports")["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = app
        .json(
            Method::PATCH,
            &format!("/medical-history/P2/item/{}/rename", reports_id),
            Some(json!({"name": "Mine"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/medical-history/P2/item/{}", reports_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(
            Method::GET,
            &format!("/medical-history/P1/download/{}", reports_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// PATIENTS
// =============================================================================

#[tokio::test]
async fn test_register_is_stable_per_email() {
    let app = TestApp::new().await;
    let (status, first) = app
        .json(
            Method::POST,
            "/patients/register",
            Some(json!({"email": "jane@example.com", "metadata": {"name": "Jane"}})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = app
        .json(
            Method::POST,
            "/patients/register",
            Some(json!({"email": "jane@example.com"})),
        )
        .await;
    assert_eq!(first["patient_id"], second["patient_id"]);
    assert_eq!(first["registered_at"], second["registered_at"]);

    let (status, _) = app
        .json(
            Method::POST,
            "/patients/register",
            Some(json!({"email": "not-an-email"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
