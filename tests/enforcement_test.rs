//! End-to-end enforcement through an embedded axum application.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt as _;

use piiguard::classifier::{Classifier, DetectedEntity};
use piiguard::enforce::cleanup::{FsUploadStore, StagedUpload};
use piiguard::enforce::outcome::WARNING_MESSAGE;
use piiguard::error::{PiiGuardError, Result};
use piiguard::policy::config::AppConfig;
use piiguard::web::{protect, Services};

/// Reports entities for a few recognizable substrings.
struct KeywordClassifier {
    calls: AtomicUsize,
    fail: bool,
}

impl KeywordClassifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str, _timeout: Duration) -> Result<Vec<DetectedEntity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PiiGuardError::ClassifierUnavailable("connection refused".into()));
        }
        let mut found = Vec::new();
        if text.contains("a@b.co") {
            found.push(DetectedEntity::new("EMAIL_ADDRESS", "a@b.co", 0.95));
        }
        if text.contains("123-45-6789") {
            found.push(DetectedEntity::new("US_SSN", "123-45-6789", 0.85));
        }
        if text.contains("4111111111111111") {
            found.push(DetectedEntity::new("CREDIT_CARD_NUMBER", "4111111111111111", 0.99));
        }
        Ok(found)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

const CONFIG: &str = r#"
[classifier]
url = "http://127.0.0.1:9/analyze"

[[routes]]
name = "post-caption"
method = "POST"
path = "/api/posts"
fields = ["caption"]
check_type = ["EMAIL ADDRESS"]
action = "warn"

[[routes]]
name = "post-comment"
method = "POST"
path = "/api/posts/:id/comment"
fields = ["text"]
check_type = ["EMAIL ADDRESS"]
action = "both"

[[routes]]
name = "message-ssn"
method = "POST"
path = "/api/messages"
fields = ["content"]
check_type = ["US SSN"]
action = "block"

[[routes]]
name = "message-email"
method = "POST"
path = "/api/messages"
fields = ["content"]
check_type = ["EMAIL ADDRESS"]
action = "warn"

[[guard.routes]]
method = "POST"
path = "/api/posts"
"#;

/// Counts how many requests reached the host handlers.
#[derive(Clone, Default)]
struct Stored(Arc<AtomicUsize>);

impl Stored {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

async fn store(State(stored): State<Stored>, Json(body): Json<Value>) -> Json<Value> {
    stored.0.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "success": true, "stored": body }))
}

fn services(classifier: Arc<KeywordClassifier>) -> Services {
    services_from(CONFIG, classifier)
}

fn services_from(config: &str, classifier: Arc<KeywordClassifier>) -> Services {
    let config = AppConfig::from_toml_str(config).unwrap();
    Services::new(config, classifier, Arc::new(FsUploadStore)).unwrap()
}

fn host_app(services: &Services, stored: Stored) -> Router {
    let app = Router::new()
        .route("/api/posts", post(store))
        .route("/api/posts/:id/comment", post(store))
        .route("/api/messages", post(store))
        .with_state(stored);
    protect(app, services)
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn clean_caption_is_stored_with_body_intact() {
    let classifier = KeywordClassifier::new();
    let stored = Stored::default();
    let app = host_app(&services(classifier.clone()), stored.clone());

    let (status, json) = send(
        app,
        json_request("/api/posts", json!({ "caption": "sunset at the beach" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stored"]["caption"], "sunset at the beach");
    assert_eq!(stored.count(), 1);
    // rule + guard
    assert_eq!(classifier.calls(), 2);
}

#[tokio::test]
async fn warn_rule_rejects_then_accepts_bypass() {
    let classifier = KeywordClassifier::new();
    let stored = Stored::default();
    let services = services(classifier);

    let (status, json) = send(
        host_app(&services, stored.clone()),
        json_request("/api/posts", json!({ "caption": "mail me a@b.co" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], WARNING_MESSAGE);
    assert_eq!(json["piiDetected"], true);
    assert_eq!(json["actionType"], "warn");
    assert_eq!(stored.count(), 0);

    let (status, json) = send(
        host_app(&services, stored.clone()),
        json_request(
            "/api/posts",
            json!({ "caption": "mail me a@b.co", "bypassPIIWarning": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stored"]["caption"], "mail me a@b.co");
    assert_eq!(stored.count(), 1);
}

#[tokio::test]
async fn bypass_header_is_accepted_for_warn() {
    let stored = Stored::default();
    let app = host_app(&services(KeywordClassifier::new()), stored.clone());

    let mut req = json_request("/api/posts", json!({ "caption": "a@b.co" }));
    req.headers_mut()
        .insert("x-pii-bypass", "true".parse().unwrap());
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored.count(), 1);
}

#[tokio::test]
async fn both_rule_ignores_bypass() {
    let stored = Stored::default();
    let app = host_app(&services(KeywordClassifier::new()), stored.clone());

    let (status, json) = send(
        app,
        json_request(
            "/api/posts/42/comment",
            json!({ "text": "reach me at a@b.co", "bypassPIIWarning": "true" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["actionType"], "both");
    assert_eq!(stored.count(), 0);
}

#[tokio::test]
async fn block_rule_fakes_success_and_removes_staged_upload() {
    let dir = tempfile::tempdir().unwrap();
    let upload: PathBuf = dir.path().join("attachment.png");
    std::fs::write(&upload, b"not really a png").unwrap();

    let classifier = KeywordClassifier::new();
    let stored = Stored::default();
    let app = host_app(&services(classifier.clone()), stored.clone());

    let mut req = json_request("/api/messages", json!({ "content": "ssn 123-45-6789" }));
    req.extensions_mut().insert(StagedUpload(upload.clone()));
    let (status, json) = send(app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "success": true }));
    assert_eq!(stored.count(), 0);
    assert!(!upload.exists());
    // the email rule after the blocking SSN rule never runs
    assert_eq!(classifier.calls(), 1);
}

#[tokio::test]
async fn later_rule_can_still_block() {
    let classifier = KeywordClassifier::new();
    let stored = Stored::default();
    let app = host_app(&services(classifier.clone()), stored.clone());

    let (status, json) = send(
        app,
        json_request("/api/messages", json!({ "content": "write to a@b.co" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["actionType"], "warn");
    assert_eq!(classifier.calls(), 2);
}

#[tokio::test]
async fn guard_drops_credit_card_despite_bypass() {
    let stored = Stored::default();
    let app = host_app(&services(KeywordClassifier::new()), stored.clone());

    let (status, json) = send(
        app,
        json_request(
            "/api/posts",
            json!({ "caption": "card 4111111111111111", "bypassPIIWarning": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "success": true }));
    assert_eq!(stored.count(), 0);
}

#[tokio::test]
async fn classifier_outage_fails_open() {
    let classifier = KeywordClassifier::failing();
    let stored = Stored::default();
    let app = host_app(&services(classifier.clone()), stored.clone());

    let (status, _) = send(
        app,
        json_request("/api/posts", json!({ "caption": "ssn 123-45-6789 a@b.co" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored.count(), 1);
    assert_eq!(classifier.calls(), 2);
}

#[tokio::test]
async fn media_only_submission_skips_classifier() {
    let classifier = KeywordClassifier::new();
    let stored = Stored::default();
    let app = host_app(&services(classifier.clone()), stored.clone());

    let (status, _) = send(
        app,
        json_request("/api/posts", json!({ "caption": "   ", "media": "a.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored.count(), 1);
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn unmatched_routes_are_untouched() {
    let classifier = KeywordClassifier::new();
    let stored = Stored::default();
    let services = services(classifier.clone());
    let app = protect(
        Router::new()
            .route("/api/profile", post(store))
            .with_state(stored.clone()),
        &services,
    );

    let (status, _) = send(app, json_request("/api/profile", json!({ "bio": "a@b.co" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored.count(), 1);
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn rules_match_inside_nested_routers() {
    let classifier = KeywordClassifier::new();
    let stored = Stored::default();
    let services = services(classifier.clone());

    let comments = protect(
        Router::new()
            .route("/:id/comment", post(store))
            .with_state(stored.clone()),
        &services,
    );
    let app = Router::new().nest("/api/posts", comments);

    let (status, json) = send(
        app,
        json_request("/api/posts/7/comment", json!({ "text": "a@b.co" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["actionType"], "both");
    assert_eq!(stored.count(), 0);
}

#[tokio::test]
async fn oversized_body_is_rejected_before_the_handler() {
    let classifier = KeywordClassifier::new();
    let stored = Stored::default();
    let config = format!("[server]\nmax_body_bytes = 256\n{}", CONFIG);
    let app = host_app(&services_from(&config, classifier.clone()), stored.clone());

    let body = json!({ "caption": format!("card 4111111111111111{}", " ".repeat(400)) });
    let mut req = json_request("/api/posts", body.clone());
    req.headers_mut().insert(
        "content-length",
        body.to_string().len().to_string().parse().unwrap(),
    );
    let (status, json) = send(app, req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"], "Request body could not be read");
    assert_eq!(stored.count(), 0);
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn small_body_under_a_tight_limit_is_still_inspected() {
    let classifier = KeywordClassifier::new();
    let stored = Stored::default();
    let config = format!("[server]\nmax_body_bytes = 256\n{}", CONFIG);
    let app = host_app(&services_from(&config, classifier.clone()), stored.clone());

    let (status, json) = send(
        app,
        json_request("/api/posts", json!({ "caption": "card 4111111111111111" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "success": true }));
    assert_eq!(stored.count(), 0);
}

#[tokio::test]
async fn guard_fields_cannot_be_narrowed_by_configuration() {
    let stored = Stored::default();
    let config = CONFIG.replace(
        "[[guard.routes]]",
        "[guard]\nfields = [\"title\"]\n\n[[guard.routes]]",
    );
    let app = host_app(
        &services_from(&config, KeywordClassifier::new()),
        stored.clone(),
    );

    let (status, json) = send(
        app,
        json_request("/api/posts", json!({ "caption": "card 4111111111111111" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "success": true }));
    assert_eq!(stored.count(), 0);
}
