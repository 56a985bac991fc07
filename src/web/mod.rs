//! HTTP surface of the gateway.
//!
//! - `GET  /health`         : liveness probe
//! - `POST /api/pii/check`  : report detections for a piece of text
//! - anything else          : rule enforcement, then the sensitive-type guard,
//!   then the wrapped service (normally the upstream forwarder)

pub mod check;

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tower::Service;

use crate::classifier::http::HttpClassifier;
use crate::classifier::Classifier;
use crate::enforce::cleanup::{FsUploadStore, UploadStore};
use crate::enforce::middleware::{enforce_guard, enforce_rules, GuardLayerState, RuleLayerState};
use crate::enforce::Enforcer;
use crate::error::Result;
use crate::guard::SensitiveTypeGuard;
use crate::policy::config::AppConfig;

/// Everything the enforcement layers and handlers share, built once from the
/// loaded configuration.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<AppConfig>,
    pub classifier: Arc<dyn Classifier>,
    pub enforcer: Arc<Enforcer>,
    pub guard: Arc<SensitiveTypeGuard>,
    pub uploads: Arc<dyn UploadStore>,
}

impl Services {
    pub fn new(
        config: AppConfig,
        classifier: Arc<dyn Classifier>,
        uploads: Arc<dyn UploadStore>,
    ) -> Result<Self> {
        let enforcer = Enforcer::from_config(&config, classifier.clone())?;
        let guard = SensitiveTypeGuard::new(&config.guard, classifier.clone())?;
        Ok(Self {
            config: Arc::new(config),
            classifier,
            enforcer: Arc::new(enforcer),
            guard: Arc::new(guard),
            uploads,
        })
    }

    /// Production wiring: HTTP classifier and filesystem upload store.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let classifier: Arc<dyn Classifier> =
            Arc::new(HttpClassifier::from_config(&config.classifier));
        Self::new(config, classifier, Arc::new(FsUploadStore))
    }

    pub fn rule_layer_state(&self) -> RuleLayerState {
        RuleLayerState {
            enforcer: self.enforcer.clone(),
            uploads: self.uploads.clone(),
            max_body_bytes: self.config.server.max_body_bytes,
        }
    }

    pub fn guard_layer_state(&self) -> GuardLayerState {
        GuardLayerState {
            guard: self.guard.clone(),
            uploads: self.uploads.clone(),
            max_body_bytes: self.config.server.max_body_bytes,
        }
    }

    pub fn check_state(&self) -> check::CheckState {
        check::CheckState {
            classifier: self.classifier.clone(),
            timeout: self.config.classifier.timeout(),
        }
    }
}

/// Wrap `app` with both enforcement layers. Rules run first, the guard second.
pub fn protect(app: Router, services: &Services) -> Router {
    app.layer(middleware::from_fn_with_state(
        services.guard_layer_state(),
        enforce_guard,
    ))
    .layer(middleware::from_fn_with_state(
        services.rule_layer_state(),
        enforce_rules,
    ))
}

/// Full gateway router: health and check endpoints plus the protected
/// `inner` service for everything else.
pub fn router<S>(services: &Services, inner: S) -> Router
where
    S: Service<Request, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse + 'static,
    S::Future: Send + 'static,
{
    let gateway = protect(Router::new().fallback_service(inner), services);
    Router::new()
        .route("/health", get(health))
        .merge(check::check_router(services.check_state()))
        .fallback_service(gateway)
}

/// `GET /health`
async fn health() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DetectedEntity;
    use crate::policy::config::AppConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use serde_json::Value;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt as _;

    struct ListClassifier {
        entities: Vec<DetectedEntity>,
        calls: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl Classifier for ListClassifier {
        async fn classify(&self, _text: &str, _timeout: Duration) -> Result<Vec<DetectedEntity>> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.entities.clone())
        }

        fn name(&self) -> &str {
            "list"
        }
    }

    const CONFIG: &str = r#"
[classifier]
url = "http://127.0.0.1:9/analyze"

[[routes]]
method = "POST"
path = "/api/posts"
fields = ["caption"]
check_type = ["EMAIL ADDRESS"]
action = "warn"
"#;

    fn services(entities: Vec<DetectedEntity>) -> (Services, Arc<ListClassifier>) {
        let classifier = Arc::new(ListClassifier {
            entities,
            calls: Mutex::new(0),
        });
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let services = Services::new(config, classifier.clone(), Arc::new(FsUploadStore)).unwrap();
        (services, classifier)
    }

    fn app(services: &Services) -> Router {
        let inner = Router::new().route("/api/posts", post(|| async { "created" }));
        router(services, inner)
    }

    async fn send(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (services, _) = services(vec![]);
        let (status, body) = send(app(&services), "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn clean_post_reaches_inner_service() {
        let (services, classifier) = services(vec![]);
        let (status, body) = send(app(&services), "POST", "/api/posts", r#"{"caption":"hi"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"created");
        assert_eq!(*classifier.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn warn_rule_blocks_before_inner_service() {
        let (services, _) = services(vec![DetectedEntity::new("EMAIL_ADDRESS", "a@b.co", 0.9)]);
        let (status, body) =
            send(app(&services), "POST", "/api/posts", r#"{"caption":"a@b.co"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["piiDetected"], true);
        assert_eq!(json["actionType"], "warn");
    }

    #[tokio::test]
    async fn check_endpoint_is_not_enforced() {
        let (services, _) = services(vec![DetectedEntity::new("EMAIL_ADDRESS", "a@b.co", 0.9)]);
        let (status, body) =
            send(app(&services), "POST", "/api/pii/check", r#"{"text":"a@b.co"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["hasPII"], true);
    }
}
