//! Standalone PII check endpoint.
//!
//! `POST /api/pii/check` with `{ "text": "..." }` reports what the classifier
//! found without enforcing anything. When the classifier is unreachable the
//! endpoint still answers `200` with no detections and a warning.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classifier::{Classifier, DetectedEntity};

pub const CHECK_PATH: &str = "/api/pii/check";
pub const UNAVAILABLE_WARNING: &str = "PII detection service unavailable";

#[derive(Clone)]
pub struct CheckState {
    pub classifier: Arc<dyn Classifier>,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// One detection as reported to callers.
#[derive(Debug, Serialize)]
pub struct CheckedEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub confidence: f64,
}

impl From<DetectedEntity> for CheckedEntity {
    fn from(e: DetectedEntity) -> Self {
        let kind = if e.entity_type.is_empty() {
            "unknown".to_string()
        } else {
            e.entity_type
        };
        Self {
            kind,
            value: e.value,
            confidence: e.confidence,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub success: bool,
    #[serde(rename = "hasPII")]
    pub has_pii: bool,
    #[serde(rename = "piiCount")]
    pub pii_count: usize,
    #[serde(rename = "detectedPII")]
    pub detected_pii: Vec<CheckedEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

impl CheckResponse {
    fn found(entities: Vec<DetectedEntity>) -> Self {
        let detected_pii: Vec<CheckedEntity> = entities.into_iter().map(Into::into).collect();
        Self {
            success: true,
            has_pii: !detected_pii.is_empty(),
            pii_count: detected_pii.len(),
            detected_pii,
            warning: None,
        }
    }

    fn unavailable() -> Self {
        Self {
            warning: Some(UNAVAILABLE_WARNING),
            ..Self::found(Vec::new())
        }
    }
}

pub fn check_router(state: CheckState) -> Router {
    Router::new()
        .route(CHECK_PATH, post(check_text))
        .with_state(state)
}

/// `POST /api/pii/check`
async fn check_text(
    State(state): State<CheckState>,
    body: std::result::Result<Json<CheckRequest>, JsonRejection>,
) -> Response {
    let text = body
        .ok()
        .and_then(|Json(req)| req.text)
        .filter(|t| !t.is_empty());
    let Some(text) = text else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Text is required" })),
        )
            .into_response();
    };

    match state.classifier.classify(&text, state.timeout).await {
        Ok(entities) => Json(CheckResponse::found(entities)).into_response(),
        Err(e) => {
            warn!(classifier = state.classifier.name(), error = %e, "PII check failed; reporting no detections");
            Json(CheckResponse::unavailable()).into_response()
        }
    }
}
