//! External text classifier contract.
//!
//! The classifier is a black-box service that takes `{ text, language }` and
//! answers `{ detected_pii: [{ entity_type, value, confidence }] }`. The
//! [`Classifier`] trait abstracts over the transport; [`http::HttpClassifier`]
//! is the production implementation.
//!
//! A failed call is always an error ([`PiiGuardError::ClassifierUnavailable`]
//! or [`PiiGuardError::ClassifierMalformed`]), never an empty result, so
//! callers fail open explicitly.
//!
//! [`PiiGuardError::ClassifierUnavailable`]: crate::error::PiiGuardError::ClassifierUnavailable
//! [`PiiGuardError::ClassifierMalformed`]: crate::error::PiiGuardError::ClassifierMalformed

pub mod http;

use std::time::Duration;

use serde_json::Value;

use crate::error::Result;

/// One entity reported by the classifier for an inspection text.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedEntity {
    pub entity_type: String,
    pub value: String,
    pub confidence: f64,
}

impl DetectedEntity {
    pub fn new(entity_type: impl Into<String>, value: impl Into<String>, confidence: f64) -> Self {
        Self {
            entity_type: entity_type.into(),
            value: value.into(),
            confidence,
        }
    }
}

/// Trait for text classification backends.
///
/// Implementations must be `Send + Sync` for use across async tasks and must
/// give up after `timeout`.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Classify `text`, returning detected entities in classifier order.
    async fn classify(&self, text: &str, timeout: Duration) -> Result<Vec<DetectedEntity>>;
    /// Return the backend name (e.g., `"http"`).
    fn name(&self) -> &str;
}

/// Extract entities from a decoded classifier response body.
///
/// A missing or non-array `detected_pii` is an empty list. Entries that are
/// not objects are skipped; missing entry fields default to `""` / `0.0`.
pub fn parse_detected(body: &Value) -> Vec<DetectedEntity> {
    let Some(items) = body.get("detected_pii").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| DetectedEntity {
            entity_type: item
                .get("entity_type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            value: item
                .get("value")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            confidence: item
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        })
        .collect()
}
