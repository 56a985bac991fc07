use std::time::Duration;

use tracing::debug;

use crate::classifier::{parse_detected, Classifier, DetectedEntity};
use crate::error::{PiiGuardError, Result};
use crate::policy::config::ClassifierConfig;

/// Calls the classification service over HTTP (`POST { text, language }`).
pub struct HttpClassifier {
    url: String,
    language: String,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(url: String, language: String) -> Self {
        Self {
            url,
            language,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.url.clone(), config.language.clone())
    }

    async fn call(&self, text: &str, timeout: Duration) -> Result<Vec<DetectedEntity>> {
        let resp = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(&serde_json::json!({
                "text": text,
                "language": self.language,
            }))
            .send()
            .await
            .map_err(|e| PiiGuardError::ClassifierUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PiiGuardError::ClassifierUnavailable(format!(
                "classifier answered {}",
                status
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PiiGuardError::ClassifierUnavailable(e.to_string()))?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| PiiGuardError::ClassifierMalformed(e.to_string()))?;

        let entities = parse_detected(&body);
        debug!(url = %self.url, count = entities.len(), "classifier responded");
        Ok(entities)
    }
}

#[async_trait::async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str, timeout: Duration) -> Result<Vec<DetectedEntity>> {
        // reqwest's own timeout covers the exchange; this bounds the whole call.
        match tokio::time::timeout(timeout, self.call(text, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(PiiGuardError::ClassifierUnavailable(format!(
                "timed out after {} ms",
                timeout.as_millis()
            ))),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
