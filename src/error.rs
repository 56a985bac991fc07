use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the piiguard library.
#[derive(Debug, Error)]
pub enum PiiGuardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config references unset environment variable: {0}")]
    ConfigEnvVar(String),

    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    #[error("Invalid route pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Classifier returned a malformed response: {0}")]
    ClassifierMalformed(String),

    #[error("Failed to remove staged upload {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Request payload error: {0}")]
    Payload(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl PiiGuardError {
    /// True for failures of the external classifier, which enforcement treats
    /// as fail-open rather than as a clean negative result.
    pub fn is_classifier_failure(&self) -> bool {
        matches!(
            self,
            PiiGuardError::ClassifierUnavailable(_) | PiiGuardError::ClassifierMalformed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PiiGuardError>;
