//! TOML configuration types for piiguard.
//!
//! The top-level [`AppConfig`] is deserialized from `piiguard.toml` and holds
//! the listener settings, the classifier endpoint, the ordered list of
//! inspection rules, and the endpoints covered by the fixed sensitive-type
//! guard.
//!
//! # Example `piiguard.toml`
//!
//! ```toml
//! [classifier]
//! url = "http://localhost:12423/anonymize"
//! timeout_ms = 5000
//!
//! [[routes]]
//! method = "POST"
//! path = "/api/posts"
//! fields = ["caption"]
//! check_type = ["US_SSN", "DATE_TIME_DOB"]
//! action = "warn"
//! ```
//!
//! A configuration is loaded once at startup and never mutated afterwards.
//! Loading is all-or-nothing: a parse error, an unset environment variable or
//! an invalid rule fails the whole load.

use std::path::Path;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::matcher::RoutePattern;
use crate::error::{PiiGuardError, Result};

/// Timeout applied to classifier calls when neither the rule nor the
/// `[classifier]` section overrides it.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Enforcement mode of an inspection rule once a blocked type is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Reject with a warning; the client may resubmit with a bypass signal.
    Warn,
    /// Pretend success and drop the content.
    #[default]
    Block,
    /// Reject with a warning, but a resubmission is rejected again.
    Both,
}

impl Action {
    /// Wire name used in the `actionType` field of rejection responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Warn => "warn",
            Action::Block => "block",
            Action::Both => "both",
        }
    }
}

/// Listener settings (`[server]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address the gateway listens on.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Base URL of the application that receives allowed requests.
    #[serde(default)]
    pub upstream: Option<String>,
    /// Largest body that is buffered for inspection. Larger bodies on an
    /// inspected endpoint are rejected with 413.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            upstream: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

/// External classifier endpoint (`[classifier]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// Full URL of the classification endpoint.
    pub url: String,
    /// Default per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Language sent with every classification request.
    #[serde(default = "default_language")]
    pub language: String,
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_language() -> String {
    "en".to_string()
}

/// A single inspection rule (`[[routes]]` entry).
///
/// Several rules may match the same method and path; each is evaluated on its
/// own and each can veto the request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteRule {
    /// Optional label used in log lines.
    #[serde(default)]
    pub name: Option<String>,
    /// HTTP method, compared case-insensitively.
    pub method: String,
    /// Path pattern; `:name` segments match any single path segment.
    pub path: String,
    /// Payload fields whose text is inspected, in order.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Entity types that trigger enforcement. Empty means detection only.
    #[serde(default, alias = "blocked_types")]
    pub check_type: Vec<String>,
    #[serde(default)]
    pub action: Action,
    /// Per-rule classifier timeout override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RouteRule {
    /// Label for log lines: the rule name, or `METHOD path`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} {}", self.method.to_uppercase(), self.path),
        }
    }
}

/// An endpoint covered by the fixed sensitive-type guard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardRoute {
    pub method: String,
    pub path: String,
}

/// Fixed sensitive-type guard wiring (`[guard]` section).
///
/// Only the set of endpoints is configurable. The inspected fields, the
/// category list and the always-silent blocking are fixed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub routes: Vec<GuardRoute>,
}

/// Top-level application configuration deserialized from `piiguard.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub classifier: ClassifierConfig,
    /// Inspection rules in declaration order.
    #[serde(default)]
    pub routes: Vec<RouteRule>,
    #[serde(default)]
    pub guard: GuardConfig,
}

impl AppConfig {
    /// Load, substitute environment variables, parse and validate the
    /// configuration file at `path`.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let content = substitute_env_vars(&content)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text (no environment substitution).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every rule and setting; the first problem found is returned.
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.classifier.url).map_err(|e| {
            PiiGuardError::ConfigInvalid(format!(
                "classifier url {:?}: {}",
                self.classifier.url, e
            ))
        })?;
        if self.classifier.timeout_ms == 0 {
            return Err(PiiGuardError::ConfigInvalid(
                "classifier timeout_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(upstream) = &self.server.upstream {
            reqwest::Url::parse(upstream).map_err(|e| {
                PiiGuardError::ConfigInvalid(format!("upstream url {:?}: {}", upstream, e))
            })?;
        }

        for (i, rule) in self.routes.iter().enumerate() {
            check_route(&rule.method, &rule.path)
                .map_err(|e| PiiGuardError::ConfigInvalid(format!("routes[{}]: {}", i, e)))?;
            if rule.timeout_ms == Some(0) {
                return Err(PiiGuardError::ConfigInvalid(format!(
                    "routes[{}]: timeout_ms must be greater than zero",
                    i
                )));
            }
            RoutePattern::compile(&rule.path)?;
        }

        for (i, route) in self.guard.routes.iter().enumerate() {
            check_route(&route.method, &route.path)
                .map_err(|e| PiiGuardError::ConfigInvalid(format!("guard.routes[{}]: {}", i, e)))?;
            RoutePattern::compile(&route.path)?;
        }

        Ok(())
    }
}

fn check_route(method: &str, path: &str) -> std::result::Result<(), String> {
    if method.trim().is_empty() {
        return Err("method must not be empty".to_string());
    }
    if !path.starts_with('/') {
        return Err(format!("path {:?} must start with '/'", path));
    }
    Ok(())
}

/// Replace `${VAR_NAME}` and `$VAR_NAME` placeholders with environment variable values.
///
/// The bare form only matches uppercase names. Returns an error naming the
/// first variable that is not set.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Z_][A-Z0-9_]*)")?;

    let mut missing: Option<String> = None;
    let output = re.replace_all(input, |caps: &Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(PiiGuardError::ConfigEnvVar(name)),
        None => Ok(output.into_owned()),
    }
}
