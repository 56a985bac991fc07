//! Fixed sensitive-type guard.
//!
//! A second enforcement pass, independent of the `[[routes]]` rules, that
//! silently drops submissions containing a fixed set of highly sensitive
//! categories (government identifiers, payment cards, bank accounts).
//!
//! Unlike the configurable rules it:
//!
//! - uses a built-in category list and a built-in set of candidate text
//!   fields that configuration cannot change,
//! - matches loosely: the detected type and a category match when either
//!   contains the other, after converting underscores to spaces and
//!   uppercasing,
//! - always answers with a silent block and ignores any bypass signal,
//! - uses a fixed classifier timeout.
//!
//! Loose matching over-matches short categories such as `SSN` or `IBAN`
//! against longer unrelated labels that happen to contain them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::classifier::{Classifier, DetectedEntity};
use crate::enforce::extract::first_text;
use crate::enforce::{RequestContext, SECURITY_TARGET};
use crate::error::Result;
use crate::policy::config::GuardConfig;
use crate::policy::evaluator::EnforcementOutcome;
use crate::policy::matcher::{RequestPaths, RouteTable};

/// Classifier timeout for guard checks.
pub const GUARD_TIMEOUT: Duration = Duration::from_millis(5000);

/// Candidate text fields in priority order; the first non-blank one is checked.
pub const GUARD_FIELDS: &[&str] = &["caption", "text"];

/// Categories that are always blocked, in their spaced spelling.
pub const SENSITIVE_CATEGORIES: &[&str] = &[
    "US SSN",
    "SSN",
    "SOCIAL SECURITY NUMBER",
    "CREDIT CARD",
    "CREDIT CARD NUMBER",
    "IBAN CODE",
    "IBAN",
    "US PASSPORT",
    "PASSPORT",
    "US DRIVER LICENSE",
    "DRIVER LICENSE",
    "DRIVERS LICENSE",
    "DRIVER'S LICENSE",
];

/// Guard spelling of an entity type: underscores become spaces, uppercased.
pub fn guard_label(entity_type: &str) -> String {
    entity_type.replace('_', " ").to_uppercase()
}

/// The sensitive category `entity_type` falls under, if any.
///
/// Blank types never match; every category would contain them.
pub fn sensitive_category(entity_type: &str) -> Option<&'static str> {
    let label = guard_label(entity_type);
    if label.trim().is_empty() {
        return None;
    }
    SENSITIVE_CATEGORIES
        .iter()
        .copied()
        .find(|category| label.contains(category) || category.contains(label.as_str()))
}

/// First detected entity falling under a sensitive category.
pub fn first_sensitive(entities: &[DetectedEntity]) -> Option<(&DetectedEntity, &'static str)> {
    entities
        .iter()
        .find_map(|e| sensitive_category(&e.entity_type).map(|c| (e, c)))
}

/// Runs the fixed sensitive-type check on the endpoints it is wired to.
pub struct SensitiveTypeGuard {
    routes: RouteTable,
    classifier: Arc<dyn Classifier>,
}

impl SensitiveTypeGuard {
    pub fn new(config: &GuardConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let routes = RouteTable::compile(
            config
                .routes
                .iter()
                .map(|r| (r.method.as_str(), r.path.as_str())),
        )?;
        Ok(Self { routes, classifier })
    }

    /// Whether the guard covers this endpoint.
    pub fn applies(&self, method: &str, paths: &RequestPaths) -> bool {
        self.routes.is_match(method, paths)
    }

    /// Check the request text. Returns `SilentBlock` on the first sensitive
    /// detection and `Allow` otherwise, including when the classifier fails.
    pub async fn inspect(&self, ctx: &RequestContext) -> EnforcementOutcome {
        let Some(text) = first_text(&ctx.payload, GUARD_FIELDS) else {
            // Media-only submissions have nothing to inspect.
            return EnforcementOutcome::Allow;
        };

        let entities = match self.classifier.classify(&text, GUARD_TIMEOUT).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(
                    target: SECURITY_TARGET,
                    method = %ctx.method,
                    path = %ctx.paths.display(),
                    error = %e,
                    "PII check service unavailable, allowing request through"
                );
                return EnforcementOutcome::Allow;
            }
        };

        match first_sensitive(&entities) {
            Some((entity, category)) => {
                warn!(
                    target: SECURITY_TARGET,
                    method = %ctx.method,
                    path = %ctx.paths.display(),
                    entity_type = %guard_label(&entity.entity_type),
                    category,
                    user = ctx.user_label(),
                    "blocked post/comment containing sensitive PII"
                );
                EnforcementOutcome::SilentBlock
            }
            None => {
                debug!(path = %ctx.paths.display(), detected = entities.len(), "guard passed");
                EnforcementOutcome::Allow
            }
        }
    }
}
