//! Configurable rule enforcement.
//!
//! [`Enforcer`] runs every inspection rule matching a request, in declaration
//! order: extract the rule's fields, classify the text, and let
//! [`evaluator::decide`] pick an outcome. The first blocking outcome ends the
//! evaluation; later rules never reach the classifier.
//!
//! Classifier failures fail open for the rule that hit them and are logged as
//! such, separately from clean results.
//!
//! The axum glue lives in [`middleware`], response bodies in [`outcome`], and
//! upload removal in [`cleanup`].

pub mod cleanup;
pub mod extract;
pub mod middleware;
pub mod outcome;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::error::Result;
use crate::policy::config::{AppConfig, RouteRule};
use crate::policy::evaluator::{self, EnforcementOutcome, Reason, RuleDecision};
use crate::policy::matcher::{RequestPaths, RouteTable};

/// Log target for security-relevant enforcement events.
pub const SECURITY_TARGET: &str = "piiguard::security";

/// Request extension naming the authenticated user, inserted by the host's
/// auth layer. Only used to annotate log lines.
#[derive(Debug, Clone)]
pub struct ActingIdentity(pub String);

/// Everything enforcement needs to know about one inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub paths: RequestPaths,
    pub payload: Value,
    pub bypass: bool,
    pub user: Option<String>,
}

impl RequestContext {
    pub fn user_label(&self) -> &str {
        self.user.as_deref().unwrap_or("anonymous")
    }
}

/// Evaluates the configured inspection rules against requests.
pub struct Enforcer {
    rules: Vec<RouteRule>,
    table: RouteTable,
    classifier: Arc<dyn Classifier>,
    default_timeout: Duration,
}

impl Enforcer {
    pub fn new(
        rules: Vec<RouteRule>,
        classifier: Arc<dyn Classifier>,
        default_timeout: Duration,
    ) -> Result<Self> {
        let table = RouteTable::compile(rules.iter().map(|r| (r.method.as_str(), r.path.as_str())))?;
        Ok(Self {
            rules,
            table,
            classifier,
            default_timeout,
        })
    }

    pub fn from_config(config: &AppConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        Self::new(config.routes.clone(), classifier, config.classifier.timeout())
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Every rule matching the request, in declaration order.
    pub fn matching_rules(&self, method: &str, paths: &RequestPaths) -> Vec<&RouteRule> {
        self.table
            .matches(method, paths)
            .into_iter()
            .map(|i| &self.rules[i])
            .collect()
    }

    pub fn applies(&self, method: &str, paths: &RequestPaths) -> bool {
        self.table.is_match(method, paths)
    }

    /// Overall outcome for the request: the first non-`Allow` rule outcome,
    /// or `Allow` when every matching rule passes.
    pub async fn evaluate(&self, ctx: &RequestContext) -> EnforcementOutcome {
        for rule in self.matching_rules(&ctx.method, &ctx.paths) {
            let decision = match self.evaluate_rule(rule, ctx).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(
                        target: SECURITY_TARGET,
                        method = %ctx.method,
                        path = %ctx.paths.display(),
                        rule = %rule.label(),
                        fields = %rule.fields.join(", "),
                        error = %e,
                        "PII check service unavailable; allowing (fail-open)"
                    );
                    RuleDecision::allow(Reason::ClassifierUnavailable)
                }
            };

            log_decision(rule, ctx, &decision);

            if !decision.outcome.is_allow() {
                return decision.outcome;
            }
        }
        EnforcementOutcome::Allow
    }

    /// Evaluate one rule. Errors are classifier failures.
    pub async fn evaluate_rule(&self, rule: &RouteRule, ctx: &RequestContext) -> Result<RuleDecision> {
        let Some(text) = extract::inspection_text(&ctx.payload, &rule.fields) else {
            return Ok(RuleDecision::allow(Reason::NoInspectableText));
        };

        let timeout = rule
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);
        let entities = self.classifier.classify(&text, timeout).await?;

        Ok(evaluator::decide(rule, &entities, ctx.bypass))
    }
}

fn log_decision(rule: &RouteRule, ctx: &RequestContext, decision: &RuleDecision) {
    let method = ctx.method.as_str();
    let path = ctx.paths.display();
    let label = rule.label();
    let fields = rule.fields.join(", ");
    let pii_types = decision.detected_types.join(", ");
    let user = ctx.user_label();

    match decision.reason {
        Reason::NoInspectableText => {
            if !rule.fields.is_empty() {
                debug!(
                    method,
                    path,
                    rule = %label,
                    fields = %fields,
                    payload_keys = %extract::payload_keys(&ctx.payload).join(", "),
                    "no field values found to inspect"
                );
            }
        }
        // Logged where the failure was observed.
        Reason::ClassifierUnavailable => {}
        Reason::DetectionOnly | Reason::Clean => {
            debug!(method, path, rule = %label, reason = ?decision.reason, "rule passed");
        }
        Reason::NotEnforced => {
            info!(method, path, rule = %label, fields = %fields, "PII detected but not in check_type");
        }
        Reason::Blocked => {
            warn!(target: SECURITY_TARGET, method, path, rule = %label, fields = %fields, pii_types = %pii_types, user, "BLOCK: silently dropped submission");
        }
        Reason::Warned => {
            warn!(target: SECURITY_TARGET, method, path, rule = %label, fields = %fields, pii_types = %pii_types, user, "WARN: client asked to confirm");
        }
        Reason::BypassAccepted => {
            warn!(target: SECURITY_TARGET, method, path, rule = %label, fields = %fields, pii_types = %pii_types, user, "user bypassed PII warning");
        }
        Reason::Forced => {
            warn!(target: SECURITY_TARGET, method, path, rule = %label, fields = %fields, pii_types = %pii_types, user, "BOTH (warn+block)");
        }
        Reason::ForcedBypassAttempt => {
            warn!(target: SECURITY_TARGET, method, path, rule = %label, fields = %fields, pii_types = %pii_types, user, "user attempted to bypass forced block; still blocking");
        }
    }
}
