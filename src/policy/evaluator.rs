//! Decision engine for a single inspection rule.
//!
//! [`decide`] is a pure function of the rule, the entities the classifier
//! reported, and the client's bypass signal. It never touches the request or
//! the classifier; the caller in [`crate::enforce`] sequences rules and stops
//! at the first non-[`Allow`](EnforcementOutcome::Allow) outcome.

use super::config::{Action, RouteRule};
use super::normalize::normalize;
use crate::classifier::DetectedEntity;

/// Outcome of enforcement for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementOutcome {
    /// Let the request through to the wrapped handler.
    Allow,
    /// Report success to the client but store nothing.
    SilentBlock,
    /// Reject and let the client confirm and resubmit with a bypass signal.
    WarnBlock,
    /// Reject; confirming and resubmitting is rejected again.
    ForcedBlock,
}

impl EnforcementOutcome {
    pub fn is_allow(&self) -> bool {
        matches!(self, EnforcementOutcome::Allow)
    }
}

/// Why a rule produced its outcome. Drives the log line for the evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// No configured field carried text; the rule was skipped.
    NoInspectableText,
    /// The classifier failed; the rule fails open.
    ClassifierUnavailable,
    /// The rule has no blocked types and only observes.
    DetectionOnly,
    /// Nothing was detected.
    Clean,
    /// Something was detected, but none of it is a blocked type.
    NotEnforced,
    /// `block` action.
    Blocked,
    /// `warn` action without a bypass signal.
    Warned,
    /// `warn` action, client acknowledged the warning.
    BypassAccepted,
    /// `both` action without a bypass signal.
    Forced,
    /// `both` action, client tried to bypass anyway.
    ForcedBypassAttempt,
}

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecision {
    pub outcome: EnforcementOutcome,
    pub reason: Reason,
    /// Canonical blocked types that were detected, de-duplicated, in
    /// first-detection order.
    pub detected_types: Vec<String>,
}

impl RuleDecision {
    pub fn allow(reason: Reason) -> Self {
        Self {
            outcome: EnforcementOutcome::Allow,
            reason,
            detected_types: Vec::new(),
        }
    }
}

/// Canonical blocked types present among `entities`.
///
/// Comparison is exact equality after [`normalize`]. The result is non-empty
/// exactly when the normalized intersection is non-empty.
pub fn detected_blocked_types(entities: &[DetectedEntity], blocked: &[String]) -> Vec<String> {
    let blocked: Vec<String> = blocked.iter().map(|t| normalize(t)).collect();
    let mut found: Vec<String> = Vec::new();

    for entity in entities {
        let canonical = normalize(&entity.entity_type);
        if blocked.contains(&canonical) && !found.contains(&canonical) {
            found.push(canonical);
        }
    }

    found
}

/// Decide the outcome of `rule` for the classifier's `entities`.
pub fn decide(rule: &RouteRule, entities: &[DetectedEntity], bypass: bool) -> RuleDecision {
    if rule.check_type.is_empty() {
        return RuleDecision::allow(Reason::DetectionOnly);
    }

    let detected_types = detected_blocked_types(entities, &rule.check_type);
    if detected_types.is_empty() {
        let reason = if entities.is_empty() {
            Reason::Clean
        } else {
            Reason::NotEnforced
        };
        return RuleDecision::allow(reason);
    }

    let (outcome, reason) = match (rule.action, bypass) {
        (Action::Block, _) => (EnforcementOutcome::SilentBlock, Reason::Blocked),
        (Action::Warn, true) => (EnforcementOutcome::Allow, Reason::BypassAccepted),
        (Action::Warn, false) => (EnforcementOutcome::WarnBlock, Reason::Warned),
        (Action::Both, true) => (EnforcementOutcome::ForcedBlock, Reason::ForcedBypassAttempt),
        (Action::Both, false) => (EnforcementOutcome::ForcedBlock, Reason::Forced),
    };

    RuleDecision {
        outcome,
        reason,
        detected_types,
    }
}
