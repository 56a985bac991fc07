//! Client-facing responses for blocking outcomes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::policy::config::Action;
use crate::policy::evaluator::EnforcementOutcome;

/// Message shown to the client for warn and forced blocks.
pub const WARNING_MESSAGE: &str =
    "Potential Person Identifiable Information Detected. Are you sure you want to continue?";

/// Body of a silent block, indistinguishable from a successful no-op.
#[derive(Debug, Serialize)]
pub struct SilentBlockBody {
    pub success: bool,
}

/// Body of a warn or forced block.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningBody {
    pub error: &'static str,
    pub pii_detected: bool,
    pub action_type: &'static str,
}

/// The response that replaces the handler's for a blocking outcome, or `None`
/// for [`EnforcementOutcome::Allow`].
pub fn block_response(outcome: EnforcementOutcome) -> Option<Response> {
    let response = match outcome {
        EnforcementOutcome::Allow => return None,
        EnforcementOutcome::SilentBlock => {
            (StatusCode::OK, Json(SilentBlockBody { success: true })).into_response()
        }
        EnforcementOutcome::WarnBlock => warning(Action::Warn),
        EnforcementOutcome::ForcedBlock => warning(Action::Both),
    };
    Some(response)
}

fn warning(action: Action) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(WarningBody {
            error: WARNING_MESSAGE,
            pii_detected: true,
            action_type: action.as_str(),
        }),
    )
        .into_response()
}
