//! Field extraction from request payloads.

use axum::http::HeaderMap;
use serde_json::Value;

/// Payload field carrying the client's "I have seen the warning" flag.
pub const BYPASS_FIELD: &str = "bypassPIIWarning";

/// Header alternative to [`BYPASS_FIELD`].
pub const BYPASS_HEADER: &str = "x-pii-bypass";

/// A pre-parsed request payload.
///
/// Hosts that decode bodies themselves (multipart uploads, forms) insert this
/// as a request extension and it is inspected instead of the raw body. The
/// enforcement layer also inserts it after parsing a JSON body so later layers
/// do not parse again.
#[derive(Debug, Clone)]
pub struct InspectionPayload(pub Value);

/// Trimmed string value of `field`, if it is a non-blank string.
fn text_field<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Join the non-blank string values of `fields` with single spaces.
///
/// Returns `None` when no field contributes, meaning there is nothing to
/// classify.
pub fn inspection_text(payload: &Value, fields: &[String]) -> Option<String> {
    let values: Vec<&str> = fields
        .iter()
        .filter_map(|f| text_field(payload, f))
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(" "))
    }
}

/// The first non-blank string among `fields`, in priority order.
pub fn first_text(payload: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|f| text_field(payload, f))
        .map(str::to_string)
}

/// Whether the client resubmitted after acknowledging a warning.
pub fn bypass_requested(payload: &Value, headers: &HeaderMap) -> bool {
    let in_body = match payload.get(BYPASS_FIELD) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    };
    let in_header = headers
        .get(BYPASS_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    in_body || in_header
}

/// Top-level keys of the payload, for diagnostics.
pub fn payload_keys(payload: &Value) -> Vec<String> {
    payload
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default()
}
