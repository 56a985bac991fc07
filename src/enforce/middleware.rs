//! axum middleware running the rule enforcer and the sensitive-type guard.
//!
//! Both are plain `from_fn_with_state` functions so hosts decide where they
//! sit. Rules are meant to run first and the guard after them:
//!
//! ```ignore
//! Router::new()
//!     .route("/api/posts", post(create_post))
//!     .layer(middleware::from_fn_with_state(guard_state, enforce_guard))
//!     .layer(middleware::from_fn_with_state(rule_state, enforce_rules));
//! ```
//!
//! Blocked requests never reach the inner handler. Any staged upload attached
//! with [`StagedUpload`] is removed before the block response is returned.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{NestedPath, OriginalUri, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use super::cleanup::{discard_staged_upload, StagedUpload, UploadStore};
use super::extract::{bypass_requested, InspectionPayload};
use super::outcome::block_response;
use super::{ActingIdentity, Enforcer, RequestContext, SECURITY_TARGET};
use crate::error::{PiiGuardError, Result};
use crate::guard::SensitiveTypeGuard;
use crate::policy::evaluator::EnforcementOutcome;
use crate::policy::matcher::RequestPaths;

/// State for [`enforce_rules`].
#[derive(Clone)]
pub struct RuleLayerState {
    pub enforcer: Arc<Enforcer>,
    pub uploads: Arc<dyn UploadStore>,
    pub max_body_bytes: usize,
}

/// State for [`enforce_guard`].
#[derive(Clone)]
pub struct GuardLayerState {
    pub guard: Arc<SensitiveTypeGuard>,
    pub uploads: Arc<dyn UploadStore>,
    pub max_body_bytes: usize,
}

/// Run the configured inspection rules matching the request.
pub async fn enforce_rules(
    State(state): State<RuleLayerState>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let paths = request_paths(&req);
    if !state.enforcer.applies(&method, &paths) {
        return next.run(req).await;
    }

    let (req, ctx) = match prepare(req, method, paths, state.max_body_bytes).await {
        Ok(prepared) => prepared,
        Err(e) => return unreadable_body(e),
    };

    let span = info_span!(
        "pii_rules",
        id = %uuid::Uuid::new_v4(),
        method = %ctx.method,
        path = %ctx.paths.display()
    );
    let outcome = state.enforcer.evaluate(&ctx).instrument(span).await;
    finish(outcome, req, next, state.uploads.as_ref()).await
}

/// Run the fixed sensitive-type guard if it covers the request.
pub async fn enforce_guard(
    State(state): State<GuardLayerState>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let paths = request_paths(&req);
    if !state.guard.applies(&method, &paths) {
        return next.run(req).await;
    }

    let (req, ctx) = match prepare(req, method, paths, state.max_body_bytes).await {
        Ok(prepared) => prepared,
        Err(e) => return unreadable_body(e),
    };

    let span = info_span!(
        "pii_guard",
        id = %uuid::Uuid::new_v4(),
        method = %ctx.method,
        path = %ctx.paths.display()
    );
    let outcome = state.guard.inspect(&ctx).instrument(span).await;
    finish(outcome, req, next, state.uploads.as_ref()).await
}

/// Candidate paths: the full original path, the path relative to the current
/// nest point, and the nest prefix joined with the relative path.
pub fn request_paths(req: &Request) -> RequestPaths {
    let relative = req.uri().path();
    let original = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path())
        .unwrap_or(relative);
    let mount = req.extensions().get::<NestedPath>().map(NestedPath::as_str);
    RequestPaths::new(original, relative, mount)
}

/// Buffer and parse the body (unless a payload was supplied) and build the
/// context. The returned request carries the same body bytes.
///
/// A body over `max_body_bytes`, declared or actual, is an error: a request
/// that cannot be inspected never reaches the inner service.
async fn prepare(
    req: Request,
    method: String,
    paths: RequestPaths,
    max_body_bytes: usize,
) -> Result<(Request, RequestContext)> {
    let user = req
        .extensions()
        .get::<ActingIdentity>()
        .map(|id| id.0.clone());

    let supplied = req
        .extensions()
        .get::<InspectionPayload>()
        .map(|p| p.0.clone());

    let (req, payload) = match supplied {
        Some(payload) => (req, payload),
        None => {
            if let Some(len) = declared_length(&req).filter(|len| *len > max_body_bytes) {
                return Err(PiiGuardError::Payload(format!(
                    "declared length {} exceeds inspection limit {}",
                    len, max_body_bytes
                )));
            }

            let (mut parts, body) = req.into_parts();
            let bytes = axum::body::to_bytes(body, max_body_bytes)
                .await
                .map_err(|e| PiiGuardError::Payload(e.to_string()))?;
            let payload: Value = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                debug!(path = %paths.display(), "body is not JSON; nothing to inspect");
                Value::Null
            });
            parts.extensions.insert(InspectionPayload(payload.clone()));
            (Request::from_parts(parts, Body::from(bytes)), payload)
        }
    };

    let bypass = bypass_requested(&payload, req.headers());
    let ctx = RequestContext {
        method,
        paths,
        payload,
        bypass,
        user,
    };
    Ok((req, ctx))
}

fn declared_length(req: &Request) -> Option<usize> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn finish(
    outcome: EnforcementOutcome,
    req: Request,
    next: Next,
    uploads: &dyn UploadStore,
) -> Response {
    match block_response(outcome) {
        Some(response) => {
            discard_staged_upload(uploads, req.extensions().get::<StagedUpload>()).await;
            response
        }
        None => next.run(req).await,
    }
}

fn unreadable_body(e: PiiGuardError) -> Response {
    warn!(
        target: SECURITY_TARGET,
        error = %e,
        "rejecting request whose body cannot be inspected"
    );
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(serde_json::json!({ "error": "Request body could not be read" })),
    )
        .into_response()
}
