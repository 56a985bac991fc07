//! Forwarding of allowed requests to the upstream application.

use axum::body::Body;
use axum::extract::{OriginalUri, Request, State};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use tracing::{debug, error};

use crate::error::{PiiGuardError, Result};

/// Headers that describe one connection and are not relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn relayable(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Relays requests to a fixed upstream base URL.
#[derive(Clone)]
pub struct Forwarder {
    upstream: String,
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(upstream: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Send `req` upstream (same method, path, query, headers and body) and
    /// relay the answer.
    pub async fn forward(&self, req: Request) -> Result<Response> {
        let uri = req
            .extensions()
            .get::<OriginalUri>()
            .map(|u| u.0.clone())
            .unwrap_or_else(|| req.uri().clone());
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let url = format!("{}{}", self.upstream.trim_end_matches('/'), path_and_query);

        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| PiiGuardError::Payload(e.to_string()))?;

        debug!(method = %parts.method, url = %url, "forwarding upstream");
        let resp = self
            .client
            .request(parts.method, &url)
            .headers(relayable(&parts.headers))
            .body(bytes)
            .send()
            .await
            .map_err(|e| PiiGuardError::Upstream(e.to_string()))?;

        let status = resp.status();
        let headers = relayable(resp.headers());
        let body = resp
            .bytes()
            .await
            .map_err(|e| PiiGuardError::Upstream(e.to_string()))?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Fallback handler relaying everything that enforcement let through.
pub async fn forward_handler(State(forwarder): State<Forwarder>, req: Request) -> Response {
    match forwarder.forward(req).await {
        Ok(response) => response,
        Err(e) => {
            error!(upstream = %forwarder.upstream(), error = %e, "upstream request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "Upstream unavailable" })),
            )
                .into_response()
        }
    }
}
