//! HTTP bridge: one buffered upstream round trip per inbound request.
//!
//! # Design Decisions
//! - Request and response bodies are fully buffered in memory
//! - Redirects are returned to the caller, never followed
//! - No retries; a transport failure fails only this request

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderValue};
use axum::http::Request;
use axum::response::Response;
use http_body_util::LengthLimitError;

use crate::error::ProxyError;
use crate::http::headers::{rewrite_request_headers, rewrite_response_headers};
use crate::http::server::AppState;

/// Forward one non-upgrade request upstream and replay the answer.
pub async fn forward(state: &AppState, request: Request<Body>) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = state.target.http_url(path_and_query);

    tracing::info!(method = %parts.method, path = %path_and_query, upstream = %url, "HTTP");

    let headers = rewrite_request_headers(&parts.headers, &state.target);
    let body = read_body(body, &parts.headers, state.max_body_size).await?;

    let mut upstream = state
        .client
        .request(parts.method.clone(), url)
        .headers(headers);
    if !body.is_empty() {
        upstream = upstream.body(body);
    }
    let response = upstream.send().await?;

    let status = response.status();
    let mut headers = rewrite_response_headers(response.headers());
    let body = response.bytes().await?;

    if state.json_paths.matches(parts.uri.path()) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    tracing::debug!(
        method = %parts.method,
        path = %path_and_query,
        status = status.as_u16(),
        bytes = body.len(),
        "Upstream responded"
    );

    let mut out = Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    Ok(out)
}

/// Buffer the inbound body, rejecting anything over `limit` bytes.
async fn read_body(
    body: Body,
    headers: &axum::http::HeaderMap,
    limit: usize,
) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ProxyError::BodyTooLarge { limit });
    }

    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if inner.is::<LengthLimitError>() {
            ProxyError::BodyTooLarge { limit }
        } else {
            ProxyError::Body(inner.to_string())
        }
    })
}
