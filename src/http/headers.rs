//! Header rewriting across the proxy boundary.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Replace `Host`/`Origin` so the upstream believes it is addressed directly
//! - Drop framing headers from responses whose body was re-buffered
//!
//! # Design Decisions
//! - Pure functions over `HeaderMap`; no I/O, no failure mode
//! - Multi-valued headers are copied with all their values

use axum::http::header::{self, HeaderMap, HeaderName};

use crate::upstream::UpstreamTarget;

/// Removed from requests before they go upstream.
pub static REQUEST_EXCLUDED: [HeaderName; 10] = [
    header::HOST,
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::ORIGIN,
];

/// Removed from responses before they are replayed locally.
pub static RESPONSE_EXCLUDED: [HeaderName; 10] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_ENCODING,
    header::CONTENT_LENGTH,
];

/// Headers to send upstream for an inbound request.
pub fn rewrite_request_headers(inbound: &HeaderMap, target: &UpstreamTarget) -> HeaderMap {
    let mut out = strip(inbound, &REQUEST_EXCLUDED);
    out.insert(header::HOST, target.host_header().clone());
    out.insert(header::ORIGIN, target.origin_header().clone());
    out
}

/// Headers to replay locally for an upstream response.
pub fn rewrite_response_headers(upstream: &HeaderMap) -> HeaderMap {
    strip(upstream, &RESPONSE_EXCLUDED)
}

fn strip(headers: &HeaderMap, excluded: &[HeaderName]) -> HeaderMap {
    let mut out = headers.clone();
    for name in excluded {
        out.remove(name);
    }
    out
}
