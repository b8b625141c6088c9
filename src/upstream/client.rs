//! Shared outbound HTTP client.

use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;

/// Build the process-wide HTTP client used by the HTTP bridge.
///
/// Redirects are never followed so the local caller sees exactly what the
/// upstream answered. Compressed bodies are decoded by the client, which is
/// why replayed responses drop `Content-Encoding`.
pub fn build_http_client(config: &UpstreamConfig) -> Result<reqwest::Client, ProxyError> {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .no_proxy();

    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    Ok(builder.build()?)
}

/// Install the rustls crypto provider used for `https`/`wss` upstreams.
///
/// Safe to call more than once; later calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
