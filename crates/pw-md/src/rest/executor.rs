//! Request executor: one logical GET with a deadline, then proxy failover.
//!
//! The direct URL is tried first. Any failure (transport error, timeout,
//! non-2xx status, undecodable body) moves on to the configured mirrors in
//! order. The call fails only once every source has failed, with
//! [`FetchError::AllSourcesFailed`] carrying the last error seen. No retry
//! happens at this level.

use std::sync::Arc;
use std::time::Duration;

use pw_core::FetchError;
use pw_core::config::ProxyMirror;
use serde_json::Value;
use tracing::{debug, warn};

use super::proxy::{unwrap_payload, wrap_url};
use super::transport::HttpTransport;

pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    proxies: Arc<[ProxyMirror]>,
    timeout: Duration,
    label: String,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        proxies: Arc<[ProxyMirror]>,
        timeout: Duration,
        label: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            proxies,
            timeout,
            label: label.into(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch `url` as JSON, falling back through the proxy mirrors.
    pub async fn execute(&self, url: &str) -> Result<Value, FetchError> {
        let label = &self.label;
        debug!("[rest-{label}] GET {url}");

        let mut last = match self.fetch_json(url).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!("[rest-{label}] direct call failed: {e}");
                e
            }
        };

        for mirror in self.proxies.iter() {
            let proxied = wrap_url(mirror, url);
            debug!("[rest-{label}] trying proxy {}", mirror.name);
            let result = match self.fetch_json(&proxied).await {
                Ok(payload) => unwrap_payload(mirror.unwrap, payload),
                Err(e) => Err(e),
            };
            match result {
                Ok(v) => {
                    debug!("[rest-{label}] served by proxy {}", mirror.name);
                    return Ok(v);
                }
                Err(e) => {
                    warn!("[rest-{label}] proxy {} failed: {e}", mirror.name);
                    last = e;
                }
            }
        }

        Err(FetchError::AllSourcesFailed {
            url: url.to_string(),
            last: Box::new(last),
        })
    }

    /// A single GET under the deadline. Dropping the transport future on
    /// timeout cancels the request.
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let resp = tokio::time::timeout(self.timeout, self.transport.get(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;
        if !resp.is_success() {
            return Err(FetchError::Http {
                status: resp.status,
                url: url.to_string(),
            });
        }
        serde_json::from_str(&resp.body)
            .map_err(|e| FetchError::MalformedData(format!("invalid json from {url}: {e}")))
    }
}
