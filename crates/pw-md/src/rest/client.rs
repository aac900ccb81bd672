//! Cached, retried JSON GETs for one exchange.

use std::sync::Arc;
use std::time::Duration;

use pw_core::FetchError;
use pw_core::cache::ResponseCache;
use pw_core::time_util::now_ms;
use serde_json::Value;
use tracing::debug;

use super::Fetched;
use super::executor::RequestExecutor;
use super::retry::{RetryPolicy, retry};

/// Response cache shared by every client. Stores the raw JSON body together
/// with its first fetch time.
pub type SharedCache = Arc<ResponseCache<Fetched<Value>>>;

pub struct RestClient {
    base_url: String,
    executor: RequestExecutor,
    policy: RetryPolicy,
    cache: SharedCache,
}

impl RestClient {
    pub fn new(
        base_url: impl Into<String>,
        executor: RequestExecutor,
        policy: RetryPolicy,
        cache: SharedCache,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            executor,
            policy,
            cache,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` through the cache.
    ///
    /// A hit within `ttl` returns `cached = true` without touching the
    /// network. Only successful responses are cached.
    pub async fn get_json(&self, path: &str, ttl: Duration) -> Result<Fetched<Value>, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let key = format!("GET:{url}");

        if let Some(hit) = self.cache.get(&key) {
            debug!("[cache] hit {key}");
            return Ok(Fetched { cached: true, ..hit });
        }

        let data = retry(self.policy, &url, || self.executor.execute(&url)).await?;
        let fetched = Fetched {
            data,
            cached: false,
            fetched_at_ms: now_ms(),
        };
        self.cache.set(key, fetched.clone(), ttl);
        Ok(fetched)
    }

    /// [`get_json`](Self::get_json), then `parse`. A body that fails to
    /// parse (including an exchange-level rejection) is evicted so the next
    /// call goes back to the network.
    pub async fn get_parsed<T>(
        &self,
        path: &str,
        ttl: Duration,
        parse: impl FnOnce(&Value) -> Result<T, FetchError>,
    ) -> Result<Fetched<T>, FetchError> {
        let fetched = self.get_json(path, ttl).await?;
        let parsed = fetched.try_map(|v| parse(&v));
        if parsed.is_err() {
            self.invalidate(path);
        }
        parsed
    }

    /// Drop the cached body for `path`, forcing the next call to the network.
    pub fn invalidate(&self, path: &str) {
        self.cache.delete(&format!("GET:{}{}", self.base_url, path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::executor::tests::ScriptedTransport;
    use crate::rest::transport::HttpResponse;

    fn client(t: Arc<ScriptedTransport>) -> RestClient {
        let exec = RequestExecutor::new(t, Vec::new().into(), Duration::from_secs(5), "test");
        RestClient::new(
            "https://api.test/",
            exec,
            RetryPolicy::new(3, Duration::from_millis(100)),
            Arc::new(ResponseCache::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_within_ttl_is_cached() {
        let t = Arc::new(ScriptedTransport::new());
        t.route("https://api.test/", Ok(HttpResponse::ok(r#"{"v":1}"#)));
        let c = client(t.clone());

        let first = c.get_json("/x", Duration::from_secs(5)).await.unwrap();
        assert!(!first.cached);
        let second = c.get_json("/x", Duration::from_secs(5)).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.data, first.data);
        assert_eq!(second.fetched_at_ms, first.fetched_at_ms);
        assert_eq!(t.call_count(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        let third = c.get_json("/x", Duration::from_secs(5)).await.unwrap();
        assert!(!third.cached);
        assert_eq!(t.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_http_status_is_retried() {
        let t = Arc::new(ScriptedTransport::new());
        t.route("https://api.test/", Ok(HttpResponse { status: 503, body: String::new() }));
        t.route("https://api.test/", Ok(HttpResponse::ok("[]")));
        let c = client(t.clone());

        let out = c.get_json("/x", Duration::from_secs(5)).await.unwrap();
        assert_eq!(out.data, serde_json::json!([]));
        assert_eq!(t.call_count(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let t = Arc::new(ScriptedTransport::new());
        t.route("https://api.test/", Ok(HttpResponse { status: 404, body: String::new() }));
        t.route("https://api.test/", Ok(HttpResponse::ok("[]")));
        let c = client(t.clone());

        assert!(c.get_json("/x", Duration::from_secs(5)).await.is_err());
        assert!(c.get_json("/x", Duration::from_secs(5)).await.is_ok());
    }

    #[tokio::test]
    async fn unparsable_body_is_evicted() {
        let t = Arc::new(ScriptedTransport::new());
        t.route("https://api.test/", Ok(HttpResponse::ok(r#"{"retCode":10006}"#)));
        let c = client(t.clone());
        let reject = |_: &Value| -> Result<(), FetchError> { Err(FetchError::MalformedData("rejected".into())) };

        assert!(c.get_parsed("/x", Duration::from_secs(5), reject).await.is_err());
        assert!(c.get_parsed("/x", Duration::from_secs(5), reject).await.is_err());
        assert_eq!(t.call_count(), 2);
    }
}
