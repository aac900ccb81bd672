//! REST acquisition stack.
//!
//! A call travels `RestClient` (cache) → retry controller → `RequestExecutor`
//! (timeout, direct call, proxy mirrors) → `HttpTransport`.

pub mod client;
pub mod executor;
pub mod proxy;
pub mod retry;
pub mod transport;

pub use client::RestClient;
pub use executor::RequestExecutor;
pub use retry::{RetryPolicy, retry};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

/// A REST result plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: T,
    /// Served from the response cache without a network call.
    pub cached: bool,
    /// When the underlying response was received (ms since epoch).
    pub fetched_at_ms: u64,
}

impl<T> Fetched<T> {
    /// Transform the payload, keeping the provenance.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            data: f(self.data),
            cached: self.cached,
            fetched_at_ms: self.fetched_at_ms,
        }
    }

    /// Fallible [`Fetched::map`].
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Fetched<U>, E> {
        Ok(Fetched {
            data: f(self.data)?,
            cached: self.cached,
            fetched_at_ms: self.fetched_at_ms,
        })
    }
}
