//! View states published to the presentation layer.

use pw_core::{ConnectionStatus, FeedKey, FetchError, TradeEvent};
use pw_md::Fetched;
use pw_md::live::FeedView;

/// A REST-backed value with its loading/error flags.
///
/// On failure the last good `data` is kept next to the error so the consumer
/// can offer a retry without blanking the screen.
#[derive(Debug, Clone)]
pub struct Loadable<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
    /// Whether `data` was served from the response cache.
    pub cached: bool,
    pub fetched_at_ms: u64,
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            cached: false,
            fetched_at_ms: 0,
        }
    }
}

impl<T> Loadable<T> {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn ready(fetched: Fetched<T>) -> Self {
        Self {
            data: Some(fetched.data),
            loading: false,
            error: None,
            cached: fetched.cached,
            fetched_at_ms: fetched.fetched_at_ms,
        }
    }

    pub(crate) fn fail(&mut self, error: FetchError) {
        self.loading = false;
        self.error = Some(error);
    }

    pub fn is_ready(&self) -> bool {
        self.data.is_some() && !self.loading
    }
}

/// REST trade list plus the ids that were new in the latest fetch.
#[derive(Debug, Clone, Default)]
pub struct TradesState {
    pub trades: Loadable<Vec<TradeEvent>>,
    pub new_ids: Vec<String>,
}

/// A live feed as seen by the consumer of one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveState<D> {
    /// Selection this state belongs to; `None` before the first select.
    pub key: Option<FeedKey>,
    pub data: D,
    pub status: ConnectionStatus,
    pub retry_count: u32,
}

impl<D: Default> Default for LiveState<D> {
    fn default() -> Self {
        Self {
            key: None,
            data: D::default(),
            status: ConnectionStatus::Disconnected,
            retry_count: 0,
        }
    }
}

impl<D> LiveState<D> {
    pub(crate) fn from_view(key: FeedKey, view: FeedView<D>) -> Self {
        Self {
            key: Some(key),
            data: view.data,
            status: view.connection.status,
            retry_count: view.connection.retry_count,
        }
    }
}
