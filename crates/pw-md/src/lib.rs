//! # pw-md
//!
//! Market data acquisition for Indodax and Bybit.
//!
//! ## Architecture
//!
//! REST snapshots flow through [`rest::RestClient`] (cache, then retry, then
//! the request executor with its proxy failover table) into an
//! [`ExchangeAdapter`], which maps exchange payloads onto the normalized
//! types in `pw_core`. Live updates come from the [`live`] managers, one
//! shared [`live::LiveManager`] per feed kind, each keyed by `FeedKey` and
//! reference counted across subscribers.
//!
//! ## Shared infrastructure
//!
//! - [`rest`]: transport seam, request executor, retry controller, REST client
//! - [`registry`]: builds adapters from config over one shared cache
//! - [`json_util`]: JSON parsing helpers
//! - [`order_book`]: incremental book for streamed depth

pub mod bybit;
pub mod indodax;
pub mod json_util;
pub mod live;
pub mod order_book;
pub mod registry;
pub mod rest;

use async_trait::async_trait;
use pw_core::{Exchange, FetchError, OrderBookSnapshot, TickerSnapshot, TradeEvent, TradingPair};

pub use registry::AdapterRegistry;
pub use rest::Fetched;

/// Upper bound on the number of pairs returned by `list_pairs`.
pub const MAX_PAIRS: usize = 400;

/// Trait implemented by every exchange adapter.
///
/// `symbol` is the exchange's own identifier
/// (see [`TradingPair::request_symbol`]); adapters normalize its casing.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn exchange(&self) -> Exchange;
    async fn list_pairs(&self) -> Result<Fetched<Vec<TradingPair>>, FetchError>;
    async fn ticker(&self, symbol: &str) -> Result<Fetched<TickerSnapshot>, FetchError>;
    async fn trades(&self, symbol: &str) -> Result<Fetched<Vec<TradeEvent>>, FetchError>;
    async fn depth(&self, symbol: &str) -> Result<Fetched<OrderBookSnapshot>, FetchError>;
}
