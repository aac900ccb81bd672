//! Bybit (v5, `linear` category): REST adapter and WebSocket message builders.
//!
//! REST endpoints (`https://api.bybit.com`):
//!
//! | Operation | Path                                                   |
//! |-----------|--------------------------------------------------------|
//! | Pairs     | `/v5/market/instruments-info?category=linear&limit=400`|
//! | Ticker    | `/v5/market/tickers?category=linear&symbol={S}`        |
//! | Trades    | `/v5/market/recent-trade?category=linear&symbol={S}&limit=20` |
//! | Depth     | `/v5/market/orderbook?category=linear&symbol={S}&limit=50` |
//!
//! WebSocket (`wss://stream.bybit.com/v5/public/linear`): an application
//! `ping` doubles as the handshake; topics are subscribed after its `pong`.

pub mod json_parser;

use async_trait::async_trait;
use pw_core::config::ExchangeSettings;
use pw_core::{Exchange, FetchError, OrderBookSnapshot, TickerSnapshot, TradeEvent, TradingPair};

use crate::rest::{Fetched, RestClient};
use crate::{ExchangeAdapter, MAX_PAIRS};

const CATEGORY: &str = "linear";
const TRADES_LIMIT: usize = 20;
/// Order-book depth, for both REST and the `orderbook.{N}` topic.
pub const BOOK_DEPTH: usize = 50;
/// `req_id` used for the handshake / keep-alive ping.
pub const PING_REQ_ID: &str = "100001";

/// Application-level ping.
pub fn build_ping() -> String {
    serde_json::json!({ "req_id": PING_REQ_ID, "op": "ping" }).to_string()
}

/// Subscribe message for one topic.
pub fn build_subscribe(topic: &str) -> String {
    serde_json::json!({ "op": "subscribe", "args": [topic] }).to_string()
}

pub fn ticker_topic(symbol: &str) -> String {
    format!("tickers.{}", symbol.to_ascii_uppercase())
}

pub fn trade_topic(symbol: &str) -> String {
    format!("publicTrade.{}", symbol.to_ascii_uppercase())
}

pub fn book_topic(symbol: &str) -> String {
    format!("orderbook.{BOOK_DEPTH}.{}", symbol.to_ascii_uppercase())
}

/// REST adapter for Bybit.
pub struct BybitAdapter {
    client: RestClient,
    settings: ExchangeSettings,
}

impl BybitAdapter {
    pub fn new(client: RestClient, settings: ExchangeSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ExchangeSettings {
        &self.settings
    }
}

#[async_trait]
impl ExchangeAdapter for BybitAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    async fn list_pairs(&self) -> Result<Fetched<Vec<TradingPair>>, FetchError> {
        let path = format!("/v5/market/instruments-info?category={CATEGORY}&limit={MAX_PAIRS}");
        self.client
            .get_parsed(&path, self.settings.ttl.pairs, json_parser::parse_instruments)
            .await
    }

    async fn ticker(&self, symbol: &str) -> Result<Fetched<TickerSnapshot>, FetchError> {
        let symbol = symbol.to_ascii_uppercase();
        let path = format!("/v5/market/tickers?category={CATEGORY}&symbol={symbol}");
        self.client
            .get_parsed(&path, self.settings.ttl.ticker, json_parser::parse_ticker)
            .await
    }

    async fn trades(&self, symbol: &str) -> Result<Fetched<Vec<TradeEvent>>, FetchError> {
        let symbol = symbol.to_ascii_uppercase();
        let path =
            format!("/v5/market/recent-trade?category={CATEGORY}&symbol={symbol}&limit={TRADES_LIMIT}");
        self.client
            .get_parsed(&path, self.settings.ttl.trades, json_parser::parse_trades)
            .await
    }

    async fn depth(&self, symbol: &str) -> Result<Fetched<OrderBookSnapshot>, FetchError> {
        let symbol = symbol.to_ascii_uppercase();
        let path = format!("/v5/market/orderbook?category={CATEGORY}&symbol={symbol}&limit={BOOK_DEPTH}");
        self.client
            .get_parsed(&path, self.settings.ttl.depth, json_parser::parse_orderbook)
            .await
    }
}
