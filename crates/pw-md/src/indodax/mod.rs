//! Indodax: REST adapter and WebSocket message builders.
//!
//! REST (`https://indodax.com/api`):
//!
//! | Operation | Path          | Cache TTL |
//! |-----------|---------------|-----------|
//! | Pairs     | `/pairs`      | 60s       |
//! | Ticker    | `/ticker/{id}`| 5s        |
//! | Trades    | `/trades/{id}`| 10s       |
//! | Depth     | `/depth/{id}` | 5s        |
//!
//! WebSocket (`wss://ws3.indodax.com/ws/`): connect with the token as
//! request `id: 1`, then subscribe to `market:trade-activity-{id}` as `id: 2`
//! once the connect reply arrives.

pub mod json_parser;

use async_trait::async_trait;
use pw_core::config::ExchangeSettings;
use pw_core::{Exchange, FetchError, OrderBookSnapshot, TickerSnapshot, TradeEvent, TradingPair};

use crate::ExchangeAdapter;
use crate::rest::{Fetched, RestClient};

/// Request id of the connect (auth) message.
pub const CONNECT_REQ_ID: u64 = 1;
/// Request id of the channel subscription.
pub const SUBSCRIBE_REQ_ID: u64 = 2;

/// Quote currencies recognized when splitting a pair id like `btcidr`.
const KNOWN_QUOTES: [&str; 3] = ["usdt", "idr", "btc"];

/// Connect message carrying the public token.
pub fn build_connect(token: &str) -> String {
    serde_json::json!({
        "params": { "token": token },
        "id": CONNECT_REQ_ID
    })
    .to_string()
}

/// Trade-activity channel name for a pair id.
pub fn trade_channel(pair_id: &str) -> String {
    format!("market:trade-activity-{}", pair_id.to_ascii_lowercase())
}

/// Subscribe message for the trade-activity channel.
pub fn build_subscribe(pair_id: &str) -> String {
    serde_json::json!({
        "method": 1,
        "params": { "channel": trade_channel(pair_id) },
        "id": SUBSCRIBE_REQ_ID
    })
    .to_string()
}

/// Quote currency of a pair id (`btcidr` → `idr`), defaulting to `idr`.
pub fn quote_of(pair_id: &str) -> &'static str {
    let id = pair_id.to_ascii_lowercase();
    KNOWN_QUOTES
        .into_iter()
        .find(|q| id.len() > q.len() && id.ends_with(q))
        .unwrap_or("idr")
}

/// REST adapter for Indodax.
pub struct IndodaxAdapter {
    client: RestClient,
    settings: ExchangeSettings,
}

impl IndodaxAdapter {
    pub fn new(client: RestClient, settings: ExchangeSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ExchangeSettings {
        &self.settings
    }
}

#[async_trait]
impl ExchangeAdapter for IndodaxAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Indodax
    }

    async fn list_pairs(&self) -> Result<Fetched<Vec<TradingPair>>, FetchError> {
        self.client
            .get_parsed("/pairs", self.settings.ttl.pairs, json_parser::parse_pairs)
            .await
    }

    async fn ticker(&self, symbol: &str) -> Result<Fetched<TickerSnapshot>, FetchError> {
        let id = symbol.to_ascii_lowercase();
        let midrange = self.settings.heuristics.midrange_change;
        let quote = quote_of(&id);
        self.client
            .get_parsed(&format!("/ticker/{id}"), self.settings.ttl.ticker, |v| {
                json_parser::parse_ticker(v, quote, midrange)
            })
            .await
    }

    async fn trades(&self, symbol: &str) -> Result<Fetched<Vec<TradeEvent>>, FetchError> {
        let id = symbol.to_ascii_lowercase();
        self.client
            .get_parsed(&format!("/trades/{id}"), self.settings.ttl.trades, json_parser::parse_trades)
            .await
    }

    async fn depth(&self, symbol: &str) -> Result<Fetched<OrderBookSnapshot>, FetchError> {
        let id = symbol.to_ascii_lowercase();
        self.client
            .get_parsed(&format!("/depth/{id}"), self.settings.ttl.depth, json_parser::parse_depth)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_messages() {
        let connect: serde_json::Value = serde_json::from_str(&build_connect("tok")).unwrap();
        assert_eq!(connect["params"]["token"], "tok");
        assert_eq!(connect["id"], 1);

        let sub: serde_json::Value = serde_json::from_str(&build_subscribe("BTCIDR")).unwrap();
        assert_eq!(sub["method"], 1);
        assert_eq!(sub["params"]["channel"], "market:trade-activity-btcidr");
        assert_eq!(sub["id"], 2);
    }

    #[test]
    fn quote_detection() {
        assert_eq!(quote_of("btcidr"), "idr");
        assert_eq!(quote_of("ethusdt"), "usdt");
        assert_eq!(quote_of("usdtidr"), "idr");
        assert_eq!(quote_of("weird"), "idr");
    }
}
