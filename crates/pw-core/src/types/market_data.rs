//! Normalized market data entities: the single shape both exchanges are
//! mapped into.
//!
//! # Timestamp convention
//!
//! Fields ending in `_ms` are milliseconds since Unix epoch, fields ending in
//! `_seconds` are whole seconds. Exchange payloads use both; adapters convert.

use serde::{Deserialize, Serialize};

use super::enums::{ConnectionStatus, Exchange, Side};

// ---------------------------------------------------------------------------
// TradingPair
// ---------------------------------------------------------------------------

/// A tradable instrument listed by an exchange.
///
/// Identity is `id` (the lowercased symbol). Pairs are immutable once built
/// and are replaced wholesale whenever the list is re-fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPair {
    pub id: String,
    pub symbol: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub display_symbol: String,
    pub description: String,
    pub is_active: bool,
    pub last_update_ms: u64,
}

impl TradingPair {
    /// The identifier the exchange's REST and WebSocket APIs expect.
    ///
    /// Indodax addresses pairs by id (`btcidr`), Bybit by uppercase symbol
    /// (`BTCUSDT`).
    pub fn request_symbol(&self, exchange: Exchange) -> String {
        match exchange {
            Exchange::Indodax => self.id.clone(),
            Exchange::Bybit => self.symbol.to_ascii_uppercase(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Point-in-time price/volume summary for one symbol.
///
/// Price fields are optional: adapters never fail on a missing optional field,
/// they leave it `None` and let the consumer decide how to show "no data".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub last_price: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub volume_24h: Option<f64>,
    /// 24h change in percent (`1.5` means +1.5%).
    pub change_percent_24h: Option<f64>,
    pub server_time_seconds: u64,
    pub fetched_at_ms: u64,
}

/// A live price update pushed by the price manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePrice {
    pub symbol: String,
    pub price: f64,
    pub change_percent_24h: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub trade_id: String,
    pub timestamp_seconds: u64,
    pub price: f64,
    pub amount: f64,
    pub side: Side,
}

impl TradeEvent {
    /// Build a trade, deriving a composite id when upstream omitted one.
    pub fn new(
        trade_id: Option<String>,
        timestamp_seconds: u64,
        price: f64,
        amount: f64,
        side: Side,
    ) -> Self {
        let trade_id = trade_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Self::composite_id(timestamp_seconds, price, amount));
        Self {
            trade_id,
            timestamp_seconds,
            price,
            amount,
            side,
        }
    }

    /// Fallback identity: `"{timestamp}-{price}-{amount}"`.
    pub fn composite_id(timestamp_seconds: u64, price: f64, amount: f64) -> String {
        format!("{timestamp_seconds}-{price}-{amount}")
    }
}

// ---------------------------------------------------------------------------
// Order book
// ---------------------------------------------------------------------------

/// One aggregated price level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

/// Full order-book snapshot. Bids best-first (descending), asks best-first
/// (ascending).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub last_update_ms: u64,
    /// Upstream sequence number. Informational only, never enforced.
    pub sequence: Option<u64>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    pub fn spread(&self) -> Option<f64> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Live-connection bookkeeping for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub retry_count: u32,
    pub last_update_ms: u64,
}

// ---------------------------------------------------------------------------
// Display impls
// ---------------------------------------------------------------------------

impl std::fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade({} {:.8}x{:.8} id={} t={})",
            self.side, self.price, self.amount, self.trade_id, self.timestamp_seconds
        )
    }
}

impl std::fmt::Display for LivePrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LivePrice({} {:.8}", self.symbol, self.price)?;
        if let Some(pct) = self.change_percent_24h {
            write!(f, " {pct:+.2}%")?;
        }
        f.write_str(")")
    }
}
