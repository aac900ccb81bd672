//! Bybit v5 JSON message parser.
//!
//! REST responses share the envelope `{retCode, retMsg, result, time}`; a
//! non-zero `retCode` is a rejection. WebSocket frames are dispatched on
//! `topic` prefix (`tickers.`, `publicTrade.`, `orderbook.`), with control
//! replies identified by `op` / `ret_msg`.

use pw_core::time_util::now_ms;
use pw_core::{FetchError, OrderBookSnapshot, Side, TickerSnapshot, TradeEvent, TradingPair};
use serde_json::Value;

use crate::MAX_PAIRS;
use crate::json_util::{
    expect_array, parse_f64_field, parse_level_pairs, parse_levels, parse_str_u64, string_field,
};

// ---------------------------------------------------------------------------
// REST envelope
// ---------------------------------------------------------------------------

/// Unwrap the v5 envelope and return `result`.
pub fn check_envelope(v: &Value) -> Result<&Value, FetchError> {
    let code = v
        .get("retCode")
        .and_then(Value::as_i64)
        .ok_or_else(|| FetchError::MalformedData("bybit: missing retCode".into()))?;
    if code != 0 {
        let message = v.get("retMsg").and_then(Value::as_str).unwrap_or("").to_string();
        return Err(FetchError::ExchangeRejected { code, message });
    }
    v.get("result")
        .ok_or_else(|| FetchError::MalformedData("bybit: missing result".into()))
}

fn result_list<'a>(v: &'a Value, what: &str) -> Result<&'a Vec<Value>, FetchError> {
    let result = check_envelope(v)?;
    let list = result
        .get("list")
        .ok_or_else(|| FetchError::MalformedData(format!("{what}: missing result.list")))?;
    expect_array(list, what)
}

/// Server time of a REST response in seconds (`time` is ms).
fn envelope_time_secs(v: &Value) -> u64 {
    parse_str_u64(v.get("time")).map(|ms| ms / 1000).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// REST payloads
// ---------------------------------------------------------------------------

/// `instruments-info` → pairs, capped at [`MAX_PAIRS`].
pub fn parse_instruments(v: &Value) -> Result<Vec<TradingPair>, FetchError> {
    let rows = result_list(v, "bybit instruments")?;
    let now = now_ms();
    Ok(rows
        .iter()
        .filter_map(|row| {
            let symbol = string_field(row, "symbol")?.to_ascii_uppercase();
            let base = string_field(row, "baseCoin").unwrap_or_default().to_ascii_uppercase();
            let quote = string_field(row, "quoteCoin").unwrap_or_default().to_ascii_uppercase();
            let display = format!("{base}/{quote}");
            Some(TradingPair {
                id: symbol.to_ascii_lowercase(),
                symbol,
                base_currency: base,
                quote_currency: quote,
                description: display.clone(),
                display_symbol: display,
                is_active: row.get("status").and_then(Value::as_str) == Some("Trading"),
                last_update_ms: now,
            })
        })
        .take(MAX_PAIRS)
        .collect())
}

/// `tickers` → snapshot of the first list entry.
pub fn parse_ticker(v: &Value) -> Result<TickerSnapshot, FetchError> {
    let rows = result_list(v, "bybit tickers")?;
    let row = rows
        .first()
        .ok_or_else(|| FetchError::MalformedData("bybit tickers: empty list".into()))?;
    let mut snap = ticker_fields(row);
    snap.server_time_seconds = envelope_time_secs(v);
    Ok(snap)
}

/// Map the ticker field names shared by REST and the `tickers` stream.
/// Fields absent from `row` stay `None`.
pub fn ticker_fields(row: &Value) -> TickerSnapshot {
    TickerSnapshot {
        last_price: parse_f64_field(row, "lastPrice"),
        high_24h: parse_f64_field(row, "highPrice24h"),
        low_24h: parse_f64_field(row, "lowPrice24h"),
        bid_price: parse_f64_field(row, "bid1Price"),
        ask_price: parse_f64_field(row, "ask1Price"),
        volume_24h: parse_f64_field(row, "turnover24h"),
        change_percent_24h: parse_f64_field(row, "price24hPcnt").map(|p| p * 100.0),
        server_time_seconds: 0,
        fetched_at_ms: now_ms(),
    }
}

/// Complete a delta push with the previous snapshot of the same key.
pub fn complete_ticker(prev: Option<&TickerSnapshot>, delta: TickerSnapshot) -> TickerSnapshot {
    let Some(prev) = prev else {
        return delta;
    };
    TickerSnapshot {
        last_price: delta.last_price.or(prev.last_price),
        high_24h: delta.high_24h.or(prev.high_24h),
        low_24h: delta.low_24h.or(prev.low_24h),
        bid_price: delta.bid_price.or(prev.bid_price),
        ask_price: delta.ask_price.or(prev.ask_price),
        volume_24h: delta.volume_24h.or(prev.volume_24h),
        change_percent_24h: delta.change_percent_24h.or(prev.change_percent_24h),
        server_time_seconds: delta.server_time_seconds.max(prev.server_time_seconds),
        fetched_at_ms: delta.fetched_at_ms,
    }
}

/// `recent-trade` → trades (`time` is ms, as a string).
pub fn parse_trades(v: &Value) -> Result<Vec<TradeEvent>, FetchError> {
    let rows = result_list(v, "bybit trades")?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            Some(TradeEvent::new(
                string_field(row, "execId"),
                parse_str_u64(row.get("time"))? / 1000,
                parse_f64_field(row, "price")?,
                parse_f64_field(row, "size")?,
                Side::from_label(row.get("side").and_then(Value::as_str).unwrap_or("")),
            ))
        })
        .collect())
}

/// `orderbook` → book.
pub fn parse_orderbook(v: &Value) -> Result<OrderBookSnapshot, FetchError> {
    let result = check_envelope(v)?;
    if !result.is_object() {
        return Err(FetchError::MalformedData("bybit orderbook: expected object".into()));
    }
    Ok(OrderBookSnapshot {
        bids: parse_levels(result.get("b")),
        asks: parse_levels(result.get("a")),
        last_update_ms: parse_str_u64(result.get("ts")).unwrap_or_else(now_ms),
        sequence: parse_str_u64(result.get("seq")),
    })
}

// ---------------------------------------------------------------------------
// WebSocket frames
// ---------------------------------------------------------------------------

/// Whether a book push replaces the book or patches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookUpdateKind {
    Snapshot,
    Delta,
}

/// Known inbound Bybit frame shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum BybitFrame {
    /// Reply to an application-level ping.
    Pong,
    /// Reply to a subscribe request.
    SubscribeAck { success: bool, message: String },
    /// `tickers.{SYMBOL}`. Delta pushes carry only changed fields.
    Ticker { symbol: String, ticker: TickerSnapshot },
    /// `publicTrade.{SYMBOL}`.
    Trades { symbol: String, trades: Vec<TradeEvent> },
    /// `orderbook.{depth}.{SYMBOL}`.
    Book {
        symbol: String,
        kind: BookUpdateKind,
        bids: Vec<[f64; 2]>,
        asks: Vec<[f64; 2]>,
        ts_ms: u64,
        seq: Option<u64>,
    },
}

/// Decode one text frame. `None` for anything not matching a known shape.
pub fn decode_frame(text: &str) -> Option<BybitFrame> {
    let v: Value = serde_json::from_str(text).ok()?;

    if let Some(topic) = v.get("topic").and_then(Value::as_str) {
        return decode_topic(topic, &v);
    }

    let op = v.get("op").and_then(Value::as_str);
    let ret_msg = v.get("ret_msg").and_then(Value::as_str);
    if op == Some("pong") || ret_msg == Some("pong") {
        return Some(BybitFrame::Pong);
    }
    if op == Some("subscribe") {
        return Some(BybitFrame::SubscribeAck {
            success: v.get("success").and_then(Value::as_bool).unwrap_or(false),
            message: ret_msg.unwrap_or("").to_string(),
        });
    }
    None
}

fn decode_topic(topic: &str, v: &Value) -> Option<BybitFrame> {
    let data = v.get("data")?;

    if let Some(symbol) = topic.strip_prefix("tickers.") {
        if !data.is_object() {
            return None;
        }
        let mut ticker = ticker_fields(data);
        ticker.server_time_seconds = parse_str_u64(v.get("ts")).map(|ms| ms / 1000).unwrap_or(0);
        return Some(BybitFrame::Ticker {
            symbol: symbol.to_string(),
            ticker,
        });
    }

    if let Some(symbol) = topic.strip_prefix("publicTrade.") {
        let trades = data
            .as_array()?
            .iter()
            .filter_map(|t| {
                Some(TradeEvent::new(
                    string_field(t, "i"),
                    parse_str_u64(t.get("T"))? / 1000,
                    parse_f64_field(t, "p")?,
                    parse_f64_field(t, "v")?,
                    Side::from_label(t.get("S").and_then(Value::as_str).unwrap_or("")),
                ))
            })
            .collect();
        return Some(BybitFrame::Trades {
            symbol: symbol.to_string(),
            trades,
        });
    }

    if let Some(rest) = topic.strip_prefix("orderbook.") {
        let symbol = rest.split_once('.').map(|(_, s)| s)?;
        let kind = match v.get("type").and_then(Value::as_str) {
            Some("snapshot") => BookUpdateKind::Snapshot,
            Some("delta") => BookUpdateKind::Delta,
            _ => return None,
        };
        return Some(BybitFrame::Book {
            symbol: symbol.to_string(),
            kind,
            bids: parse_level_pairs(data.get("b")),
            asks: parse_level_pairs(data.get("a")),
            ts_ms: parse_str_u64(v.get("ts")).unwrap_or_else(now_ms),
            seq: parse_str_u64(data.get("seq")),
        });
    }

    None
}
