//! Indodax JSON payload parsers.
//!
//! REST payloads: `/pairs`, `/ticker/{id}`, `/trades/{id}`, `/depth/{id}`.
//! WebSocket frames follow the Centrifugo protocol: replies carry the request
//! `id`, publications carry `result.channel` with the rows under
//! `result.data.data`.

use pw_core::time_util::now_ms;
use pw_core::{FetchError, OrderBookSnapshot, Side, TickerSnapshot, TradeEvent, TradingPair};
use serde_json::Value;

use crate::MAX_PAIRS;
use crate::json_util::{expect_array, parse_f64_field, parse_levels, parse_str_f64, parse_str_u64, string_field};

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

/// `/pairs` → pairs, capped at [`MAX_PAIRS`].
///
/// Indodax names the quote currency `base_currency` (e.g. `idr`) and the base
/// currency `traded_currency` (e.g. `btc`); both are normalized here.
pub fn parse_pairs(v: &Value) -> Result<Vec<TradingPair>, FetchError> {
    let rows = expect_array(v, "indodax pairs")?;
    let now = now_ms();
    Ok(rows
        .iter()
        .filter_map(|row| {
            let id = string_field(row, "id")?.to_ascii_lowercase();
            let base = string_field(row, "traded_currency").unwrap_or_default().to_ascii_uppercase();
            let quote = string_field(row, "base_currency").unwrap_or_default().to_ascii_uppercase();
            let symbol = string_field(row, "symbol").unwrap_or_else(|| id.to_ascii_uppercase());
            let display = format!("{base}/{quote}");
            let description = string_field(row, "description").unwrap_or_else(|| display.clone());
            let maintenance = flag(row, "is_maintenance");
            let suspended = flag(row, "is_market_suspended");
            Some(TradingPair {
                id,
                symbol,
                base_currency: base,
                quote_currency: quote,
                display_symbol: display,
                description,
                is_active: !maintenance && !suspended,
                last_update_ms: now,
            })
        })
        .take(MAX_PAIRS)
        .collect())
}

/// Indodax flags come as `0`/`1`, `"0"`/`"1"` or booleans.
fn flag(row: &Value, key: &str) -> bool {
    match row.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(other) => parse_str_u64(Some(other)).is_some_and(|n| n != 0),
        None => false,
    }
}

/// `/ticker/{id}` → snapshot. Accepts `{ticker: {...}}` or the bare object.
///
/// `quote` selects the `vol_<quote>` volume field, falling back to `vol_idr`.
pub fn parse_ticker(v: &Value, quote: &str, midrange_change: bool) -> Result<TickerSnapshot, FetchError> {
    let t = v.get("ticker").unwrap_or(v);
    if !t.is_object() {
        return Err(FetchError::MalformedData("indodax ticker: expected object".into()));
    }
    let volume = parse_f64_field(t, &format!("vol_{}", quote.to_ascii_lowercase()))
        .or_else(|| parse_f64_field(t, "vol_idr"));
    let mut snap = TickerSnapshot {
        last_price: parse_f64_field(t, "last"),
        high_24h: parse_f64_field(t, "high"),
        low_24h: parse_f64_field(t, "low"),
        bid_price: parse_f64_field(t, "buy"),
        ask_price: parse_f64_field(t, "sell"),
        volume_24h: volume,
        change_percent_24h: None,
        server_time_seconds: parse_str_u64(t.get("server_time")).unwrap_or(0),
        fetched_at_ms: now_ms(),
    };
    if midrange_change {
        snap.change_percent_24h = midrange_change_percent(&snap);
    }
    Ok(snap)
}

/// Estimated 24h change: distance of `last` from the middle of the 24h range.
/// Only produced when volume is reported and the range is non-degenerate.
pub fn midrange_change_percent(t: &TickerSnapshot) -> Option<f64> {
    t.volume_24h?;
    let (last, high, low) = (t.last_price?, t.high_24h?, t.low_24h?);
    let mid = (high + low) / 2.0;
    if mid <= 0.0 {
        return None;
    }
    Some((last - mid) / mid * 100.0)
}

/// `/trades/{id}` → trades in upstream order.
pub fn parse_trades(v: &Value) -> Result<Vec<TradeEvent>, FetchError> {
    let rows = expect_array(v, "indodax trades")?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            Some(TradeEvent::new(
                string_field(row, "tid"),
                parse_str_u64(row.get("date"))?,
                parse_f64_field(row, "price")?,
                parse_f64_field(row, "amount")?,
                Side::from_label(row.get("type").and_then(Value::as_str).unwrap_or("")),
            ))
        })
        .collect())
}

/// `/depth/{id}` → book. Indodax already orders bids descending and asks
/// ascending.
pub fn parse_depth(v: &Value) -> Result<OrderBookSnapshot, FetchError> {
    if !v.is_object() {
        return Err(FetchError::MalformedData("indodax depth: expected object".into()));
    }
    Ok(OrderBookSnapshot {
        bids: parse_levels(v.get("buy")),
        asks: parse_levels(v.get("sell")),
        last_update_ms: now_ms(),
        sequence: None,
    })
}

// ---------------------------------------------------------------------------
// WebSocket frames
// ---------------------------------------------------------------------------

/// Known inbound Indodax frame shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum IndodaxFrame {
    /// Reply to a request by `id` (1 = connect, 2 = subscribe).
    Reply { id: u64 },
    /// Rejected request.
    ErrorReply { id: Option<u64>, message: String },
    /// Trade rows published on `market:trade-activity-{pair}`.
    Trades { channel: String, trades: Vec<TradeEvent> },
    /// Publication on some other channel.
    Other { channel: String },
}

/// Decode one text frame. `None` for anything not matching a known shape.
///
/// Trade rows are arrays: `[pair, ts_seconds, seq, side, price, quote_volume, amount]`;
/// the sequence number doubles as the trade id.
pub fn decode_frame(text: &str) -> Option<IndodaxFrame> {
    let v: Value = serde_json::from_str(text).ok()?;
    let id = v.get("id").and_then(Value::as_u64);

    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Some(IndodaxFrame::ErrorReply { id, message });
    }

    let result = v.get("result")?;
    if let Some(id) = id {
        return Some(IndodaxFrame::Reply { id });
    }

    let channel = result.get("channel").and_then(Value::as_str)?.to_string();
    if !channel.starts_with("market:trade-activity-") {
        return Some(IndodaxFrame::Other { channel });
    }
    let rows = result.get("data")?.get("data")?.as_array()?;
    let trades = rows.iter().filter_map(parse_trade_row).collect();
    Some(IndodaxFrame::Trades { channel, trades })
}

fn parse_trade_row(row: &Value) -> Option<TradeEvent> {
    let row = row.as_array()?;
    let seq = row.get(2).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    Some(TradeEvent::new(
        seq,
        parse_str_u64(row.get(1))?,
        parse_str_f64(row.get(4))?,
        parse_str_f64(row.get(6))?,
        Side::from_label(row.get(3).and_then(Value::as_str).unwrap_or("")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pairs_are_normalized() {
        let v = json!([
            { "id": "BTCIDR", "symbol": "BTCIDR", "base_currency": "idr", "traded_currency": "btc",
              "description": "BTC/IDR", "is_maintenance": 0, "is_market_suspended": 0 },
            { "id": "ethidr", "base_currency": "idr", "traded_currency": "eth", "is_maintenance": 1 },
            { "nope": true }
        ]);
        let pairs = parse_pairs(&v).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].id, "btcidr");
        assert_eq!(pairs[0].base_currency, "BTC");
        assert_eq!(pairs[0].quote_currency, "IDR");
        assert_eq!(pairs[0].display_symbol, "BTC/IDR");
        assert!(pairs[0].is_active);
        assert!(!pairs[1].is_active);
        assert_eq!(pairs[1].symbol, "ETHIDR");
    }

    #[test]
    fn pairs_are_capped() {
        let rows: Vec<Value> = (0..450)
            .map(|i| json!({ "id": format!("c{i}idr"), "base_currency": "idr", "traded_currency": format!("c{i}") }))
            .collect();
        assert_eq!(parse_pairs(&Value::Array(rows)).unwrap().len(), MAX_PAIRS);
    }

    #[test]
    fn pairs_wrong_shape() {
        assert!(matches!(parse_pairs(&json!({ "error": "x" })), Err(FetchError::MalformedData(_))));
    }

    #[test]
    fn ticker_wrapped_and_bare() {
        let body = json!({ "ticker": {
            "high": "110", "low": "90", "last": "105", "buy": "104", "sell": "106",
            "vol_btc": "3.5", "vol_idr": "350", "server_time": 1700000000
        }});
        let t = parse_ticker(&body, "IDR", false).unwrap();
        assert_eq!(t.last_price, Some(105.0));
        assert_eq!(t.bid_price, Some(104.0));
        assert_eq!(t.volume_24h, Some(350.0));
        assert_eq!(t.server_time_seconds, 1_700_000_000);
        assert_eq!(t.change_percent_24h, None);

        let bare = parse_ticker(&json!({ "last": "1", "vol_usdt": "9" }), "usdt", false).unwrap();
        assert_eq!(bare.volume_24h, Some(9.0));
        assert_eq!(bare.high_24h, None);
    }

    #[test]
    fn midrange_heuristic() {
        let body = json!({ "high": "110", "low": "90", "last": "105", "vol_idr": "1" });
        let t = parse_ticker(&body, "idr", true).unwrap();
        assert!((t.change_percent_24h.unwrap() - 5.0).abs() < 1e-9);

        let no_vol = json!({ "high": "110", "low": "90", "last": "105" });
        assert_eq!(parse_ticker(&no_vol, "idr", true).unwrap().change_percent_24h, None);
    }

    #[test]
    fn trades_and_depth() {
        let trades = parse_trades(&json!([
            { "date": "1700000001", "price": "100", "amount": "0.5", "tid": "77", "type": "buy" },
            { "date": 1700000000, "price": 99, "amount": 1, "type": "SELL" }
        ]))
        .unwrap();
        assert_eq!(trades[0].trade_id, "77");
        assert_eq!(trades[0].side, Side::Buy);
        assert_eq!(trades[1].trade_id, "1700000000-99-1");
        assert_eq!(trades[1].side, Side::Sell);

        let book = parse_depth(&json!({ "buy": [["100", "1"]], "sell": [[101, 2]] })).unwrap();
        assert_eq!(book.best_bid().unwrap().price, 100.0);
        assert_eq!(book.best_ask().unwrap().size, 2.0);
    }

    #[test]
    fn frames() {
        assert_eq!(
            decode_frame(r#"{"id":1,"result":{"client":"c","version":"3"}}"#),
            Some(IndodaxFrame::Reply { id: 1 })
        );
        assert!(matches!(
            decode_frame(r#"{"id":1,"error":{"code":109,"message":"token expired"}}"#),
            Some(IndodaxFrame::ErrorReply { id: Some(1), .. })
        ));

        let push = r#"{"result":{"channel":"market:trade-activity-btcidr","data":{"data":[
            ["btcidr",1700000000,9001,"buy",650000000,"65000","0.0001"]
        ],"offset":1}}}"#;
        match decode_frame(push) {
            Some(IndodaxFrame::Trades { channel, trades }) => {
                assert_eq!(channel, "market:trade-activity-btcidr");
                assert_eq!(trades.len(), 1);
                assert_eq!(trades[0].trade_id, "9001");
                assert_eq!(trades[0].price, 650_000_000.0);
                assert_eq!(trades[0].amount, 0.0001);
                assert_eq!(trades[0].timestamp_seconds, 1_700_000_000);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(decode_frame("not json"), None);
        assert_eq!(decode_frame(r#"{"hello":1}"#), None);
    }
}
