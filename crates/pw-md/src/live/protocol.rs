//! Per-exchange WebSocket session protocol.
//!
//! Maps each exchange's handshake, subscription and frame shapes onto one
//! [`LiveFrame`] vocabulary the live engine understands:
//!
//! | Step       | Indodax                                  | Bybit                          |
//! |------------|------------------------------------------|--------------------------------|
//! | Handshake  | `{"params":{"token":..},"id":1}`         | `{"req_id":..,"op":"ping"}`    |
//! | Ack        | reply with `id == 1` and a `result`      | `op == "pong"` or `ret_msg == "pong"` |
//! | Subscribe  | `market:trade-activity-{id}` as `id: 2`  | `tickers.` / `publicTrade.` / `orderbook.50.` |
//! | Keep-alive | none                                     | `ping` every 20s               |

use std::time::Duration;

use pw_core::config::ExchangeSettings;
use pw_core::{Exchange, FetchError, TickerSnapshot, TradeEvent};

use crate::bybit::json_parser::{BookUpdateKind, BybitFrame};
use crate::indodax::json_parser::IndodaxFrame;
use crate::{bybit, indodax};

/// What a live session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Ticker,
    Trades,
    Book,
}

/// One decoded inbound frame, already filtered to the session's symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveFrame {
    HandshakeAck,
    SubscribeAck,
    /// Handshake or subscription refused; the session is failed.
    Rejected(String),
    Ticker { symbol: String, ticker: TickerSnapshot },
    Trades(Vec<TradeEvent>),
    Book {
        kind: BookUpdateKind,
        bids: Vec<[f64; 2]>,
        asks: Vec<[f64; 2]>,
        ts_ms: u64,
        seq: Option<u64>,
    },
    /// Known shape that does not concern this session.
    Ignored,
    /// Shape not recognized at all.
    Unknown,
}

/// Session protocol for one (exchange, symbol).
#[derive(Debug, Clone)]
pub struct Protocol {
    exchange: Exchange,
    symbol: String,
    ws_url: String,
    token: Option<String>,
    ping_interval: Duration,
}

impl Protocol {
    pub fn new(settings: &ExchangeSettings, symbol: &str) -> Self {
        let symbol = match settings.exchange {
            Exchange::Indodax => symbol.to_ascii_lowercase(),
            Exchange::Bybit => symbol.to_ascii_uppercase(),
        };
        Self {
            exchange: settings.exchange,
            symbol,
            ws_url: settings.ws_url.clone(),
            token: settings.ws_token.clone(),
            ping_interval: settings.ping_interval,
        }
    }

    /// Whether `exchange` can stream `topic`. Everything else is polled.
    pub fn supports(exchange: Exchange, topic: Topic) -> bool {
        match exchange {
            Exchange::Indodax => topic == Topic::Trades,
            Exchange::Bybit => true,
        }
    }

    pub fn url(&self) -> &str {
        &self.ws_url
    }

    /// First message after the socket opens.
    pub fn handshake(&self) -> Result<String, FetchError> {
        match self.exchange {
            Exchange::Indodax => {
                let token = self
                    .token
                    .as_deref()
                    .ok_or_else(|| FetchError::Connection("indodax websocket token not configured".into()))?;
                Ok(indodax::build_connect(token))
            }
            Exchange::Bybit => Ok(bybit::build_ping()),
        }
    }

    /// Subscription sent after the handshake ack.
    pub fn subscribe(&self, topic: Topic) -> Result<String, FetchError> {
        match (self.exchange, topic) {
            (Exchange::Indodax, Topic::Trades) => Ok(indodax::build_subscribe(&self.symbol)),
            (Exchange::Bybit, Topic::Ticker) => Ok(bybit::build_subscribe(&bybit::ticker_topic(&self.symbol))),
            (Exchange::Bybit, Topic::Trades) => Ok(bybit::build_subscribe(&bybit::trade_topic(&self.symbol))),
            (Exchange::Bybit, Topic::Book) => Ok(bybit::build_subscribe(&bybit::book_topic(&self.symbol))),
            (exchange, topic) => Err(FetchError::Connection(format!(
                "{exchange} has no {topic:?} stream"
            ))),
        }
    }

    /// Application-level keep-alive, if the exchange wants one.
    pub fn keepalive(&self) -> Option<(Duration, String)> {
        match self.exchange {
            Exchange::Indodax => None,
            Exchange::Bybit => Some((self.ping_interval, bybit::build_ping())),
        }
    }

    pub fn decode(&self, text: &str) -> LiveFrame {
        match self.exchange {
            Exchange::Indodax => self.decode_indodax(text),
            Exchange::Bybit => self.decode_bybit(text),
        }
    }

    fn decode_indodax(&self, text: &str) -> LiveFrame {
        match indodax::json_parser::decode_frame(text) {
            Some(IndodaxFrame::Reply { id: indodax::CONNECT_REQ_ID }) => LiveFrame::HandshakeAck,
            Some(IndodaxFrame::Reply { id: indodax::SUBSCRIBE_REQ_ID }) => LiveFrame::SubscribeAck,
            Some(IndodaxFrame::Reply { .. }) | Some(IndodaxFrame::Other { .. }) => LiveFrame::Ignored,
            Some(IndodaxFrame::ErrorReply { message, .. }) => LiveFrame::Rejected(message),
            Some(IndodaxFrame::Trades { channel, trades }) => {
                if channel == indodax::trade_channel(&self.symbol) {
                    LiveFrame::Trades(trades)
                } else {
                    LiveFrame::Ignored
                }
            }
            None => LiveFrame::Unknown,
        }
    }

    fn decode_bybit(&self, text: &str) -> LiveFrame {
        match bybit::json_parser::decode_frame(text) {
            Some(BybitFrame::Pong) => LiveFrame::HandshakeAck,
            Some(BybitFrame::SubscribeAck { success: true, .. }) => LiveFrame::SubscribeAck,
            Some(BybitFrame::SubscribeAck { success: false, message }) => LiveFrame::Rejected(message),
            Some(BybitFrame::Ticker { symbol, ticker }) if symbol == self.symbol => {
                LiveFrame::Ticker { symbol, ticker }
            }
            Some(BybitFrame::Trades { symbol, trades }) if symbol == self.symbol => LiveFrame::Trades(trades),
            Some(BybitFrame::Book { symbol, kind, bids, asks, ts_ms, seq }) if symbol == self.symbol => {
                LiveFrame::Book { kind, bids, asks, ts_ms, seq }
            }
            Some(_) => LiveFrame::Ignored,
            None => LiveFrame::Unknown,
        }
    }
}
