//! Live order-book feed.
//!
//! Bybit streams `orderbook.50.{SYMBOL}`: a snapshot, then deltas applied to
//! a local [`OrderBook`]. The whole book is republished after each message.
//! Indodax books are polled and replace the published book wholesale.

use async_trait::async_trait;
use pw_core::config::LiveConfig;
use pw_core::{FetchError, OrderBookSnapshot};
use tracing::debug;

use super::protocol::{LiveFrame, Topic};
use super::{ApplyContext, Feed, LiveManager};
use crate::ExchangeAdapter;
use crate::bybit::BOOK_DEPTH;
use crate::bybit::json_parser::BookUpdateKind;
use crate::order_book::OrderBook;

#[derive(Debug, Clone, Copy, Default)]
pub struct DepthFeed;

pub type LiveDepthManager = LiveManager<DepthFeed>;

#[async_trait]
impl Feed for DepthFeed {
    type Data = Option<OrderBookSnapshot>;
    type State = OrderBook<BOOK_DEPTH>;
    type Polled = OrderBookSnapshot;

    const NAME: &'static str = "depth";
    const TOPIC: Topic = Topic::Book;

    fn new_state(&self, _live: &LiveConfig) -> OrderBook<BOOK_DEPTH> {
        OrderBook::new()
    }

    async fn poll(&self, adapter: &dyn ExchangeAdapter, symbol: &str) -> Result<OrderBookSnapshot, FetchError> {
        Ok(adapter.depth(symbol).await?.data)
    }

    fn apply_poll(
        &self,
        book: &mut OrderBook<BOOK_DEPTH>,
        _ctx: &ApplyContext<'_>,
        snapshot: OrderBookSnapshot,
        _current: &Option<OrderBookSnapshot>,
    ) -> Option<Option<OrderBookSnapshot>> {
        // keep the local book in step so a later stream delta has a base
        let bids: Vec<[f64; 2]> = snapshot.bids.iter().map(|l| [l.price, l.size]).collect();
        let asks: Vec<[f64; 2]> = snapshot.asks.iter().map(|l| [l.price, l.size]).collect();
        book.set_snapshot(&bids, &asks);
        book.stamp(snapshot.last_update_ms, snapshot.sequence);
        Some(Some(snapshot))
    }

    fn apply_frame(
        &self,
        book: &mut OrderBook<BOOK_DEPTH>,
        ctx: &ApplyContext<'_>,
        frame: LiveFrame,
        _current: &Option<OrderBookSnapshot>,
    ) -> Option<Option<OrderBookSnapshot>> {
        let LiveFrame::Book { kind, bids, asks, ts_ms, seq } = frame else {
            return None;
        };
        match kind {
            BookUpdateKind::Snapshot => book.set_snapshot(&bids, &asks),
            BookUpdateKind::Delta if book.is_empty() => {
                debug!("[live-depth-{}] delta before snapshot, dropped", ctx.key);
                return None;
            }
            BookUpdateKind::Delta => book.update(&bids, &asks),
        }
        book.stamp(ts_ms, seq);
        Some(Some(book.snapshot()))
    }
}
