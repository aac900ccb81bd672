//! Live trade feed.
//!
//! Both exchanges stream trades (Indodax `market:trade-activity-{id}`, Bybit
//! `publicTrade.{SYMBOL}`). Every batch, pushed or polled, is merged into the
//! key's [`TradeTape`]; the published [`TradeFeed`] carries the ids that were
//! new in that batch so the consumer can highlight them.

use async_trait::async_trait;
use pw_core::config::LiveConfig;
use pw_core::dedup::TradeTape;
use pw_core::{FetchError, TradeEvent};

use super::protocol::{LiveFrame, Topic};
use super::{ApplyContext, Feed, LiveManager};
use crate::ExchangeAdapter;

/// Published trade payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeFeed {
    /// Newest first, at most the tape capacity.
    pub trades: Vec<TradeEvent>,
    /// Ids first seen in the latest batch.
    pub new_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TradesFeed;

pub type LiveTradesManager = LiveManager<TradesFeed>;

fn merge(tape: &mut TradeTape, batch: Vec<TradeEvent>) -> Option<TradeFeed> {
    if batch.is_empty() {
        return None;
    }
    let new_ids = tape.merge_front(batch);
    Some(TradeFeed {
        trades: tape.trades().to_vec(),
        new_ids,
    })
}

#[async_trait]
impl Feed for TradesFeed {
    type Data = TradeFeed;
    type State = TradeTape;
    type Polled = Vec<TradeEvent>;

    const NAME: &'static str = "trades";
    const TOPIC: Topic = Topic::Trades;

    fn new_state(&self, live: &LiveConfig) -> TradeTape {
        TradeTape::with_capacity(live.tape_capacity)
    }

    async fn poll(&self, adapter: &dyn ExchangeAdapter, symbol: &str) -> Result<Vec<TradeEvent>, FetchError> {
        Ok(adapter.trades(symbol).await?.data)
    }

    fn apply_poll(
        &self,
        tape: &mut TradeTape,
        _ctx: &ApplyContext<'_>,
        trades: Vec<TradeEvent>,
        _current: &TradeFeed,
    ) -> Option<TradeFeed> {
        merge(tape, trades)
    }

    fn apply_frame(
        &self,
        tape: &mut TradeTape,
        _ctx: &ApplyContext<'_>,
        frame: LiveFrame,
        _current: &TradeFeed,
    ) -> Option<TradeFeed> {
        match frame {
            LiveFrame::Trades(trades) => merge(tape, trades),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_core::config::ExchangeSettings;
    use pw_core::{Exchange, FeedKey, Side};

    fn trade(id: &str, ts: u64) -> TradeEvent {
        TradeEvent::new(Some(id.into()), ts, 1.0, 1.0, Side::Sell)
    }

    #[test]
    fn push_reports_new_ids_against_memo() {
        let key = FeedKey::new(Exchange::Bybit, "BTCUSDT");
        let settings = ExchangeSettings::defaults(Exchange::Bybit);
        let live = LiveConfig::default();
        let ctx = ApplyContext { key: &key, settings: &settings, live: &live };
        let mut tape = TradesFeed.new_state(&live);

        // REST seed, then a push overlapping it
        TradesFeed.apply_poll(&mut tape, &ctx, vec![trade("t1", 2), trade("t2", 1)], &TradeFeed::default());
        let out = TradesFeed
            .apply_frame(&mut tape, &ctx, LiveFrame::Trades(vec![trade("t3", 3), trade("t1", 2)]), &TradeFeed::default())
            .unwrap();

        let ids: Vec<&str> = out.trades.iter().map(|t| t.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t1", "t2"]);
        assert_eq!(out.new_ids, vec!["t3".to_string()]);
    }

    #[test]
    fn empty_batches_and_other_frames_publish_nothing() {
        let key = FeedKey::new(Exchange::Indodax, "btcidr");
        let settings = ExchangeSettings::defaults(Exchange::Indodax);
        let live = LiveConfig::default();
        let ctx = ApplyContext { key: &key, settings: &settings, live: &live };
        let mut tape = TradesFeed.new_state(&live);

        assert!(TradesFeed.apply_frame(&mut tape, &ctx, LiveFrame::Trades(vec![]), &TradeFeed::default()).is_none());
        assert!(TradesFeed.apply_frame(&mut tape, &ctx, LiveFrame::Ignored, &TradeFeed::default()).is_none());
    }
}
