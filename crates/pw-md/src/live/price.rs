//! Live price feed.
//!
//! Bybit streams `tickers.{SYMBOL}`; its delta pushes are completed from the
//! key's previous snapshot. Indodax has no ticker stream and is polled.
//! Where the exchange has sanity bounds configured, a polled price must carry
//! a 24h range and fall within it. A polled price equal to the current one is
//! only republished once the current one is older than
//! `price_refresh_after_ms`.

use async_trait::async_trait;
use pw_core::config::LiveConfig;
use pw_core::time_util::now_ms;
use pw_core::{FetchError, LivePrice, TickerSnapshot};
use tracing::{debug, warn};

use super::protocol::{LiveFrame, Topic};
use super::{ApplyContext, Feed, LiveManager};
use crate::ExchangeAdapter;
use crate::bybit::json_parser::complete_ticker;

/// Latest full ticker per key, used to complete deltas.
#[derive(Debug, Default)]
pub struct PriceState {
    ticker: Option<TickerSnapshot>,
}

impl PriceState {
    pub fn ticker(&self) -> Option<&TickerSnapshot> {
        self.ticker.as_ref()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceFeed;

pub type LivePriceManager = LiveManager<PriceFeed>;

fn to_live_price(symbol: &str, t: &TickerSnapshot) -> Option<LivePrice> {
    Some(LivePrice {
        symbol: symbol.to_string(),
        price: t.last_price?,
        change_percent_24h: t.change_percent_24h,
        high_24h: t.high_24h,
        low_24h: t.low_24h,
        volume_24h: t.volume_24h,
        timestamp_ms: now_ms(),
    })
}

#[async_trait]
impl Feed for PriceFeed {
    type Data = Option<LivePrice>;
    type State = PriceState;
    type Polled = TickerSnapshot;

    const NAME: &'static str = "price";
    const TOPIC: Topic = Topic::Ticker;

    fn new_state(&self, _live: &LiveConfig) -> PriceState {
        PriceState::default()
    }

    async fn poll(&self, adapter: &dyn ExchangeAdapter, symbol: &str) -> Result<TickerSnapshot, FetchError> {
        Ok(adapter.ticker(symbol).await?.data)
    }

    fn apply_poll(
        &self,
        state: &mut PriceState,
        ctx: &ApplyContext<'_>,
        ticker: TickerSnapshot,
        current: &Option<LivePrice>,
    ) -> Option<Option<LivePrice>> {
        let last = ticker.last_price.filter(|p| *p > 0.0)?;

        if let Some(bounds) = ctx.settings.heuristics.sanity_bounds {
            let (Some(high), Some(low)) = (ticker.high_24h, ticker.low_24h) else {
                warn!("[live-price-{}] polled ticker has no 24h range, dropped", ctx.key);
                return None;
            };
            if !bounds.accepts(last, high, low) {
                warn!("[live-price-{}] rejected implausible price {last} (range {low}..{high})", ctx.key);
                return None;
            }
        }

        if let Some(prev) = current {
            let age = now_ms().saturating_sub(prev.timestamp_ms);
            if prev.price == last && age < ctx.live.price_refresh_after_ms {
                debug!("[live-price-{}] unchanged price, not republished", ctx.key);
                state.ticker = Some(ticker);
                return None;
            }
        }

        let price = to_live_price(&ctx.key.symbol, &ticker);
        state.ticker = Some(ticker);
        Some(price)
    }

    fn apply_frame(
        &self,
        state: &mut PriceState,
        _ctx: &ApplyContext<'_>,
        frame: LiveFrame,
        _current: &Option<LivePrice>,
    ) -> Option<Option<LivePrice>> {
        let LiveFrame::Ticker { symbol, ticker } = frame else {
            return None;
        };
        let merged = complete_ticker(state.ticker.as_ref(), ticker);
        let price = to_live_price(&symbol, &merged);
        state.ticker = Some(merged);
        price.map(Some)
    }
}
