//! Composition root: one adapter registry and one live manager per feed
//! kind, shared by every view built from the hub.

use std::sync::Arc;

use pw_core::config::AppConfig;
use pw_core::ws::{TungsteniteConnector, WsConnector};
use pw_md::AdapterRegistry;
use pw_md::live::{DepthFeed, LiveDeps, LiveDepthManager, LivePriceManager, LiveTradesManager, PriceFeed, TradesFeed};
use pw_md::rest::{HttpTransport, ReqwestTransport};
use tracing::info;

use crate::live::{LiveDepthView, LivePriceView, LiveTradesView};
use crate::snapshot::{DepthView, PairsView, TickerView, TradesView};

#[derive(Clone)]
pub struct MarketHub {
    adapters: AdapterRegistry,
    prices: LivePriceManager,
    trades: LiveTradesManager,
    depth: LiveDepthManager,
    tape_capacity: usize,
}

impl MarketHub {
    pub fn new(config: &AppConfig, transport: Arc<dyn HttpTransport>, connector: Arc<dyn WsConnector>) -> Self {
        let adapters = AdapterRegistry::from_config(config, transport);
        let deps = LiveDeps {
            connector,
            adapters: adapters.clone(),
            config: config.clone(),
        };
        info!(
            "[hub] ready (indodax {}, bybit {})",
            config.exchange(pw_core::Exchange::Indodax).rest_url,
            config.exchange(pw_core::Exchange::Bybit).rest_url
        );
        Self {
            adapters,
            prices: LivePriceManager::new(PriceFeed, deps.clone()),
            trades: LiveTradesManager::new(TradesFeed, deps.clone()),
            depth: LiveDepthManager::new(DepthFeed, deps),
            tape_capacity: config.live.tape_capacity,
        }
    }

    /// Hub over reqwest and tokio-tungstenite.
    pub fn connect(config: &AppConfig) -> Self {
        Self::new(
            config,
            Arc::new(ReqwestTransport::new()),
            Arc::new(TungsteniteConnector::default()),
        )
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn price_manager(&self) -> &LivePriceManager {
        &self.prices
    }

    pub fn trades_manager(&self) -> &LiveTradesManager {
        &self.trades
    }

    pub fn depth_manager(&self) -> &LiveDepthManager {
        &self.depth
    }

    pub fn pairs(&self) -> PairsView {
        PairsView::new(self.adapters.clone())
    }

    pub fn ticker(&self) -> TickerView {
        TickerView::new(self.adapters.clone())
    }

    pub fn trades(&self) -> TradesView {
        TradesView::new(self.adapters.clone(), self.tape_capacity)
    }

    pub fn depth(&self) -> DepthView {
        DepthView::new(self.adapters.clone())
    }

    pub fn live_price(&self) -> LivePriceView {
        LivePriceView::new(self.prices.clone(), self.adapters.clone())
    }

    pub fn live_trades(&self) -> LiveTradesView {
        LiveTradesView::new(self.trades.clone(), self.adapters.clone())
    }

    pub fn live_depth(&self) -> LiveDepthView {
        LiveDepthView::new(self.depth.clone(), self.adapters.clone())
    }
}
