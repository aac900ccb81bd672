//! REST snapshot views: pair list, ticker, trades, depth.
//!
//! Each view publishes a [`Loadable`] through a watch channel and exposes
//! `refetch`. Symbol views are driven by `select(key)`; a fetch that
//! resolves after the selection moved on is discarded.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_core::dedup::TradeTape;
use pw_core::{Exchange, FeedKey, FetchError, OrderBookSnapshot, TickerSnapshot, TradingPair};
use pw_md::{AdapterRegistry, ExchangeAdapter, Fetched};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::guard::{SelectionGuard, Ticket};
use crate::state::{Loadable, TradesState};

// ---------------------------------------------------------------------------
// Pair list
// ---------------------------------------------------------------------------

struct PairsInner {
    adapters: AdapterRegistry,
    guard: SelectionGuard<Exchange>,
    tx: watch::Sender<Loadable<Vec<TradingPair>>>,
}

/// Pair list of the selected exchange.
#[derive(Clone)]
pub struct PairsView {
    inner: Arc<PairsInner>,
}

impl PairsView {
    pub fn new(adapters: AdapterRegistry) -> Self {
        Self {
            inner: Arc::new(PairsInner {
                adapters,
                guard: SelectionGuard::new(),
                tx: watch::Sender::new(Loadable::default()),
            }),
        }
    }

    pub fn state(&self) -> Loadable<Vec<TradingPair>> {
        self.inner.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Loadable<Vec<TradingPair>>> {
        self.inner.tx.subscribe()
    }

    pub fn selected(&self) -> Option<Exchange> {
        self.inner.guard.current()
    }

    /// Load the pair list of `exchange`.
    pub async fn select(&self, exchange: Exchange) {
        let inner = &self.inner;
        let (ticket, _) = inner.guard.select_with(exchange, |_| {
            inner.tx.send_replace(Loadable::loading());
        });
        self.load(ticket).await;
    }

    /// Reload the current exchange. No-op before the first `select`.
    pub async fn refetch(&self) {
        let Some(ticket) = self.inner.guard.ticket() else {
            return;
        };
        self.inner.tx.send_modify(|s| s.loading = true);
        self.load(ticket).await;
    }

    async fn load(&self, ticket: Ticket<Exchange>) {
        let exchange = *ticket.key();
        let result = self.inner.adapters.get(exchange).list_pairs().await;
        if let Err(e) = &result {
            warn!("[view-pairs-{exchange}] {e}");
        }
        let applied = self.inner.guard.if_current(&ticket, || apply(&self.inner.tx, result));
        if applied.is_none() {
            debug!("[view-pairs-{exchange}] stale result discarded");
        }
    }
}

fn apply<T>(tx: &watch::Sender<Loadable<T>>, result: Result<Fetched<T>, FetchError>) {
    match result {
        Ok(fetched) => {
            tx.send_replace(Loadable::ready(fetched));
        }
        Err(e) => tx.send_modify(|s| s.fail(e)),
    }
}

// ---------------------------------------------------------------------------
// Per-symbol snapshots
// ---------------------------------------------------------------------------

/// One per-symbol REST endpoint.
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;
    const NAME: &'static str;

    async fn fetch(adapter: &dyn ExchangeAdapter, symbol: &str) -> Result<Fetched<Self::Output>, FetchError>;
}

pub struct TickerEndpoint;

#[async_trait]
impl Endpoint for TickerEndpoint {
    type Output = TickerSnapshot;
    const NAME: &'static str = "ticker";

    async fn fetch(adapter: &dyn ExchangeAdapter, symbol: &str) -> Result<Fetched<TickerSnapshot>, FetchError> {
        adapter.ticker(symbol).await
    }
}

pub struct DepthEndpoint;

#[async_trait]
impl Endpoint for DepthEndpoint {
    type Output = OrderBookSnapshot;
    const NAME: &'static str = "depth";

    async fn fetch(adapter: &dyn ExchangeAdapter, symbol: &str) -> Result<Fetched<OrderBookSnapshot>, FetchError> {
        adapter.depth(symbol).await
    }
}

struct SymbolInner<E: Endpoint> {
    adapters: AdapterRegistry,
    guard: SelectionGuard<FeedKey>,
    tx: watch::Sender<Loadable<E::Output>>,
    _endpoint: PhantomData<E>,
}

/// REST snapshot of the selected symbol.
pub struct SymbolView<E: Endpoint> {
    inner: Arc<SymbolInner<E>>,
}

impl<E: Endpoint> Clone for SymbolView<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub type TickerView = SymbolView<TickerEndpoint>;
pub type DepthView = SymbolView<DepthEndpoint>;

impl<E: Endpoint> SymbolView<E> {
    pub fn new(adapters: AdapterRegistry) -> Self {
        Self {
            inner: Arc::new(SymbolInner {
                adapters,
                guard: SelectionGuard::new(),
                tx: watch::Sender::new(Loadable::default()),
                _endpoint: PhantomData,
            }),
        }
    }

    pub fn state(&self) -> Loadable<E::Output> {
        self.inner.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Loadable<E::Output>> {
        self.inner.tx.subscribe()
    }

    pub fn selected(&self) -> Option<FeedKey> {
        self.inner.guard.current()
    }

    /// Switch to `key` and load it. The previous symbol's data is cleared
    /// immediately.
    pub async fn select(&self, key: FeedKey) {
        let inner = &self.inner;
        let (ticket, _) = inner.guard.select_with(key, |_| {
            inner.tx.send_replace(Loadable::loading());
        });
        self.load(ticket).await;
    }

    pub async fn refetch(&self) {
        let Some(ticket) = self.inner.guard.ticket() else {
            return;
        };
        self.inner.tx.send_modify(|s| s.loading = true);
        self.load(ticket).await;
    }

    async fn load(&self, ticket: Ticket<FeedKey>) {
        let key = ticket.key();
        let adapter = self.inner.adapters.get(key.exchange);
        let result = E::fetch(adapter.as_ref(), &key.symbol).await;
        if let Err(e) = &result {
            warn!("[view-{}-{key}] {e}", E::NAME);
        }
        if self.inner.guard.if_current(&ticket, || apply(&self.inner.tx, result)).is_none() {
            debug!("[view-{}-{key}] stale result discarded", E::NAME);
        }
    }
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

struct TradesInner {
    adapters: AdapterRegistry,
    guard: SelectionGuard<FeedKey>,
    tape: Mutex<TradeTape>,
    tx: watch::Sender<TradesState>,
}

/// Recent trades of the selected symbol, with new-id detection across
/// refetches.
#[derive(Clone)]
pub struct TradesView {
    inner: Arc<TradesInner>,
}

impl TradesView {
    pub fn new(adapters: AdapterRegistry, tape_capacity: usize) -> Self {
        Self {
            inner: Arc::new(TradesInner {
                adapters,
                guard: SelectionGuard::new(),
                tape: Mutex::new(TradeTape::with_capacity(tape_capacity)),
                tx: watch::Sender::new(TradesState::default()),
            }),
        }
    }

    pub fn state(&self) -> TradesState {
        self.inner.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<TradesState> {
        self.inner.tx.subscribe()
    }

    pub fn selected(&self) -> Option<FeedKey> {
        self.inner.guard.current()
    }

    /// Switch to `key`. The id memo starts over, so the first load reports
    /// every trade as new.
    pub async fn select(&self, key: FeedKey) {
        let inner = &self.inner;
        let (ticket, _) = inner.guard.select_with(key, |_| {
            inner.tape.lock().clear();
            inner.tx.send_replace(TradesState {
                trades: Loadable::loading(),
                new_ids: Vec::new(),
            });
        });
        self.load(ticket).await;
    }

    pub async fn refetch(&self) {
        let Some(ticket) = self.inner.guard.ticket() else {
            return;
        };
        self.inner.tx.send_modify(|s| s.trades.loading = true);
        self.load(ticket).await;
    }

    async fn load(&self, ticket: Ticket<FeedKey>) {
        let key = ticket.key();
        let adapter = self.inner.adapters.get(key.exchange);
        let result = adapter.trades(&key.symbol).await;
        if let Err(e) = &result {
            warn!("[view-trades-{key}] {e}");
        }

        let inner = &self.inner;
        let applied = inner.guard.if_current(&ticket, || match result {
            Ok(fetched) => {
                let mut tape = inner.tape.lock();
                let new_ids = tape.replace(fetched.data);
                let trades = Fetched {
                    data: tape.trades().to_vec(),
                    cached: fetched.cached,
                    fetched_at_ms: fetched.fetched_at_ms,
                };
                inner.tx.send_replace(TradesState {
                    trades: Loadable::ready(trades),
                    new_ids,
                });
            }
            Err(e) => inner.tx.send_modify(|s| s.trades.fail(e)),
        });
        if applied.is_none() {
            debug!("[view-trades-{key}] stale result discarded");
        }
    }
}

