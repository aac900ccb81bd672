//! Live feed engine.
//!
//! A [`LiveManager`] owns every live session for one feed kind (price,
//! trades, depth), keyed by [`FeedKey`]. Subscribers share a session:
//!
//! - [`LiveManager::acquire`] bumps the key's reference count, starting a
//!   session when none is running, and returns a [`Subscription`] watching
//!   the key's [`FeedView`].
//! - Dropping the subscription (or [`LiveManager::release`]) decrements the
//!   count. At zero the session task is aborted, which closes its socket and
//!   cancels any pending reconnect sleep, and the key's state is removed.
//! - [`LiveManager::disconnect`] tears the session down and resets the
//!   key's state regardless of subscribers. Keys still subscribed get a
//!   fresh session under a new epoch right away.
//!
//! # Sessions
//!
//! A session is a task that loops: connect (or start polling), run until
//! the socket closes or fails, then reconnect after
//! `min(base * 2^retry_count, max)` while the key still has subscribers.
//!
//! Status moves `disconnected → connecting → connected`; a failure moves
//! through `error` to `disconnected` before the next attempt. `retry_count`
//! increments per scheduled reconnect (or failed poll) and resets on a
//! handshake ack or a successful poll.
//!
//! # Stale writes
//!
//! Every session carries an epoch. State writes happen under the manager
//! lock, never across an `.await`, and only while the key's current epoch
//! still equals the session's, so a torn-down session can never touch a
//! newer session's state.

pub mod depth;
pub mod price;
pub mod protocol;
pub mod trades;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;
use pw_core::config::{AppConfig, ExchangeSettings, LiveConfig};
use pw_core::time_util::now_ms;
use pw_core::ws::{WsConnector, WsEvent};
use pw_core::{ConnectionState, ConnectionStatus, Exchange, FeedKey, FeedSource, FetchError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tracing::{debug, info, warn};

use self::protocol::{LiveFrame, Protocol, Topic};
use crate::ExchangeAdapter;
use crate::registry::AdapterRegistry;

pub use depth::{DepthFeed, LiveDepthManager};
pub use price::{LivePriceManager, PriceFeed};
pub use trades::{LiveTradesManager, TradeFeed, TradesFeed};

// ---------------------------------------------------------------------------
// Feed kinds
// ---------------------------------------------------------------------------

/// What a feed applies an update against.
pub struct ApplyContext<'a> {
    pub key: &'a FeedKey,
    pub settings: &'a ExchangeSettings,
    pub live: &'a LiveConfig,
}

/// One kind of live feed: what it subscribes to, how it polls, and how
/// updates fold into the published data.
///
/// `apply_*` run under the manager lock and must not block. They return the
/// new data to publish, or `None` to leave the current data untouched.
#[async_trait]
pub trait Feed: Send + Sync + 'static {
    /// Published payload.
    type Data: Clone + Default + Send + Sync + 'static;
    /// Per-key memo kept next to the payload (trade ids, local book, ...).
    type State: Send + 'static;
    /// Result of one REST poll.
    type Polled: Send + 'static;

    /// Name used in config (`price`, `trades`, `depth`) and log prefixes.
    const NAME: &'static str;
    const TOPIC: Topic;

    fn new_state(&self, live: &LiveConfig) -> Self::State;

    async fn poll(&self, adapter: &dyn ExchangeAdapter, symbol: &str) -> Result<Self::Polled, FetchError>;

    fn apply_poll(
        &self,
        state: &mut Self::State,
        ctx: &ApplyContext<'_>,
        polled: Self::Polled,
        current: &Self::Data,
    ) -> Option<Self::Data>;

    fn apply_frame(
        &self,
        state: &mut Self::State,
        ctx: &ApplyContext<'_>,
        frame: LiveFrame,
        current: &Self::Data,
    ) -> Option<Self::Data>;
}

/// Latest payload plus connection bookkeeping for one key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedView<D> {
    pub data: D,
    pub connection: ConnectionState,
}

/// Collaborators shared by every manager.
#[derive(Clone)]
pub struct LiveDeps {
    pub connector: Arc<dyn WsConnector>,
    pub adapters: AdapterRegistry,
    pub config: AppConfig,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

struct Shared<F> {
    feed: F,
    connector: Arc<dyn WsConnector>,
    adapters: AdapterRegistry,
    live: LiveConfig,
    indodax: ExchangeSettings,
    bybit: ExchangeSettings,
}

impl<F: Feed> Shared<F> {
    fn settings(&self, exchange: Exchange) -> &ExchangeSettings {
        match exchange {
            Exchange::Indodax => &self.indodax,
            Exchange::Bybit => &self.bybit,
        }
    }

    /// Configured source, falling back to polling where the exchange has no
    /// stream for this feed.
    fn source(&self, exchange: Exchange) -> FeedSource {
        let configured = self.settings(exchange).source_for(F::NAME);
        if configured == FeedSource::Stream && !Protocol::supports(exchange, F::TOPIC) {
            FeedSource::Poll
        } else {
            configured
        }
    }
}

struct Entry<F: Feed> {
    refcount: usize,
    epoch: u64,
    tx: watch::Sender<FeedView<F::Data>>,
    state: F::State,
    task: Option<JoinHandle<()>>,
}

impl<F: Feed> Entry<F> {
    fn connection(&self) -> ConnectionState {
        self.tx.borrow().connection
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.tx.send_modify(|v| {
            v.connection.status = status;
            v.connection.last_update_ms = now_ms();
        });
    }

    fn mark_connected(&self) {
        self.tx.send_modify(|v| {
            v.connection.status = ConnectionStatus::Connected;
            v.connection.retry_count = 0;
            v.connection.last_update_ms = now_ms();
        });
    }

    fn publish(&self, data: F::Data) {
        self.tx.send_modify(|v| {
            v.data = data;
            v.connection.last_update_ms = now_ms();
        });
    }

    /// Run `apply` against the current payload and publish what it returns.
    fn fold(&mut self, apply: impl FnOnce(&mut F::State, &F::Data) -> Option<F::Data>) -> bool {
        let update = {
            let current = self.tx.borrow();
            apply(&mut self.state, &current.data)
        };
        match update {
            Some(data) => {
                self.publish(data);
                true
            }
            None => false,
        }
    }
}

struct Inner<F: Feed> {
    shared: Arc<Shared<F>>,
    entries: Mutex<AHashMap<FeedKey, Entry<F>>>,
    next_epoch: AtomicU64,
}

impl<F: Feed> Inner<F> {
    fn fresh_epoch(&self) -> u64 {
        self.next_epoch.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Run `f` on `key`'s entry if `epoch` is still the key's current epoch.
    fn with_current<R>(
        &self,
        key: &FeedKey,
        epoch: u64,
        f: impl FnOnce(&mut Entry<F>, &Shared<F>) -> R,
    ) -> Option<R> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        if entry.epoch != epoch {
            return None;
        }
        Some(f(entry, &*self.shared))
    }

    /// Spawn a session for `key` under a fresh epoch. Called with the
    /// entries lock held.
    fn start_session(self: &Arc<Self>, entry: &mut Entry<F>, key: &FeedKey) {
        let epoch = self.fresh_epoch();
        entry.epoch = epoch;
        entry.set_status(ConnectionStatus::Connecting);
        info!("[live-{}-{key}] starting session (epoch {epoch})", F::NAME);
        entry.task = Some(tokio::spawn(run_session(
            self.shared.clone(),
            Arc::downgrade(self),
            key.clone(),
            epoch,
        )));
    }

    fn release_key(&self, key: &FeedKey) {
        let task = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            entry.refcount = entry.refcount.saturating_sub(1);
            if entry.refcount > 0 {
                return;
            }
            let Some(mut entry) = entries.remove(key) else {
                return;
            };
            entry.tx.send_replace(FeedView::default());
            entry.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        info!("[live-{}-{key}] last subscriber left, torn down", F::NAME);
    }
}

impl<F: Feed> Drop for Inner<F> {
    fn drop(&mut self) {
        for entry in self.entries.get_mut().values_mut() {
            if let Some(task) = entry.task.take() {
                task.abort();
            }
        }
    }
}

/// Shared, reference-counted live sessions for one feed kind.
pub struct LiveManager<F: Feed> {
    inner: Arc<Inner<F>>,
}

impl<F: Feed> Clone for LiveManager<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: Feed> LiveManager<F> {
    pub fn new(feed: F, deps: LiveDeps) -> Self {
        let shared = Shared {
            feed,
            connector: deps.connector,
            adapters: deps.adapters,
            indodax: deps.config.exchange(Exchange::Indodax),
            bybit: deps.config.exchange(Exchange::Bybit),
            live: deps.config.live,
        };
        Self {
            inner: Arc::new(Inner {
                shared: Arc::new(shared),
                entries: Mutex::new(AHashMap::new()),
                next_epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to `key`, starting its session if none is running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn acquire(&self, key: FeedKey) -> Subscription<F> {
        let inner = &self.inner;
        let mut entries = inner.entries.lock();
        let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
            refcount: 0,
            epoch: 0,
            tx: watch::Sender::new(FeedView::default()),
            state: inner.shared.feed.new_state(&inner.shared.live),
            task: None,
        });
        entry.refcount += 1;

        if entry.task.is_none() {
            inner.start_session(entry, &key);
        } else {
            debug!("[live-{}-{key}] joined, {} subscribers", F::NAME, entry.refcount);
        }

        let rx = entry.tx.subscribe();
        Subscription {
            key,
            rx,
            inner: inner.clone(),
        }
    }

    /// Unsubscribe. Equivalent to dropping the subscription.
    pub fn release(&self, subscription: Subscription<F>) {
        drop(subscription);
    }

    /// Tear down `key`'s session and reset its state, whatever the
    /// subscriber count. Nothing the old session has in flight reaches the
    /// key afterwards. If the key still has subscribers a fresh session
    /// starts immediately.
    pub fn disconnect(&self, key: &FeedKey) {
        let inner = &self.inner;
        let (task, restarted) = {
            let mut entries = inner.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            entry.epoch = inner.fresh_epoch();
            entry.state = inner.shared.feed.new_state(&inner.shared.live);
            entry.tx.send_replace(FeedView::default());
            let task = entry.task.take();
            let restarted = entry.refcount > 0;
            if restarted {
                inner.start_session(entry, key);
            }
            (task, restarted)
        };
        if let Some(task) = task {
            task.abort();
        }
        info!("[live-{}-{key}] disconnected (restarted: {restarted})", F::NAME);
    }

    /// Fold an externally fetched snapshot (e.g. the initial REST load) into
    /// a live key. Returns `false` when the key is not live or nothing changed.
    pub fn seed(&self, key: &FeedKey, polled: F::Polled) -> bool {
        let mut entries = self.inner.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        let shared = &self.inner.shared;
        let ctx = ApplyContext {
            key,
            settings: shared.settings(key.exchange),
            live: &shared.live,
        };
        entry.fold(|state, current| shared.feed.apply_poll(state, &ctx, polled, current))
    }

    pub fn subscriber_count(&self, key: &FeedKey) -> usize {
        self.inner.entries.lock().get(key).map_or(0, |e| e.refcount)
    }

    /// Whether a session task is running for `key`.
    pub fn is_live(&self, key: &FeedKey) -> bool {
        self.inner.entries.lock().get(key).is_some_and(|e| e.task.is_some())
    }

    pub fn view(&self, key: &FeedKey) -> Option<FeedView<F::Data>> {
        self.inner.entries.lock().get(key).map(|e| e.tx.borrow().clone())
    }

    pub fn active_keys(&self) -> Vec<FeedKey> {
        self.inner.entries.lock().keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A subscriber's handle on one key. Releases the key when dropped.
pub struct Subscription<F: Feed> {
    key: FeedKey,
    rx: watch::Receiver<FeedView<F::Data>>,
    inner: Arc<Inner<F>>,
}

impl<F: Feed> Subscription<F> {
    pub fn key(&self) -> &FeedKey {
        &self.key
    }

    /// Copy of the latest view.
    pub fn current(&self) -> FeedView<F::Data> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published change. `false` once the manager is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Copy of the latest view, marking it seen.
    pub fn current_and_mark_seen(&mut self) -> FeedView<F::Data> {
        self.rx.borrow_and_update().clone()
    }

    /// Another receiver on the key's view. It does not count as a
    /// subscriber.
    pub fn watcher(&self) -> watch::Receiver<FeedView<F::Data>> {
        self.rx.clone()
    }

    /// Underlying watch receiver, for `select!` loops.
    pub fn receiver(&mut self) -> &mut watch::Receiver<FeedView<F::Data>> {
        &mut self.rx
    }
}

impl<F: Feed> Drop for Subscription<F> {
    fn drop(&mut self) {
        self.inner.release_key(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

fn with_session<F: Feed, R>(
    inner: &Weak<Inner<F>>,
    key: &FeedKey,
    epoch: u64,
    f: impl FnOnce(&mut Entry<F>, &Shared<F>) -> R,
) -> Option<R> {
    inner.upgrade()?.with_current(key, epoch, f)
}

async fn run_session<F: Feed>(shared: Arc<Shared<F>>, inner: Weak<Inner<F>>, key: FeedKey, epoch: u64) {
    let tag = format!("live-{}-{key}", F::NAME);
    let source = shared.source(key.exchange);

    loop {
        if with_session(&inner, &key, epoch, |e, _| e.set_status(ConnectionStatus::Connecting)).is_none() {
            return;
        }

        let result = match source {
            FeedSource::Stream => run_stream(&shared, &inner, &key, epoch, &tag).await,
            FeedSource::Poll => run_poll(&shared, &inner, &key, epoch, &tag).await,
        };

        let delay = with_session(&inner, &key, epoch, |entry, shared| {
            if let Err(e) = &result {
                warn!("[{tag}] session failed: {e}");
                entry.set_status(ConnectionStatus::Error);
            }
            entry.set_status(ConnectionStatus::Disconnected);
            if entry.refcount == 0 {
                return None;
            }
            let retry_count = entry.connection().retry_count;
            entry.tx.send_modify(|v| v.connection.retry_count = retry_count + 1);
            Some(shared.live.reconnect_delay(retry_count))
        });
        let Some(Some(delay)) = delay else {
            debug!("[{tag}] session ended");
            return;
        };

        info!("[{tag}] reconnecting in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}

/// Run one WebSocket session until it closes. `Ok` on a clean close or
/// when the session became stale, `Err` on failure.
async fn run_stream<F: Feed>(
    shared: &Shared<F>,
    inner: &Weak<Inner<F>>,
    key: &FeedKey,
    epoch: u64,
    tag: &str,
) -> Result<(), FetchError> {
    let protocol = Protocol::new(shared.settings(key.exchange), &key.symbol);
    let mut session = shared.connector.connect(protocol.url()).await?;
    debug!("[{tag}] socket open, sending handshake");
    session.send(protocol.handshake()?).await?;

    let keepalive = protocol.keepalive();
    let mut ping_timer = keepalive
        .as_ref()
        .map(|(every, _)| tokio::time::interval_at(Instant::now() + *every, *every));
    let mut acked = false;

    enum Step {
        Event(WsEvent),
        Ping,
    }

    loop {
        let step = tokio::select! {
            event = session.next_event() => Step::Event(event),
            _ = next_tick(&mut ping_timer) => Step::Ping,
        };

        let text = match step {
            Step::Ping => {
                if let Some((_, ping)) = &keepalive {
                    session.send(ping.clone()).await?;
                }
                continue;
            }
            Step::Event(WsEvent::Text(text)) => text,
            Step::Event(WsEvent::Closed) => {
                info!("[{tag}] socket closed by peer");
                return Ok(());
            }
            Step::Event(WsEvent::Failed(e)) => return Err(FetchError::Connection(e)),
        };

        match protocol.decode(&text) {
            LiveFrame::HandshakeAck if !acked => {
                acked = true;
                session.send(protocol.subscribe(F::TOPIC)?).await?;
                if with_session(inner, key, epoch, |e, _| e.mark_connected()).is_none() {
                    return Ok(());
                }
                info!("[{tag}] handshake acknowledged, subscribed");
            }
            LiveFrame::HandshakeAck | LiveFrame::SubscribeAck | LiveFrame::Ignored => {}
            LiveFrame::Rejected(reason) => {
                return Err(FetchError::Connection(format!("rejected: {reason}")));
            }
            LiveFrame::Unknown => debug!("[{tag}] ignoring unrecognized frame"),
            frame if acked => {
                let applied = with_session(inner, key, epoch, |entry, shared| {
                    let ctx = ApplyContext {
                        key,
                        settings: shared.settings(key.exchange),
                        live: &shared.live,
                    };
                    entry.fold(|state, current| shared.feed.apply_frame(state, &ctx, frame, current))
                });
                if applied.is_none() {
                    return Ok(());
                }
            }
            _ => debug!("[{tag}] data before handshake ack, dropped"),
        }
    }
}

/// Poll the REST endpoint until the session is torn down.
async fn run_poll<F: Feed>(
    shared: &Shared<F>,
    inner: &Weak<Inner<F>>,
    key: &FeedKey,
    epoch: u64,
    tag: &str,
) -> Result<(), FetchError> {
    let adapter = shared.adapters.get(key.exchange);
    let live = &shared.live;
    let mut failures = 0u32;
    let mut wait = Duration::from_millis(live.poll_initial_delay_ms);
    info!("[{tag}] polling every {}ms", live.poll_interval_ms);

    loop {
        tokio::time::sleep(wait).await;

        let current = with_session(inner, key, epoch, |entry, _| {
            if entry.connection().status == ConnectionStatus::Disconnected {
                entry.set_status(ConnectionStatus::Connecting);
            }
        });
        if current.is_none() {
            return Ok(());
        }

        match shared.feed.poll(adapter.as_ref(), &key.symbol).await {
            Ok(polled) => {
                failures = 0;
                let applied = with_session(inner, key, epoch, |entry, shared| {
                    if entry.connection().status != ConnectionStatus::Connected {
                        entry.mark_connected();
                    }
                    let ctx = ApplyContext {
                        key,
                        settings: shared.settings(key.exchange),
                        live: &shared.live,
                    };
                    entry.fold(|state, current| shared.feed.apply_poll(state, &ctx, polled, current))
                });
                if applied.is_none() {
                    return Ok(());
                }
            }
            Err(e) => {
                failures += 1;
                warn!("[{tag}] poll failed ({failures} in a row): {e}");
                let marked = with_session(inner, key, epoch, |entry, _| {
                    entry.set_status(ConnectionStatus::Error);
                    entry.tx.send_modify(|v| {
                        v.connection.status = ConnectionStatus::Disconnected;
                        v.connection.retry_count += 1;
                        v.connection.last_update_ms = now_ms();
                    });
                });
                if marked.is_none() {
                    return Ok(());
                }
            }
        }

        wait = Duration::from_millis(live.poll_interval_ms);
        if failures > live.poll_failure_threshold {
            wait *= 2;
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
