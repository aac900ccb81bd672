//! Live views: a consumer's window onto one live key at a time.
//!
//! `select(key)` subscribes to the new key, forwards its updates, seeds it
//! with a REST snapshot and explicitly disconnects the previously selected
//! key. Updates and seeds are applied only while their selection is current.

use std::sync::Arc;

use parking_lot::Mutex;
use pw_core::FeedKey;
use pw_md::AdapterRegistry;
use pw_md::live::{DepthFeed, Feed, FeedView, LiveManager, PriceFeed, Subscription, TradesFeed};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::guard::{SelectionGuard, Ticket};
use crate::state::LiveState;

pub type LivePriceView = LiveView<PriceFeed>;
pub type LiveTradesView = LiveView<TradesFeed>;
pub type LiveDepthView = LiveView<DepthFeed>;

/// The selected key's subscription and the task copying its updates out.
/// Dropping it releases the key at once.
struct Forwarder<F: Feed> {
    subscription: Subscription<F>,
    task: JoinHandle<()>,
}

impl<F: Feed> Drop for Forwarder<F> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct LiveInner<F: Feed> {
    manager: LiveManager<F>,
    adapters: AdapterRegistry,
    guard: Arc<SelectionGuard<FeedKey>>,
    tx: Arc<watch::Sender<LiveState<F::Data>>>,
    forwarder: Mutex<Option<Forwarder<F>>>,
}

/// Live feed of the selected key.
pub struct LiveView<F: Feed> {
    inner: Arc<LiveInner<F>>,
}

impl<F: Feed> Clone for LiveView<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: Feed + Default> LiveView<F> {
    pub fn new(manager: LiveManager<F>, adapters: AdapterRegistry) -> Self {
        Self {
            inner: Arc::new(LiveInner {
                manager,
                adapters,
                guard: Arc::new(SelectionGuard::new()),
                tx: Arc::new(watch::Sender::new(LiveState::default())),
                forwarder: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> LiveState<F::Data> {
        self.inner.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<LiveState<F::Data>> {
        self.inner.tx.subscribe()
    }

    pub fn selected(&self) -> Option<FeedKey> {
        self.inner.guard.current()
    }

    /// Switch to `key`. Must be called from within a tokio runtime.
    pub async fn select(&self, key: FeedKey) {
        let inner = &self.inner;
        let subscription = inner.manager.acquire(key.clone());

        let (ticket, previous) = inner.guard.select_with(key.clone(), |ticket| {
            inner.tx.send_replace(LiveState {
                key: Some(key.clone()),
                ..LiveState::default()
            });
            let task = tokio::spawn(forward::<F>(
                subscription.watcher(),
                ticket.clone(),
                inner.guard.clone(),
                inner.tx.clone(),
            ));
            inner.forwarder.lock().replace(Forwarder { subscription, task })
        });

        if let Some(prev) = previous {
            let prev_key = prev.subscription.key().clone();
            // release before disconnecting, so only other holders of the
            // key get a restarted session
            drop(prev);
            if prev_key != key {
                info!("[view-live-{}] switched {prev_key} -> {key}", F::NAME);
                inner.manager.disconnect(&prev_key);
            }
        }

        self.seed(&ticket).await;
    }

    /// Drop the selection and its subscription.
    pub fn clear(&self) {
        let inner = &self.inner;
        inner.guard.clear();
        let prev = inner.forwarder.lock().take();
        drop(prev);
        inner.tx.send_replace(LiveState::default());
    }

    async fn seed(&self, ticket: &Ticket<FeedKey>) {
        let inner = &self.inner;
        let key = ticket.key();
        let adapter = inner.adapters.get(key.exchange);
        let polled = match F::default().poll(adapter.as_ref(), &key.symbol).await {
            Ok(polled) => polled,
            Err(e) => {
                warn!("[view-live-{}-{key}] initial snapshot failed: {e}", F::NAME);
                return;
            }
        };
        match inner.guard.if_current(ticket, || inner.manager.seed(key, polled)) {
            Some(applied) => debug!("[view-live-{}-{key}] seeded (applied: {applied})", F::NAME),
            None => debug!("[view-live-{}-{key}] stale snapshot discarded", F::NAME),
        }
    }
}

async fn forward<F: Feed>(
    mut rx: watch::Receiver<FeedView<F::Data>>,
    ticket: Ticket<FeedKey>,
    guard: Arc<SelectionGuard<FeedKey>>,
    tx: Arc<watch::Sender<LiveState<F::Data>>>,
) {
    loop {
        let view = rx.borrow_and_update().clone();
        let published = guard.if_current(&ticket, || {
            tx.send_replace(LiveState::from_view(ticket.key().clone(), view));
        });
        if published.is_none() || rx.changed().await.is_err() {
            return;
        }
    }
}
