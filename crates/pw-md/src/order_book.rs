//! Depth book for live sessions.
//!
//! Bybit's `orderbook.50` stream sends one snapshot followed by deltas that
//! add, update, or remove levels. The book keeps both sides sorted and is
//! published whole as an [`OrderBookSnapshot`] after every message.

use std::cmp::Ordering;

use pw_core::{OrderBookSnapshot, PriceLevel};

/// Depth book holding at most `N` levels per side, best level first on
/// both sides. Zero-size levels are never stored.
#[derive(Debug, Clone)]
pub struct OrderBook<const N: usize> {
    bids: Vec<[f64; 2]>,
    asks: Vec<[f64; 2]>,
    sequence: Option<u64>,
    last_update_ms: u64,
}

/// Prices closer than this are the same level.
const PRICE_EPS: f64 = 1e-10;

impl<const N: usize> OrderBook<N> {
    pub fn new() -> Self {
        Self {
            bids: Vec::with_capacity(N),
            asks: Vec::with_capacity(N),
            sequence: None,
            last_update_ms: 0,
        }
    }

    /// Replace the entire book. Levels are re-sorted and trimmed to `N`.
    pub fn set_snapshot(&mut self, bids: &[[f64; 2]], asks: &[[f64; 2]]) {
        self.bids.clear();
        self.bids.extend(bids.iter().filter(|l| l[1] > 0.0));
        self.bids.sort_by(|a, b| b[0].partial_cmp(&a[0]).unwrap_or(Ordering::Equal));
        self.bids.truncate(N);

        self.asks.clear();
        self.asks.extend(asks.iter().filter(|l| l[1] > 0.0));
        self.asks.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap_or(Ordering::Equal));
        self.asks.truncate(N);
    }

    /// Apply an incremental delta.
    ///
    /// For each `[price, size]` pair:
    /// - `size == 0.0` removes the level at that price.
    /// - An existing price has its size updated.
    /// - Otherwise a new level is inserted in sorted position, and the worst
    ///   level is trimmed if the side exceeds `N`.
    pub fn update(&mut self, bids: &[[f64; 2]], asks: &[[f64; 2]]) {
        for &[price, size] in bids {
            update_side(&mut self.bids, price, size, N, |level, p| level < p);
        }
        for &[price, size] in asks {
            update_side(&mut self.asks, price, size, N, |level, p| level > p);
        }
    }

    /// Record upstream metadata for the last applied message.
    pub fn stamp(&mut self, last_update_ms: u64, sequence: Option<u64>) {
        self.last_update_ms = last_update_ms;
        if sequence.is_some() {
            self.sequence = sequence;
        }
    }

    /// Copy of the full book.
    pub fn snapshot(&self) -> OrderBookSnapshot {
        let to_levels = |side: &[[f64; 2]]| {
            side.iter()
                .map(|&[price, size]| PriceLevel { price, size })
                .collect()
        };
        OrderBookSnapshot {
            bids: to_levels(&self.bids),
            asks: to_levels(&self.asks),
            last_update_ms: self.last_update_ms,
            sequence: self.sequence,
        }
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.sequence = None;
        self.last_update_ms = 0;
    }

    /// Returns `true` if the book has no levels on either side.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

impl<const N: usize> Default for OrderBook<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Apply one level change to a sorted side. `goes_before(level, price)` is
/// true when a new level at `price` sorts ahead of the existing `level`.
fn update_side(
    levels: &mut Vec<[f64; 2]>,
    price: f64,
    size: f64,
    max_levels: usize,
    goes_before: impl Fn(f64, f64) -> bool,
) {
    if let Some(idx) = levels.iter().position(|l| (l[0] - price).abs() < PRICE_EPS) {
        if size == 0.0 {
            levels.remove(idx);
        } else {
            levels[idx][1] = size;
        }
    } else if size > 0.0 {
        let pos = levels
            .iter()
            .position(|l| goes_before(l[0], price))
            .unwrap_or(levels.len());
        levels.insert(pos, [price, size]);
        if levels.len() > max_levels {
            levels.pop();
        }
    }
}
