//! Trade deduplication for the rolling trade list.
//!
//! Live trade pushes, REST refreshes and reconnect replays all deliver trades
//! the consumer may already have. [`TradeTape`] keeps the newest-first
//! sequence for one key and remembers which trade ids it has already shown,
//! so each merge reports exactly the ids that are new to this key.
//!
//! # Invariants
//!
//! - The sequence never exceeds its capacity (default
//!   [`TRADE_TAPE_CAPACITY`]); the oldest trades are evicted from the tail.
//! - No trade id appears twice in the sequence.
//! - Within an incoming batch, trades are ordered newest-first before the
//!   merge, so the sequence stays newest-first across merges.

use ahash::AHashSet;

use crate::types::TradeEvent;

/// Rolling trade sequence length per key.
pub const TRADE_TAPE_CAPACITY: usize = 20;

/// Upper bound on remembered ids. Past this the memo is rebuilt from the ids
/// still in the sequence.
const SEEN_LIMIT: usize = 512;

/// Newest-first trade sequence with new-id detection.
///
/// Not thread-safe. Each live key owns its own instance inside the manager's
/// per-key entry.
#[derive(Debug, Clone)]
pub struct TradeTape {
    trades: Vec<TradeEvent>,
    seen: AHashSet<String>,
    capacity: usize,
}

impl TradeTape {
    pub fn new() -> Self {
        Self::with_capacity(TRADE_TAPE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            trades: Vec::with_capacity(capacity),
            seen: AHashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Merge a batch at the front of the sequence.
    ///
    /// Returns the ids from `incoming` that this tape had not seen before, in
    /// the order they now appear in the sequence.
    pub fn merge_front(&mut self, mut incoming: Vec<TradeEvent>) -> Vec<String> {
        // stable: equal timestamps keep upstream order
        incoming.sort_by(|a, b| b.timestamp_seconds.cmp(&a.timestamp_seconds));

        let mut batch_ids: AHashSet<String> = AHashSet::with_capacity(incoming.len());
        let mut new_ids = Vec::new();
        let mut merged = Vec::with_capacity(self.capacity);

        for trade in incoming {
            if !batch_ids.insert(trade.trade_id.clone()) {
                continue;
            }
            if !self.seen.contains(&trade.trade_id) {
                new_ids.push(trade.trade_id.clone());
            }
            merged.push(trade);
        }

        for trade in self.trades.drain(..) {
            if !batch_ids.contains(&trade.trade_id) {
                merged.push(trade);
            }
        }
        merged.truncate(self.capacity);

        self.seen.extend(batch_ids);
        if self.seen.len() > SEEN_LIMIT {
            self.seen = merged.iter().map(|t| t.trade_id.clone()).collect();
        }
        self.trades = merged;
        new_ids
    }

    /// Replace the whole sequence (e.g. from a REST snapshot) and report
    /// which ids are new relative to what the tape had seen.
    pub fn replace(&mut self, trades: Vec<TradeEvent>) -> Vec<String> {
        self.trades.clear();
        self.merge_front(trades)
    }

    pub fn trades(&self) -> &[TradeEvent] {
        &self.trades
    }

    pub fn is_known(&self, trade_id: &str) -> bool {
        self.seen.contains(trade_id)
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Forget everything, including the seen-id memo.
    pub fn clear(&mut self) {
        self.trades.clear();
        self.seen.clear();
    }
}

impl Default for TradeTape {
    fn default() -> Self {
        Self::new()
    }
}
