//! Selection guard.
//!
//! Every view that resolves asynchronously (a REST fetch, a live update)
//! works for whatever the consumer selected *when the work started*. A
//! [`Ticket`] captures that selection; its result is applied only while the
//! ticket is still current. The check and the write happen under one lock,
//! so a switch can never interleave between them.

use parking_lot::Mutex;

/// Proof of one selection. Stale once anything else is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    generation: u64,
    key: K,
}

impl<K> Ticket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct Selected<K> {
    generation: u64,
    key: Option<K>,
}

/// Tracks the current selection of one view.
#[derive(Debug)]
pub struct SelectionGuard<K> {
    selected: Mutex<Selected<K>>,
}

impl<K: Clone + PartialEq> SelectionGuard<K> {
    pub fn new() -> Self {
        Self {
            selected: Mutex::new(Selected {
                generation: 0,
                key: None,
            }),
        }
    }

    /// Select `key` and run `f` with the new ticket before any stale result
    /// can be applied. Re-selecting the same key still invalidates older
    /// tickets.
    pub fn select_with<R>(&self, key: K, f: impl FnOnce(&Ticket<K>) -> R) -> (Ticket<K>, R) {
        let mut selected = self.selected.lock();
        selected.generation += 1;
        selected.key = Some(key.clone());
        let ticket = Ticket {
            generation: selected.generation,
            key,
        };
        let out = f(&ticket);
        (ticket, out)
    }

    pub fn select(&self, key: K) -> Ticket<K> {
        self.select_with(key, |_| ()).0
    }

    /// Drop the selection; every outstanding ticket goes stale.
    pub fn clear(&self) {
        let mut selected = self.selected.lock();
        selected.generation += 1;
        selected.key = None;
    }

    /// Ticket for the current selection, if any.
    pub fn ticket(&self) -> Option<Ticket<K>> {
        let selected = self.selected.lock();
        selected.key.clone().map(|key| Ticket {
            generation: selected.generation,
            key,
        })
    }

    pub fn current(&self) -> Option<K> {
        self.selected.lock().key.clone()
    }

    pub fn is_current(&self, ticket: &Ticket<K>) -> bool {
        self.selected.lock().generation == ticket.generation
    }

    /// Run `f` only if `ticket` is still current. `None` when stale.
    pub fn if_current<R>(&self, ticket: &Ticket<K>, f: impl FnOnce() -> R) -> Option<R> {
        let selected = self.selected.lock();
        if selected.generation != ticket.generation {
            return None;
        }
        Some(f())
    }
}

impl<K: Clone + PartialEq> Default for SelectionGuard<K> {
    fn default() -> Self {
        Self::new()
    }
}
