//! # pw-core
//!
//! Core crate for the pairwatch market-data layer, providing:
//!
//! - **Types** (`types`): exchanges, pairs, tickers, trades, order books, connection state
//! - **Configuration** (`config`): JSON config deserialization with production defaults
//! - **Error types** (`error`): the [`FetchError`] taxonomy via thiserror
//! - **Response cache** (`cache`): TTL-keyed in-memory cache
//! - **Trade tape** (`dedup`): rolling newest-first trade sequence with new-id detection
//! - **WebSocket** (`ws`): connector seam + tungstenite-backed sessions
//! - **Time utilities** (`time_util`): wall-clock timestamps
//! - **Logging** (`logging`): tracing-based structured logging

pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;
pub mod ws;

pub use error::FetchError;
// Re-export types at crate root for convenience.
pub use types::*;
