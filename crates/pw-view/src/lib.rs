//! # pw-view
//!
//! View models over the pairwatch data layer.
//!
//! - [`snapshot`]: REST-backed pair list, ticker, trades and depth views
//!   (`{data, loading, error}` plus `refetch`)
//! - [`live`]: live price / trades / depth of the selected key, pushed
//!   through watch channels
//! - [`guard`]: selection tickets that keep late results off the wrong key
//! - [`hub`]: builds every view from one config

pub mod guard;
pub mod hub;
pub mod live;
pub mod snapshot;
pub mod state;

pub use hub::MarketHub;
pub use live::{LiveDepthView, LivePriceView, LiveTradesView, LiveView};
pub use snapshot::{DepthView, PairsView, TickerView, TradesView};
pub use state::{LiveState, Loadable, TradesState};
