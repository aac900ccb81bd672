//! Core data types shared by the adapters, live managers and view models.
//!
//! Everything here is plain owned data (`Clone + Send`) so snapshots can be
//! handed out through watch channels without borrowing manager state.

pub mod enums;
pub mod key;
pub mod market_data;

pub use enums::*;
pub use key::*;
pub use market_data::*;
