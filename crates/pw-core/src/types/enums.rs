//! Enumerations used throughout the data layer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Exchange identifiers
// ---------------------------------------------------------------------------

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Indodax,
    Bybit,
}

impl Exchange {
    pub const ALL: [Exchange; 2] = [Exchange::Indodax, Exchange::Bybit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indodax => "indodax",
            Self::Bybit => "bybit",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "indodax" => Ok(Self::Indodax),
            "bybit" => Ok(Self::Bybit),
            other => Err(format!("unknown exchange: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Trade side
// ---------------------------------------------------------------------------

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Normalize an exchange side label. `buy` in any casing maps to
    /// [`Side::Buy`]; everything else is a sell.
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("buy") {
            Self::Buy
        } else {
            Self::Sell
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection status
// ---------------------------------------------------------------------------

/// Lifecycle status of one live key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Error => f.write_str("error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Feed source
// ---------------------------------------------------------------------------

/// How a live feed is sourced for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    /// Push channel over the exchange WebSocket.
    Stream,
    /// Timed REST poll standing in for a push channel.
    Poll,
}
