//! Live-subscription keys.

use super::enums::Exchange;

/// Identifies one live-connection/state unit: an `(exchange, symbol)` pair.
///
/// Rendered as `"{exchange}_{symbol}"` in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedKey {
    pub exchange: Exchange,
    pub symbol: String,
}

impl FeedKey {
    pub fn new(exchange: Exchange, symbol: impl Into<String>) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
        }
    }
}

impl std::fmt::Display for FeedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.exchange, self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let key = FeedKey::new(Exchange::Bybit, "BTCUSDT");
        assert_eq!(key.to_string(), "bybit_BTCUSDT");
    }

    #[test]
    fn keys_differ_by_exchange() {
        assert_ne!(
            FeedKey::new(Exchange::Bybit, "btcidr"),
            FeedKey::new(Exchange::Indodax, "btcidr")
        );
    }
}
