use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Static reference data for one ticker, owned by an external registry.
///
/// **Equality and hashing** are based solely on `ticker`, NOT on `name`,
/// so registry lookups stay consistent regardless of display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    /// Ticker symbol, uppercased (e.g., "AAPL", "VUSA.L")
    pub ticker: String,

    /// Human-readable name (e.g., "Apple Inc.")
    pub name: String,

    /// Trading currency, uppercased ISO code
    pub currency: String,

    /// Multiplier converting a quoted price into an actual per-share price.
    /// 1 for most exchanges, 0.01 for exchanges quoting in pence.
    pub price_scale: Decimal,
}

impl PartialEq for Stock {
    fn eq(&self, other: &Self) -> bool {
        self.ticker == other.ticker
    }
}

impl Eq for Stock {}

impl std::hash::Hash for Stock {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ticker.hash(state);
    }
}

impl Stock {
    pub fn new(
        ticker: impl Into<String>,
        name: impl Into<String>,
        currency: impl Into<String>,
        price_scale: Decimal,
    ) -> Self {
        Self {
            ticker: ticker.into().trim().to_uppercase(),
            name: name.into(),
            currency: currency.into().trim().to_uppercase(),
            price_scale,
        }
    }

    /// A stock quoted directly in its trading currency (scale 1).
    pub fn unscaled(
        ticker: impl Into<String>,
        name: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self::new(ticker, name, currency, Decimal::ONE)
    }
}
