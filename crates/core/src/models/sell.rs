use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a sell order chooses the lots it draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SellMode {
    /// Draw `quantity` from all open lots, oldest execution first.
    Entire { quantity: Decimal },
    /// Sell everything that remains of one lot.
    Lot { lot_id: Uuid },
    /// Sell `quantity` out of one lot.
    Partial { lot_id: Uuid, quantity: Decimal },
}

impl std::fmt::Display for SellMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SellMode::Entire { .. } => write!(f, "entire"),
            SellMode::Lot { .. } => write!(f, "lot"),
            SellMode::Partial { .. } => write!(f, "partial"),
        }
    }
}

/// User-level request: "sell N shares of TICKER".
///
/// Turned into one or more SELL transactions by the sell allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellOrder {
    pub ticker: String,
    pub mode: SellMode,
    pub price_per_share: Decimal,
    pub currency: String,
    /// One brokerage commission for the whole order
    #[serde(default)]
    pub fees: Decimal,
    #[serde(default)]
    pub exchange_rate_to_home: Option<Decimal>,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Reduce an oversized quantity to what is available instead of rejecting it
    #[serde(default)]
    pub clamp_to_available: bool,
}

impl SellOrder {
    pub fn new(
        ticker: impl Into<String>,
        mode: SellMode,
        price_per_share: Decimal,
        currency: impl Into<String>,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            mode,
            price_per_share,
            currency: currency.into(),
            fees: Decimal::ZERO,
            exchange_rate_to_home: None,
            executed_at,
            notes: None,
            clamp_to_available: false,
        }
    }

    pub fn with_fees(mut self, fees: Decimal) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_rate(mut self, exchange_rate_to_home: Decimal) -> Self {
        self.exchange_rate_to_home = Some(exchange_rate_to_home);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn clamped(mut self) -> Self {
        self.clamp_to_available = true;
        self
    }
}

/// One slice of a sell order drawn from one lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellAllocation {
    /// The BUY transaction (lot) being drawn down
    pub source_transaction_id: Uuid,
    pub shares: Decimal,
    /// Fee share carried by this slice (the whole fee on the first slice, zero after)
    pub fees: Decimal,
}
