use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::{ExchangeRateTable, QuoteSnapshot};

/// Quotes and rates as they stood at the close of one day.
///
/// Supplied by the caller; the engine never fetches history itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    #[serde(default)]
    pub quotes: QuoteSnapshot,
    pub rates: ExchangeRateTable,
}

impl MarketSnapshot {
    pub fn new(date: NaiveDate, quotes: QuoteSnapshot, rates: ExchangeRateTable) -> Self {
        Self {
            date,
            quotes,
            rates,
        }
    }
}

/// One day of a value history, all figures in the home currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,

    /// Value of the priced open positions at that day's quotes and rates
    pub value_home: Decimal,

    /// Historical cost basis of the open positions
    pub cost_basis_home: Decimal,

    /// Net money put in so far: BUY amounts minus SELL proceeds
    pub invested_home: Decimal,

    /// Tickers held that day that could not be priced, sorted
    pub unpriced: Vec<String>,
}

impl HistoryPoint {
    #[must_use]
    pub fn is_fully_priced(&self) -> bool {
        self.unpriced.is_empty()
    }
}

/// Value over time of one portfolio, or of every portfolio of an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueHistory {
    pub home_currency: String,
    pub portfolio_ids: Vec<Uuid>,

    /// One point per snapshot day from the first transaction on, oldest first
    pub points: Vec<HistoryPoint>,

    /// End value − start value − money added in between
    pub total_return_home: Decimal,

    /// `total_return_home` over the start value × 100, 0 when the start value is 0
    pub total_return_pct: Decimal,
}
