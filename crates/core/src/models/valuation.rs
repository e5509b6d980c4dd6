use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lot::Lot;
use crate::arithmetic;
use crate::errors::CoreError;

/// Market-dependent figures. `Unavailable` is never rendered as zero:
/// a zero value would read as a total loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MarketValue {
    Available(MarketFigures),
    Unavailable { reason: String },
}

impl MarketValue {
    #[must_use]
    pub fn figures(&self) -> Option<&MarketFigures> {
        match self {
            MarketValue::Available(figures) => Some(figures),
            MarketValue::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, MarketValue::Available(_))
    }

    #[must_use]
    pub fn current_value_home(&self) -> Option<Decimal> {
        self.figures().map(|f| f.current_value_home)
    }
}

/// Mark-to-market numbers for a lot, holding or aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketFigures {
    /// Quote as delivered by the feed (possibly in a minor unit)
    pub quoted_price: Decimal,

    /// Actual per-share price in the stock currency (quote × price scale)
    pub current_price: Decimal,

    /// Current value in home currency at today's rate
    pub current_value_home: Decimal,

    /// current value − cost basis
    pub unrealized_pl_home: Decimal,

    /// unrealized / cost basis × 100, or 0 when cost basis is 0
    pub unrealized_pl_pct: Decimal,

    /// Today's move of the position in home currency
    pub daily_change_home: Decimal,
}

/// The quote-independent summary of one (portfolio, ticker) position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub portfolio_id: Uuid,
    pub ticker: String,
    pub name: String,

    /// Currency every `_home` figure of this holding is expressed in
    pub home_currency: String,

    /// Trading currency of the stock
    pub currency: String,
    pub price_scale: Decimal,

    /// Sum of remaining shares over open lots
    pub shares: Decimal,

    /// Weighted-average cost per actual share, in the stock currency
    pub average_cost: Decimal,

    /// Historical home-currency capital committed to the open shares
    pub cost_basis_home: Decimal,

    /// False when at least one lot had no snapshot rate and today's rate was used
    pub historical_cost_basis: bool,

    /// Profit locked in by every SELL of this ticker, in home currency.
    /// `None` when a SELL could not be converted; see `realized_pl_unavailable`.
    pub realized_pl_home: Option<Decimal>,

    pub realized_pl_unavailable: Option<String>,

    /// Open lots, oldest first
    pub lots: Vec<Lot>,
}

impl Holding {
    /// Average cost in quoted units, comparable to a raw quote.
    pub fn average_cost_quoted(&self) -> Result<Decimal, CoreError> {
        if self.price_scale.is_zero() {
            return Ok(self.average_cost);
        }
        arithmetic::div(self.average_cost, self.price_scale)
    }
}

/// Valuation of one open lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotValuation {
    pub lot: Lot,
    pub cost_basis_home: Decimal,
    /// True when the lot's own snapshot rate (or home currency) priced the cost basis
    pub historical_rate: bool,
    pub market: MarketValue,
}

/// Full valuation of one holding at one quote/rate snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingValuation {
    #[serde(flatten)]
    pub holding: Holding,

    pub lot_valuations: Vec<LotValuation>,

    pub market: MarketValue,

    /// Share of the portfolio's priced value; `None` when this holding is unpriced
    /// or when it was valued on its own.
    pub weight_pct: Option<Decimal>,
}

impl HoldingValuation {
    #[must_use]
    pub fn ticker(&self) -> &str {
        &self.holding.ticker
    }

    #[must_use]
    pub fn portfolio_id(&self) -> Uuid {
        self.holding.portfolio_id
    }
}

/// A holding whose cost basis itself could not be derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnvaluedHolding {
    pub ticker: String,
    pub reason: String,
}

/// All holdings of one portfolio plus totals and weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub portfolio_id: Uuid,

    /// Currency used for all monetary values
    pub home_currency: String,

    /// Open holdings, largest weight first, unpriced holdings last
    pub holdings: Vec<HoldingValuation>,

    pub unvalued: Vec<UnvaluedHolding>,

    /// Historical cost basis of every valued holding
    pub total_cost_basis_home: Decimal,

    /// Current value of priced holdings only
    pub total_value_home: Decimal,

    /// Unrealized P/L of priced holdings only
    pub total_unrealized_pl_home: Decimal,

    pub total_unrealized_pl_pct: Decimal,

    /// Realized P/L of every SELL in the portfolio, open or closed tickers
    pub total_realized_pl_home: Decimal,

    /// False when some ticker's realized P/L could not be converted and is
    /// missing from `total_realized_pl_home`
    pub realized_pl_complete: bool,

    pub total_daily_change_home: Decimal,

    /// True when every holding had a quote and rate
    pub fully_priced: bool,
}

/// Profit/loss locked in by one SELL against its source lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedTrade {
    pub sell_transaction_id: Uuid,
    pub source_transaction_id: Uuid,
    pub portfolio_id: Uuid,
    pub ticker: String,
    pub executed_at: DateTime<Utc>,
    pub shares: Decimal,
    pub sell_price: Decimal,
    pub source_price: Decimal,
    pub currency: String,
    pub fees: Decimal,

    /// (sell price − source price) × shares, in `currency`
    pub realized_pl: Decimal,

    /// `realized_pl` at the SELL's own snapshot rate
    pub realized_pl_home: Decimal,

    pub historical_rate: bool,
}
