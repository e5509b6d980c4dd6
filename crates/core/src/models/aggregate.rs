use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::valuation::{HoldingValuation, MarketValue, PortfolioValuation};

/// One ticker merged across every portfolio that holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedHolding {
    pub ticker: String,
    pub name: String,
    pub currency: String,
    pub price_scale: Decimal,

    pub shares: Decimal,

    /// Sum of the contributors' historical cost bases
    pub cost_basis_home: Decimal,

    /// Weighted-average cost per actual share, in the stock currency
    pub average_cost: Decimal,

    /// Weighted-average cost in quoted units
    pub average_cost_quoted: Decimal,

    pub market: MarketValue,

    /// Share of the combined priced value across all portfolios
    pub weight_pct: Option<Decimal>,

    /// The per-portfolio holdings this aggregate was built from
    pub contributions: Vec<HoldingValuation>,
}

impl AggregatedHolding {
    /// True when more than one portfolio contributed.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.contributions.len() > 1
    }

    #[must_use]
    pub fn portfolio_ids(&self) -> Vec<Uuid> {
        self.contributions.iter().map(|c| c.portfolio_id()).collect()
    }
}

/// "All portfolios" view for one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedValuation {
    pub owner: String,
    pub home_currency: String,
    pub holdings: Vec<AggregatedHolding>,
    pub portfolios: Vec<PortfolioValuation>,
    pub total_cost_basis_home: Decimal,
    pub total_value_home: Decimal,
    pub total_unrealized_pl_home: Decimal,
    pub total_realized_pl_home: Decimal,
    /// False when any portfolio left a SELL out of `total_realized_pl_home`
    pub realized_pl_complete: bool,
    pub total_daily_change_home: Decimal,
}
