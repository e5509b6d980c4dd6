use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::arithmetic;
use crate::errors::CoreError;
use crate::models::aggregate::AggregatedHolding;
use crate::models::market::ExchangeRateTable;
use crate::models::settings::Settings;
use crate::models::valuation::{HoldingValuation, MarketFigures, MarketValue};
use crate::services::currency_service::CurrencyService;
use crate::services::valuation_service::percent_of;

/// Merges same-ticker holdings from several portfolios into one view.
///
/// Cost bases are summed as-is (historical figures are never re-derived).
/// A ticker held by a single portfolio passes through untouched so no
/// rounding is introduced for it.
pub struct AggregationService {
    currency_service: CurrencyService,
    percent_scale: u32,
}

impl AggregationService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            currency_service: CurrencyService::new(),
            percent_scale: settings.percent_scale,
        }
    }

    /// Aggregate holdings by ticker and weight them against the combined value.
    ///
    /// Every holding must be expressed in the rate table's home currency.
    /// Output is ordered by current value (largest first), unpriced tickers last.
    pub fn aggregate(
        &self,
        holdings: &[HoldingValuation],
        rates: &ExchangeRateTable,
    ) -> Result<Vec<AggregatedHolding>, CoreError> {
        if let Some(foreign) = holdings
            .iter()
            .find(|h| !rates.is_home(&h.holding.home_currency))
        {
            return Err(CoreError::Validation(format!(
                "Holding {} of portfolio {} is valued in {}, cannot aggregate in {}",
                foreign.ticker(),
                foreign.portfolio_id(),
                foreign.holding.home_currency,
                rates.home_currency()
            )));
        }

        let mut by_ticker: BTreeMap<&str, Vec<&HoldingValuation>> = BTreeMap::new();
        for holding in holdings {
            by_ticker.entry(holding.ticker()).or_default().push(holding);
        }

        let mut aggregated: Vec<AggregatedHolding> = by_ticker
            .into_values()
            .map(|group| match group.as_slice() {
                [single] => Self::pass_through(single),
                _ => self.merge(&group, rates),
            })
            .collect::<Result<_, _>>()?;

        let total_value_home =
            arithmetic::sum(aggregated.iter().filter_map(|a| a.market.current_value_home()))?;
        for holding in &mut aggregated {
            holding.weight_pct = holding
                .market
                .current_value_home()
                .map(|value| percent_of(value, total_value_home, self.percent_scale));
        }

        aggregated.sort_by(|a, b| {
            b.market
                .current_value_home()
                .cmp(&a.market.current_value_home())
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        Ok(aggregated)
    }

    fn pass_through(holding: &HoldingValuation) -> Result<AggregatedHolding, CoreError> {
        let h = &holding.holding;
        Ok(AggregatedHolding {
            ticker: h.ticker.clone(),
            name: h.name.clone(),
            currency: h.currency.clone(),
            price_scale: h.price_scale,
            shares: h.shares,
            cost_basis_home: h.cost_basis_home,
            average_cost: h.average_cost,
            average_cost_quoted: h.average_cost_quoted()?,
            market: holding.market.clone(),
            weight_pct: None,
            contributions: vec![holding.clone()],
        })
    }

    fn merge(
        &self,
        group: &[&HoldingValuation],
        rates: &ExchangeRateTable,
    ) -> Result<AggregatedHolding, CoreError> {
        let first = &group[0].holding;
        let shares = arithmetic::sum(group.iter().map(|h| h.holding.shares))?;
        let cost_basis_home = arithmetic::sum(group.iter().map(|h| h.holding.cost_basis_home))?;

        let average_cost = if shares.is_zero() {
            Decimal::ZERO
        } else {
            match self
                .currency_service
                .from_home(cost_basis_home, &first.currency, rates)
            {
                Ok(cost) => arithmetic::div(cost, shares)?,
                Err(e) if e.is_missing_market_data() => {
                    log::warn!(
                        "Falling back to share-weighted average cost for {}: {e}",
                        first.ticker
                    );
                    let weighted = group
                        .iter()
                        .map(|h| arithmetic::mul(h.holding.average_cost, h.holding.shares))
                        .collect::<Result<Vec<_>, _>>()?;
                    arithmetic::div(arithmetic::sum(weighted)?, shares)?
                }
                Err(e) => return Err(e),
            }
        };
        let average_cost_quoted = if first.price_scale.is_zero() {
            average_cost
        } else {
            arithmetic::div(average_cost, first.price_scale)?
        };

        Ok(AggregatedHolding {
            ticker: first.ticker.clone(),
            name: first.name.clone(),
            currency: first.currency.clone(),
            price_scale: first.price_scale,
            shares,
            cost_basis_home,
            average_cost,
            average_cost_quoted,
            market: self.merge_market(group, cost_basis_home),
            weight_pct: None,
            contributions: group.iter().map(|h| (*h).clone()).collect(),
        })
    }

    /// Sum market figures; any unpriced contributor makes the aggregate unpriced.
    fn merge_market(&self, group: &[&HoldingValuation], cost_basis_home: Decimal) -> MarketValue {
        let mut figures = Vec::with_capacity(group.len());
        for holding in group {
            match &holding.market {
                MarketValue::Available(f) => figures.push(f),
                MarketValue::Unavailable { reason } => {
                    return MarketValue::Unavailable {
                        reason: reason.clone(),
                    }
                }
            }
        }

        let summed = arithmetic::sum(figures.iter().map(|f| f.current_value_home)).and_then(
            |current_value_home| {
                let daily_change_home = arithmetic::sum(figures.iter().map(|f| f.daily_change_home))?;
                let unrealized_pl_home = arithmetic::sub(current_value_home, cost_basis_home)?;
                Ok((current_value_home, daily_change_home, unrealized_pl_home))
            },
        );
        match summed {
            Ok((current_value_home, daily_change_home, unrealized_pl_home)) => {
                MarketValue::Available(MarketFigures {
                    quoted_price: figures[0].quoted_price,
                    current_price: figures[0].current_price,
                    current_value_home,
                    unrealized_pl_home,
                    unrealized_pl_pct: percent_of(
                        unrealized_pl_home,
                        cost_basis_home,
                        self.percent_scale,
                    ),
                    daily_change_home,
                })
            }
            Err(e) => MarketValue::Unavailable {
                reason: e.to_string(),
            },
        }
    }
}

impl Default for AggregationService {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}
