use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

use crate::arithmetic;
use crate::errors::CoreError;
use crate::models::history::{HistoryPoint, MarketSnapshot, ValueHistory};
use crate::models::market::{Quote, QuoteSnapshot};
use crate::models::portfolio::Portfolio;
use crate::models::settings::Settings;
use crate::models::transaction::Transaction;
use crate::providers::traits::StockRegistry;
use crate::services::currency_service::CurrencyService;
use crate::services::valuation_service::{percent_of, ValuationService};

/// Rebuilds value over time from transaction logs and dated market snapshots.
///
/// Each day is valued exactly like a live portfolio valuation, restricted
/// to the transactions executed on or before that day.
pub struct HistoryService {
    valuation_service: ValuationService,
    currency_service: CurrencyService,
    percent_scale: u32,
}

impl HistoryService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            valuation_service: ValuationService::new(settings),
            currency_service: CurrencyService::new(),
            percent_scale: settings.percent_scale,
        }
    }

    /// Value `portfolios` (each with its full log) at every snapshot day.
    ///
    /// Rules:
    /// - snapshots are processed oldest first; two snapshots of one day are rejected
    /// - every portfolio and every snapshot must use `home_currency`
    /// - days before the first transaction produce no point
    /// - a ticker missing from a day's quotes keeps its last earlier quote
    /// - a ticker never quoted so far is listed in the point's `unpriced`
    pub fn value_history(
        &self,
        home_currency: &str,
        portfolios: &[(Portfolio, Vec<Transaction>)],
        registry: &dyn StockRegistry,
        snapshots: &[MarketSnapshot],
    ) -> Result<ValueHistory, CoreError> {
        for (portfolio, _) in portfolios {
            if !portfolio.home_currency.eq_ignore_ascii_case(home_currency) {
                return Err(CoreError::Validation(format!(
                    "Portfolio {} reports in {}, history requested in {home_currency}",
                    portfolio.id, portfolio.home_currency
                )));
            }
        }
        let snapshots = Self::ordered(home_currency, snapshots)?;

        let first_day: Option<NaiveDate> = portfolios
            .iter()
            .flat_map(|(_, log)| log.iter().map(|t| t.executed_at.date_naive()))
            .min();

        let mut last_quotes: HashMap<String, Quote> = HashMap::new();
        let mut points = Vec::new();
        for snapshot in snapshots {
            for (ticker, quote) in &snapshot.quotes.quotes {
                last_quotes.insert(ticker.trim().to_uppercase(), quote.clone());
            }
            match first_day {
                Some(first) if snapshot.date >= first => {}
                _ => continue,
            }
            let quotes = QuoteSnapshot {
                quotes: last_quotes.clone(),
            };
            points.push(self.value_day(portfolios, registry, snapshot, &quotes)?);
        }

        let (total_return_home, total_return_pct) = self.total_return(&points)?;
        log::debug!(
            "Built value history of {} point(s) for {} portfolio(s)",
            points.len(),
            portfolios.len()
        );
        Ok(ValueHistory {
            home_currency: home_currency.trim().to_uppercase(),
            portfolio_ids: portfolios.iter().map(|(p, _)| p.id).collect(),
            points,
            total_return_home,
            total_return_pct,
        })
    }

    fn value_day(
        &self,
        portfolios: &[(Portfolio, Vec<Transaction>)],
        registry: &dyn StockRegistry,
        snapshot: &MarketSnapshot,
        quotes: &QuoteSnapshot,
    ) -> Result<HistoryPoint, CoreError> {
        let mut value_home = Decimal::ZERO;
        let mut cost_basis_home = Decimal::ZERO;
        let mut invested_home = Decimal::ZERO;
        let mut unpriced = BTreeSet::new();

        for (portfolio, log) in portfolios {
            let visible: Vec<Transaction> = log
                .iter()
                .filter(|t| t.executed_at.date_naive() <= snapshot.date)
                .cloned()
                .collect();
            if visible.is_empty() {
                continue;
            }

            let valuation = self.valuation_service.value_portfolio(
                portfolio,
                &visible,
                registry,
                quotes,
                &snapshot.rates,
            )?;
            value_home = arithmetic::add(value_home, valuation.total_value_home)?;
            cost_basis_home = arithmetic::add(cost_basis_home, valuation.total_cost_basis_home)?;
            unpriced.extend(
                valuation
                    .holdings
                    .iter()
                    .filter(|h| !h.market.is_available())
                    .map(|h| h.ticker().to_string()),
            );
            unpriced.extend(valuation.unvalued.iter().map(|u| u.ticker.clone()));

            for transaction in &visible {
                let amount = match self.currency_service.to_home_at(
                    transaction.total_amount()?,
                    &transaction.currency,
                    transaction.exchange_rate_to_home,
                    &snapshot.rates,
                ) {
                    Ok((amount, _)) => amount,
                    Err(e) if e.is_missing_market_data() => {
                        log::warn!(
                            "{} {} left out of invested amount on {}: {e}",
                            transaction.transaction_type,
                            transaction.id,
                            snapshot.date
                        );
                        unpriced.insert(transaction.ticker.clone());
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                invested_home = if transaction.is_buy() {
                    arithmetic::add(invested_home, amount)?
                } else {
                    arithmetic::sub(invested_home, amount)?
                };
            }
        }

        Ok(HistoryPoint {
            date: snapshot.date,
            value_home,
            cost_basis_home,
            invested_home,
            unpriced: unpriced.into_iter().collect(),
        })
    }

    /// Value change between the first and last point net of money added.
    fn total_return(&self, points: &[HistoryPoint]) -> Result<(Decimal, Decimal), CoreError> {
        let (Some(start), Some(end)) = (points.first(), points.last()) else {
            return Ok((Decimal::ZERO, Decimal::ZERO));
        };
        if points.len() < 2 {
            return Ok((Decimal::ZERO, Decimal::ZERO));
        }
        let added = arithmetic::sub(end.invested_home, start.invested_home)?;
        let gain = arithmetic::sub(
            arithmetic::sub(end.value_home, start.value_home)?,
            added,
        )?;
        Ok((gain, percent_of(gain, start.value_home, self.percent_scale)))
    }

    fn ordered<'a>(
        home_currency: &str,
        snapshots: &'a [MarketSnapshot],
    ) -> Result<Vec<&'a MarketSnapshot>, CoreError> {
        let mut ordered: Vec<&MarketSnapshot> = snapshots.iter().collect();
        ordered.sort_by_key(|s| s.date);
        for pair in ordered.windows(2) {
            if pair[0].date == pair[1].date {
                return Err(CoreError::Validation(format!(
                    "Two market snapshots for {}",
                    pair[0].date
                )));
            }
        }
        if let Some(foreign) = ordered.iter().find(|s| !s.rates.is_home(home_currency)) {
            return Err(CoreError::Validation(format!(
                "Snapshot of {} is quoted in {}, history requested in {home_currency}",
                foreign.date,
                foreign.rates.home_currency()
            )));
        }
        Ok(ordered)
    }
}

impl Default for HistoryService {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}
