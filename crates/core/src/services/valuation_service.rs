use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use uuid::Uuid;

use crate::arithmetic;
use crate::errors::CoreError;
use crate::models::lot::Lot;
use crate::models::market::{ExchangeRateTable, Quote, QuoteSnapshot};
use crate::models::portfolio::Portfolio;
use crate::models::settings::Settings;
use crate::models::stock::Stock;
use crate::models::transaction::Transaction;
use crate::models::valuation::{
    Holding, HoldingValuation, LotValuation, MarketFigures, MarketValue, PortfolioValuation,
    RealizedTrade, UnvaluedHolding,
};
use crate::providers::traits::StockRegistry;
use crate::services::currency_service::CurrencyService;
use crate::services::ledger_service::LedgerService;

/// Computes cost basis, current value and P/L for lots, holdings and portfolios.
///
/// Every call is a pure function of (transaction log, quote snapshot, rate
/// snapshot). Cost basis uses each lot's historical rate; current value uses
/// today's rate. Missing market data degrades a single holding, never the
/// whole portfolio.
pub struct ValuationService {
    ledger: LedgerService,
    currency_service: CurrencyService,
    percent_scale: u32,
}

impl ValuationService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            ledger: LedgerService::new(settings.share_epsilon),
            currency_service: CurrencyService::new(),
            percent_scale: settings.percent_scale,
        }
    }

    // ── Lots & holdings (quote independent) ─────────────────────────

    /// Home-currency cost of a lot's remaining shares.
    ///
    /// Uses the rate captured at purchase when there is one, so the figure
    /// does not drift with today's rate. The flag reports whether it did.
    pub fn lot_cost_basis(
        &self,
        lot: &Lot,
        rates: &ExchangeRateTable,
    ) -> Result<(Decimal, bool), CoreError> {
        self.currency_service.to_home_at(
            lot.remaining_cost()?,
            &lot.currency,
            lot.exchange_rate_to_home,
            rates,
        )
    }

    /// Summarize one position from its lots. `lots` may include closed lots.
    ///
    /// Fails only when the open lots' own cost basis cannot be derived. A
    /// SELL that cannot be converted leaves the realized figure unavailable
    /// and the rest of the holding intact.
    pub fn build_holding(
        &self,
        portfolio_id: Uuid,
        stock: &Stock,
        lots: &[Lot],
        transactions: &[Transaction],
        rates: &ExchangeRateTable,
    ) -> Result<Holding, CoreError> {
        let open: Vec<Lot> = lots.iter().filter(|lot| lot.is_open()).cloned().collect();

        let mut shares = Decimal::ZERO;
        let mut cost_in_stock_currency = Decimal::ZERO;
        let mut cost_basis_home = Decimal::ZERO;
        let mut historical_cost_basis = true;

        for lot in &open {
            shares = arithmetic::add(shares, lot.remaining_shares)?;
            let cost = self.currency_service.convert(
                lot.remaining_cost()?,
                &lot.currency,
                &stock.currency,
                rates,
            )?;
            cost_in_stock_currency = arithmetic::add(cost_in_stock_currency, cost)?;
            let (basis, historical) = self.lot_cost_basis(lot, rates)?;
            cost_basis_home = arithmetic::add(cost_basis_home, basis)?;
            historical_cost_basis &= historical;
        }

        let average_cost = if shares.is_zero() {
            Decimal::ZERO
        } else {
            arithmetic::div(cost_in_stock_currency, shares)?
        };

        let (realized_pl_home, realized_pl_unavailable) =
            match self.realized_pl_home(portfolio_id, &stock.ticker, transactions, rates) {
                Ok(total) => (Some(total), None),
                Err(e) if e.is_missing_market_data() => (None, Some(e.to_string())),
                Err(e) => return Err(e),
            };

        Ok(Holding {
            portfolio_id,
            ticker: stock.ticker.clone(),
            name: stock.name.clone(),
            home_currency: rates.home_currency().to_string(),
            currency: stock.currency.clone(),
            price_scale: stock.price_scale,
            shares,
            average_cost,
            cost_basis_home,
            historical_cost_basis,
            realized_pl_home,
            realized_pl_unavailable,
            lots: open,
        })
    }

    fn realized_pl_home(
        &self,
        portfolio_id: Uuid,
        ticker: &str,
        transactions: &[Transaction],
        rates: &ExchangeRateTable,
    ) -> Result<Decimal, CoreError> {
        let own: Vec<Transaction> = transactions
            .iter()
            .filter(|t| t.ticker == ticker)
            .cloned()
            .collect();
        match self.realized_trades(&own, rates) {
            Ok(trades) => arithmetic::sum(trades.iter().map(|trade| trade.realized_pl_home)),
            Err(e) => {
                if e.is_missing_market_data() {
                    log::warn!(
                        "Realized P/L of {ticker} in portfolio {portfolio_id} unavailable: {e}"
                    );
                }
                Err(e)
            }
        }
    }

    // ── Realized P/L ────────────────────────────────────────────────

    /// One entry per SELL, priced against its source lot, oldest first.
    ///
    /// Home conversion uses the SELL's own snapshot rate, not today's.
    pub fn realized_trades(
        &self,
        transactions: &[Transaction],
        rates: &ExchangeRateTable,
    ) -> Result<Vec<RealizedTrade>, CoreError> {
        let buys: HashMap<Uuid, &Transaction> = transactions
            .iter()
            .filter(|t| t.is_buy())
            .map(|t| (t.id, t))
            .collect();

        let mut trades = Vec::new();
        for sell in transactions.iter().filter(|t| t.is_sell()) {
            let source = sell
                .source_transaction_id
                .and_then(|id| buys.get(&id))
                .ok_or_else(|| {
                    CoreError::integrity(
                        sell.portfolio_id,
                        &sell.ticker,
                        sell.id,
                        "SELL does not reference a known BUY",
                    )
                })?;
            if !source.currency.eq_ignore_ascii_case(&sell.currency) {
                return Err(CoreError::integrity(
                    sell.portfolio_id,
                    &sell.ticker,
                    sell.id,
                    format!(
                        "SELL currency {} differs from source lot currency {}",
                        sell.currency, source.currency
                    ),
                ));
            }

            let realized_pl = arithmetic::mul(
                arithmetic::sub(sell.price_per_share, source.price_per_share)?,
                sell.shares,
            )?;
            let (realized_pl_home, historical_rate) = self.currency_service.to_home_at(
                realized_pl,
                &sell.currency,
                sell.exchange_rate_to_home,
                rates,
            )?;

            trades.push(RealizedTrade {
                sell_transaction_id: sell.id,
                source_transaction_id: source.id,
                portfolio_id: sell.portfolio_id,
                ticker: sell.ticker.clone(),
                executed_at: sell.executed_at,
                shares: sell.shares,
                sell_price: sell.price_per_share,
                source_price: source.price_per_share,
                currency: sell.currency.clone(),
                fees: sell.fees,
                realized_pl,
                realized_pl_home,
                historical_rate,
            });
        }
        trades.sort_by_key(|trade| trade.executed_at);
        Ok(trades)
    }

    // ── Mark to market ──────────────────────────────────────────────

    /// Value a holding against one quote. `quote = None` keeps shares and
    /// cost basis and flags the market figures as unavailable.
    pub fn value_holding(
        &self,
        holding: Holding,
        quote: Option<&Quote>,
        rates: &ExchangeRateTable,
    ) -> Result<HoldingValuation, CoreError> {
        let mut lot_valuations = Vec::with_capacity(holding.lots.len());
        for lot in &holding.lots {
            let (cost_basis_home, historical_rate) = self.lot_cost_basis(lot, rates)?;
            let market = self.market_value(
                &holding,
                lot.remaining_shares,
                cost_basis_home,
                quote,
                rates,
            );
            lot_valuations.push(LotValuation {
                lot: lot.clone(),
                cost_basis_home,
                historical_rate,
                market,
            });
        }

        let market = self.market_value(
            &holding,
            holding.shares,
            holding.cost_basis_home,
            quote,
            rates,
        );

        Ok(HoldingValuation {
            holding,
            lot_valuations,
            market,
            weight_pct: None,
        })
    }

    fn market_value(
        &self,
        holding: &Holding,
        shares: Decimal,
        cost_basis_home: Decimal,
        quote: Option<&Quote>,
        rates: &ExchangeRateTable,
    ) -> MarketValue {
        let Some(quote) = quote else {
            return MarketValue::Unavailable {
                reason: CoreError::MissingQuote {
                    ticker: holding.ticker.clone(),
                }
                .to_string(),
            };
        };

        let converted = self
            .currency_service
            .scale_price(quote.price, holding.price_scale)
            .and_then(|current_price| {
                let daily_move = self
                    .currency_service
                    .scale_price(quote.daily_change, holding.price_scale)?;
                let value = self.currency_service.to_home(
                    arithmetic::mul(shares, current_price)?,
                    &holding.currency,
                    rates,
                )?;
                let change = self.currency_service.to_home(
                    arithmetic::mul(shares, daily_move)?,
                    &holding.currency,
                    rates,
                )?;
                let unrealized = arithmetic::sub(value, cost_basis_home)?;
                Ok((current_price, value, change, unrealized))
            });

        match converted {
            Ok((current_price, current_value_home, daily_change_home, unrealized_pl_home)) => {
                MarketValue::Available(MarketFigures {
                    quoted_price: quote.price,
                    current_price,
                    current_value_home,
                    unrealized_pl_home,
                    unrealized_pl_pct: self.percent(unrealized_pl_home, cost_basis_home),
                    daily_change_home,
                })
            }
            Err(e) => {
                log::warn!(
                    "Market value of {} in portfolio {} unavailable: {e}",
                    holding.ticker,
                    holding.portfolio_id
                );
                MarketValue::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    // ── Portfolio ───────────────────────────────────────────────────

    /// Value every open holding of a portfolio, then weight them.
    ///
    /// Two passes: weights need the total of all priced holdings first.
    /// Integrity errors abort; missing market data only degrades the
    /// affected holding.
    pub fn value_portfolio(
        &self,
        portfolio: &Portfolio,
        transactions: &[Transaction],
        registry: &dyn StockRegistry,
        quotes: &QuoteSnapshot,
        rates: &ExchangeRateTable,
    ) -> Result<PortfolioValuation, CoreError> {
        self.ensure_home_matches(portfolio, rates)?;

        let mut holdings = Vec::new();
        let mut unvalued = Vec::new();
        let mut total_realized_pl_home = Decimal::ZERO;
        let mut realized_pl_complete = true;
        let mut fully_priced = true;

        for ticker in self.ledger.tickers(transactions) {
            let lots = self.ledger.lots(transactions, &ticker)?;
            let has_open = lots.iter().any(Lot::is_open);

            let Some(stock) = registry.get_stock(&ticker) else {
                fully_priced = false;
                if has_open {
                    unvalued.push(UnvaluedHolding {
                        ticker: ticker.clone(),
                        reason: CoreError::UnknownStock(ticker.clone()).to_string(),
                    });
                }
                continue;
            };

            match self.build_holding(portfolio.id, &stock, &lots, transactions, rates) {
                Ok(holding) => {
                    match holding.realized_pl_home {
                        Some(realized) => {
                            total_realized_pl_home =
                                arithmetic::add(total_realized_pl_home, realized)?;
                        }
                        None => realized_pl_complete = false,
                    }
                    if has_open {
                        let valuation =
                            self.value_holding(holding, quotes.get(&ticker), rates)?;
                        fully_priced &= valuation.market.is_available();
                        holdings.push(valuation);
                    }
                }
                Err(e) if e.is_missing_market_data() => {
                    log::warn!(
                        "Holding {ticker} in portfolio {} not valued: {e}",
                        portfolio.id
                    );
                    fully_priced = false;
                    if has_open {
                        unvalued.push(UnvaluedHolding {
                            ticker: ticker.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        // Second pass: weights against the priced total.
        let total_value_home =
            arithmetic::sum(holdings.iter().filter_map(|h| h.market.current_value_home()))?;
        self.apply_weights(&mut holdings, total_value_home);
        sort_by_weight(&mut holdings);

        let total_cost_basis_home =
            arithmetic::sum(holdings.iter().map(|h| h.holding.cost_basis_home))?;
        let priced_cost_basis = arithmetic::sum(
            holdings
                .iter()
                .filter(|h| h.market.is_available())
                .map(|h| h.holding.cost_basis_home),
        )?;
        let total_unrealized_pl_home = arithmetic::sum(
            holdings
                .iter()
                .filter_map(|h| h.market.figures())
                .map(|f| f.unrealized_pl_home),
        )?;
        let total_daily_change_home = arithmetic::sum(
            holdings
                .iter()
                .filter_map(|h| h.market.figures())
                .map(|f| f.daily_change_home),
        )?;

        Ok(PortfolioValuation {
            portfolio_id: portfolio.id,
            home_currency: portfolio.home_currency.clone(),
            holdings,
            unvalued,
            total_cost_basis_home,
            total_value_home,
            total_unrealized_pl_home,
            total_unrealized_pl_pct: self.percent(total_unrealized_pl_home, priced_cost_basis),
            total_realized_pl_home,
            realized_pl_complete,
            total_daily_change_home,
            fully_priced,
        })
    }

    /// Weight each priced holding as a share of `total_value_home`.
    pub fn apply_weights(&self, holdings: &mut [HoldingValuation], total_value_home: Decimal) {
        for holding in holdings.iter_mut() {
            holding.weight_pct = holding
                .market
                .current_value_home()
                .map(|value| self.percent(value, total_value_home));
        }
    }

    pub fn ensure_home_matches(
        &self,
        portfolio: &Portfolio,
        rates: &ExchangeRateTable,
    ) -> Result<(), CoreError> {
        if !rates.is_home(&portfolio.home_currency) {
            return Err(CoreError::Validation(format!(
                "Rate table is quoted in {} but portfolio {} reports in {}",
                rates.home_currency(),
                portfolio.id,
                portfolio.home_currency
            )));
        }
        Ok(())
    }

    /// `part / whole × 100`, 0 when `whole` is 0.
    #[must_use]
    pub fn percent(&self, part: Decimal, whole: Decimal) -> Decimal {
        percent_of(part, whole, self.percent_scale)
    }

    #[must_use]
    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    #[must_use]
    pub fn currency_service(&self) -> &CurrencyService {
        &self.currency_service
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

/// Saturates at `Decimal::MAX`/`MIN` when the ratio does not fit.
pub(crate) fn percent_of(part: Decimal, whole: Decimal, scale: u32) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    match part
        .checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
    {
        Some(pct) => pct.round_dp(scale),
        None => {
            log::warn!("Percentage {part} / {whole} out of range; saturating");
            if part.is_sign_negative() == whole.is_sign_negative() {
                Decimal::MAX
            } else {
                Decimal::MIN
            }
        }
    }
}

/// Largest weight first; unpriced holdings last, alphabetically.
pub(crate) fn sort_by_weight(holdings: &mut [HoldingValuation]) {
    holdings.sort_by(|a, b| {
        b.weight_pct
            .cmp(&a.weight_pct)
            .then_with(|| a.holding.ticker.cmp(&b.holding.ticker))
    });
}
