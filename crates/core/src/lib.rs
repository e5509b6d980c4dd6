pub mod arithmetic;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use errors::CoreError;
use models::{
    aggregate::{AggregatedHolding, CombinedValuation},
    history::{MarketSnapshot, ValueHistory},
    lot::Lot,
    market::{ExchangeRateTable, QuoteSnapshot},
    portfolio::Portfolio,
    sell::SellOrder,
    settings::{validate_currency_code, Settings},
    transaction::{BuyOrder, Transaction},
    valuation::{HoldingValuation, PortfolioValuation, RealizedTrade},
};
use providers::traits::StockRegistry;
use services::{
    aggregation_service::AggregationService, allocator_service::SellAllocator,
    history_service::HistoryService, ledger_service::LedgerService,
    valuation_service::ValuationService,
};
use storage::{locks::MutationLocks, memory::InMemoryLedgerStore, traits::LedgerStore};

/// Main entry point for the lotbook core library.
///
/// Owns the ledger store, the stock registry, the settings and the
/// per-(portfolio, ticker) mutation locks. Reads are lock-free and derive
/// everything from the stored transaction log; mutations serialize per key.
#[must_use]
pub struct LotBook<S: LedgerStore> {
    store: S,
    registry: Arc<dyn StockRegistry>,
    settings: Settings,
    ledger: LedgerService,
    allocator: SellAllocator,
    valuation_service: ValuationService,
    aggregation_service: AggregationService,
    history_service: HistoryService,
    locks: MutationLocks,
}

impl<S: LedgerStore> std::fmt::Debug for LotBook<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LotBook")
            .field("store", &self.store.name())
            .field("registry", &self.registry.name())
            .field("settings", &self.settings)
            .field("locked_keys", &self.locks.len())
            .finish()
    }
}

impl LotBook<InMemoryLedgerStore> {
    /// A book backed by a fresh in-memory store with default settings.
    pub fn in_memory(registry: Arc<dyn StockRegistry>) -> Self {
        Self::build(InMemoryLedgerStore::new(), registry, Settings::default())
    }
}

impl<S: LedgerStore> LotBook<S> {
    /// Wire a book over an existing store. Settings are validated first.
    pub fn new(
        store: S,
        registry: Arc<dyn StockRegistry>,
        settings: Settings,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self::build(store, registry, settings))
    }

    // ── Portfolios ──────────────────────────────────────────────────

    /// Create an empty portfolio. `home_currency = None` uses the settings default.
    pub async fn create_portfolio(
        &self,
        owner: &str,
        name: &str,
        home_currency: Option<&str>,
    ) -> Result<Portfolio, CoreError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(CoreError::Validation("Portfolio owner must not be empty".into()));
        }
        let name = Self::portfolio_name(name)?;
        let currency = validate_currency_code(home_currency.unwrap_or(&self.settings.home_currency))
            .map_err(CoreError::Validation)?;

        let portfolio = Portfolio::new(owner, name, currency);
        self.store.insert_portfolio(portfolio.clone()).await?;
        log::debug!(
            "Created portfolio {} ({}) for {owner} in {}",
            portfolio.id,
            portfolio.name,
            portfolio.home_currency
        );
        Ok(portfolio)
    }

    pub async fn get_portfolio(&self, portfolio_id: Uuid) -> Result<Portfolio, CoreError> {
        self.store.get_portfolio(portfolio_id).await
    }

    pub async fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>, CoreError> {
        self.store.list_portfolios(owner.trim()).await
    }

    pub async fn rename_portfolio(
        &self,
        portfolio_id: Uuid,
        name: &str,
    ) -> Result<Portfolio, CoreError> {
        let mut portfolio = self.store.get_portfolio(portfolio_id).await?;
        portfolio.name = Self::portfolio_name(name)?.to_string();
        self.store.update_portfolio(portfolio.clone()).await?;
        Ok(portfolio)
    }

    /// Set or clear the free-text description.
    pub async fn set_portfolio_description(
        &self,
        portfolio_id: Uuid,
        description: Option<String>,
    ) -> Result<Portfolio, CoreError> {
        let mut portfolio = self.store.get_portfolio(portfolio_id).await?;
        portfolio.description = description.filter(|d| !d.trim().is_empty());
        self.store.update_portfolio(portfolio.clone()).await?;
        Ok(portfolio)
    }

    /// Delete a portfolio. Only allowed once it holds no transactions;
    /// the store checks and removes in one step.
    pub async fn delete_portfolio(&self, portfolio_id: Uuid) -> Result<(), CoreError> {
        self.store.delete_empty_portfolio(portfolio_id).await?;
        log::debug!("Deleted portfolio {portfolio_id}");
        Ok(())
    }

    // ── Transactions ────────────────────────────────────────────────

    /// Record a purchase. Opens a new lot.
    pub async fn record_buy(
        &self,
        portfolio_id: Uuid,
        order: BuyOrder,
    ) -> Result<Transaction, CoreError> {
        self.store.get_portfolio(portfolio_id).await?;
        let transaction = Transaction::buy(portfolio_id, order);
        self.ledger.validate_fields(&transaction)?;
        if self.registry.get_stock(&transaction.ticker).is_none() {
            return Err(CoreError::UnknownStock(transaction.ticker));
        }

        let _guard = self.locks.acquire(portfolio_id, &transaction.ticker).await;
        self.store
            .append_transactions(portfolio_id, vec![transaction.clone()])
            .await?;
        log::debug!(
            "Recorded BUY {} of {} {} in portfolio {portfolio_id}",
            transaction.id,
            transaction.shares,
            transaction.ticker
        );
        Ok(transaction)
    }

    /// Allocate a sell order against the current open lots and record
    /// the resulting SELLs.
    ///
    /// The (portfolio, ticker) lock is held from reading the lots until the
    /// append returns, so concurrent sells can never oversell a lot.
    pub async fn execute_sell(
        &self,
        portfolio_id: Uuid,
        order: &SellOrder,
    ) -> Result<Vec<Transaction>, CoreError> {
        let ticker = order.ticker.trim().to_uppercase();
        let _guard = self.locks.acquire(portfolio_id, &ticker).await;

        let sells = self.allocate_sell(portfolio_id, order).await?;
        self.store
            .append_transactions(portfolio_id, sells.clone())
            .await?;
        log::debug!(
            "Recorded {} SELL transaction(s) of {ticker} in portfolio {portfolio_id}",
            sells.len()
        );
        Ok(sells)
    }

    /// Plan a sell order without recording anything.
    ///
    /// Returns the SELL transactions `execute_sell` would append right now.
    pub async fn allocate_sell(
        &self,
        portfolio_id: Uuid,
        order: &SellOrder,
    ) -> Result<Vec<Transaction>, CoreError> {
        let transactions = self.store.load_transactions(portfolio_id).await?;
        let lots = self.ledger.lots(&transactions, &order.ticker)?;
        let allocations = self.allocator.allocate(&lots, order)?;
        Ok(allocations
            .iter()
            .map(|allocation| Transaction::sell(portfolio_id, order, allocation))
            .collect())
    }

    /// Delete one transaction. A BUY cannot go while SELLs draw from it.
    pub async fn remove_transaction(
        &self,
        portfolio_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, CoreError> {
        let ticker = self
            .store
            .load_transactions(portfolio_id)
            .await?
            .into_iter()
            .find(|t| t.id == transaction_id)
            .map(|t| t.ticker)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;

        let _guard = self.locks.acquire(portfolio_id, &ticker).await;
        // Re-read under the lock: a SELL may have been added meanwhile.
        let transactions = self.store.load_transactions(portfolio_id).await?;
        self.ledger.ensure_removable(&transactions, transaction_id)?;
        let removed = self
            .store
            .remove_transaction(portfolio_id, transaction_id)
            .await?;
        log::debug!(
            "Removed {} {} of {ticker} from portfolio {portfolio_id}",
            removed.transaction_type,
            removed.id
        );
        Ok(removed)
    }

    /// Set or clear notes on an existing transaction.
    pub async fn set_transaction_notes(
        &self,
        portfolio_id: Uuid,
        transaction_id: Uuid,
        notes: Option<String>,
    ) -> Result<(), CoreError> {
        let notes = notes.filter(|n| !n.trim().is_empty());
        self.store
            .set_notes(portfolio_id, transaction_id, notes)
            .await
    }

    /// The full log in recording order.
    pub async fn list_transactions(
        &self,
        portfolio_id: Uuid,
    ) -> Result<Vec<Transaction>, CoreError> {
        self.store.load_transactions(portfolio_id).await
    }

    // ── Lots ────────────────────────────────────────────────────────

    /// Open lots of one ticker, oldest execution first.
    pub async fn list_open_lots(
        &self,
        portfolio_id: Uuid,
        ticker: &str,
    ) -> Result<Vec<Lot>, CoreError> {
        let transactions = self.store.load_transactions(portfolio_id).await?;
        self.ledger.open_lots(&transactions, ticker)
    }

    /// Open lots of every ticker in the portfolio.
    pub async fn list_all_open_lots(&self, portfolio_id: Uuid) -> Result<Vec<Lot>, CoreError> {
        let transactions = self.store.load_transactions(portfolio_id).await?;
        self.ledger.all_open_lots(&transactions)
    }

    // ── Valuation ───────────────────────────────────────────────────

    /// Value one position. Fails with `UnknownStock` if the registry has
    /// no entry for `ticker`; a missing quote only flags the market figures.
    pub async fn value_holding(
        &self,
        portfolio_id: Uuid,
        ticker: &str,
        quotes: &QuoteSnapshot,
        rates: &ExchangeRateTable,
    ) -> Result<HoldingValuation, CoreError> {
        let portfolio = self.store.get_portfolio(portfolio_id).await?;
        self.valuation_service
            .ensure_home_matches(&portfolio, rates)?;
        let ticker = ticker.trim().to_uppercase();
        let stock = self
            .registry
            .get_stock(&ticker)
            .ok_or_else(|| CoreError::UnknownStock(ticker.clone()))?;

        let transactions = self.store.load_transactions(portfolio_id).await?;
        let lots = self.ledger.lots(&transactions, &ticker)?;
        let holding =
            self.valuation_service
                .build_holding(portfolio_id, &stock, &lots, &transactions, rates)?;
        self.valuation_service
            .value_holding(holding, quotes.get(&ticker), rates)
    }

    pub async fn value_portfolio(
        &self,
        portfolio_id: Uuid,
        quotes: &QuoteSnapshot,
        rates: &ExchangeRateTable,
    ) -> Result<PortfolioValuation, CoreError> {
        let portfolio = self.store.get_portfolio(portfolio_id).await?;
        let transactions = self.store.load_transactions(portfolio_id).await?;
        self.valuation_service.value_portfolio(
            &portfolio,
            &transactions,
            self.registry.as_ref(),
            quotes,
            rates,
        )
    }

    /// Every SELL of the portfolio with its realized P/L, oldest first.
    pub async fn realized_trades(
        &self,
        portfolio_id: Uuid,
        rates: &ExchangeRateTable,
    ) -> Result<Vec<RealizedTrade>, CoreError> {
        let portfolio = self.store.get_portfolio(portfolio_id).await?;
        self.valuation_service
            .ensure_home_matches(&portfolio, rates)?;
        let transactions = self.store.load_transactions(portfolio_id).await?;
        self.ledger.validate_log(&transactions)?;
        self.valuation_service.realized_trades(&transactions, rates)
    }

    /// Merge already-valued holdings from several portfolios by ticker.
    /// Every holding must be valued in the rate table's home currency.
    pub fn aggregate_across_portfolios(
        &self,
        holdings: &[HoldingValuation],
        rates: &ExchangeRateTable,
    ) -> Result<Vec<AggregatedHolding>, CoreError> {
        self.aggregation_service.aggregate(holdings, rates)
    }

    /// The "all portfolios" view of one owner.
    ///
    /// Every portfolio must report in the rate table's home currency.
    pub async fn value_all_portfolios(
        &self,
        owner: &str,
        quotes: &QuoteSnapshot,
        rates: &ExchangeRateTable,
    ) -> Result<CombinedValuation, CoreError> {
        let mut portfolios = Vec::new();
        for portfolio in self.store.list_portfolios(owner.trim()).await? {
            let transactions = self.store.load_transactions(portfolio.id).await?;
            portfolios.push(self.valuation_service.value_portfolio(
                &portfolio,
                &transactions,
                self.registry.as_ref(),
                quotes,
                rates,
            )?);
        }

        let all_holdings: Vec<HoldingValuation> = portfolios
            .iter()
            .flat_map(|p| p.holdings.iter().cloned())
            .collect();
        let holdings = self.aggregation_service.aggregate(&all_holdings, rates)?;

        let sum = |f: fn(&PortfolioValuation) -> Decimal| -> Result<Decimal, CoreError> {
            arithmetic::sum(portfolios.iter().map(f))
        };
        Ok(CombinedValuation {
            owner: owner.trim().to_string(),
            home_currency: rates.home_currency().to_string(),
            total_cost_basis_home: sum(|p| p.total_cost_basis_home)?,
            total_value_home: sum(|p| p.total_value_home)?,
            total_unrealized_pl_home: sum(|p| p.total_unrealized_pl_home)?,
            total_realized_pl_home: sum(|p| p.total_realized_pl_home)?,
            realized_pl_complete: portfolios.iter().all(|p| p.realized_pl_complete),
            total_daily_change_home: sum(|p| p.total_daily_change_home)?,
            holdings,
            portfolios,
        })
    }

    // ── History ─────────────────────────────────────────────────────

    /// Value of one portfolio at every snapshot day, plus total return.
    pub async fn value_history(
        &self,
        portfolio_id: Uuid,
        snapshots: &[MarketSnapshot],
    ) -> Result<ValueHistory, CoreError> {
        let portfolio = self.store.get_portfolio(portfolio_id).await?;
        let transactions = self.store.load_transactions(portfolio_id).await?;
        let home_currency = portfolio.home_currency.clone();
        self.history_service.value_history(
            &home_currency,
            &[(portfolio, transactions)],
            self.registry.as_ref(),
            snapshots,
        )
    }

    /// Combined value history of every portfolio of `owner`.
    ///
    /// All portfolios must share one home currency.
    pub async fn value_history_all(
        &self,
        owner: &str,
        snapshots: &[MarketSnapshot],
    ) -> Result<ValueHistory, CoreError> {
        let mut portfolios = Vec::new();
        for portfolio in self.store.list_portfolios(owner.trim()).await? {
            let transactions = self.store.load_transactions(portfolio.id).await?;
            portfolios.push((portfolio, transactions));
        }
        let home_currency = portfolios
            .first()
            .map(|(p, _)| p.home_currency.clone())
            .unwrap_or_else(|| self.settings.home_currency.clone());
        self.history_service.value_history(
            &home_currency,
            &portfolios,
            self.registry.as_ref(),
            snapshots,
        )
    }

    // ── Export / Import ─────────────────────────────────────────────

    /// Export the portfolio's transaction log as a JSON array.
    pub async fn export_transactions_json(&self, portfolio_id: Uuid) -> Result<String, CoreError> {
        let transactions = self.store.load_transactions(portfolio_id).await?;
        serde_json::to_string_pretty(&transactions).map_err(|e| {
            CoreError::Serialization(format!("Failed to serialize transactions to JSON: {e}"))
        })
    }

    /// Import a JSON array of transactions into a portfolio.
    ///
    /// Records are re-homed to `portfolio_id` and keep their ids, so SELLs
    /// still point at their BUYs. The existing log plus the imported records
    /// is validated as a whole before anything is appended; either every
    /// record lands or none does. Returns the number imported.
    pub async fn import_transactions_json(
        &self,
        portfolio_id: Uuid,
        json: &str,
    ) -> Result<usize, CoreError> {
        self.store.get_portfolio(portfolio_id).await?;
        let mut imported: Vec<Transaction> = serde_json::from_str(json)?;
        for transaction in &mut imported {
            transaction.portfolio_id = portfolio_id;
            transaction.ticker = transaction.ticker.trim().to_uppercase();
            transaction.currency = transaction.currency.trim().to_uppercase();
        }
        if imported.is_empty() {
            return Ok(0);
        }
        if let Some(unknown) = imported
            .iter()
            .find(|t| self.registry.get_stock(&t.ticker).is_none())
        {
            return Err(CoreError::UnknownStock(unknown.ticker.clone()));
        }

        // Sorted acquisition order keeps concurrent imports deadlock-free.
        let tickers: BTreeSet<String> = imported.iter().map(|t| t.ticker.clone()).collect();
        let mut guards = Vec::with_capacity(tickers.len());
        for ticker in &tickers {
            guards.push(self.locks.acquire(portfolio_id, ticker).await);
        }

        let mut combined = self.store.load_transactions(portfolio_id).await?;
        combined.extend(imported.iter().cloned());
        self.ledger.validate_log(&combined)?;

        let count = imported.len();
        self.store.append_transactions(portfolio_id, imported).await?;
        log::debug!("Imported {count} transaction(s) into portfolio {portfolio_id}");
        Ok(count)
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn registry(&self) -> &dyn StockRegistry {
        self.registry.as_ref()
    }

    // ── Internal ────────────────────────────────────────────────────

    fn portfolio_name(name: &str) -> Result<&str, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Portfolio name must not be empty".into()));
        }
        Ok(name)
    }

    fn build(store: S, registry: Arc<dyn StockRegistry>, settings: Settings) -> Self {
        Self {
            store,
            registry,
            ledger: LedgerService::new(settings.share_epsilon),
            allocator: SellAllocator::new(settings.share_epsilon),
            valuation_service: ValuationService::new(&settings),
            aggregation_service: AggregationService::new(&settings),
            history_service: HistoryService::new(&settings),
            locks: MutationLocks::new(),
            settings,
        }
    }
}
