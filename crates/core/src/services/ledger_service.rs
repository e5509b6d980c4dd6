use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::lot::Lot;
use crate::models::settings::{validate_currency_code, Settings};
use crate::models::transaction::{Transaction, TransactionType};

/// Derives lots from a portfolio's transaction log.
///
/// Pure business logic: no I/O, no market data. The transaction log is the
/// only source of truth, so every call recomputes from scratch.
pub struct LedgerService {
    share_epsilon: Decimal,
}

impl LedgerService {
    pub fn new(share_epsilon: Decimal) -> Self {
        Self { share_epsilon }
    }

    #[must_use]
    pub fn share_epsilon(&self) -> Decimal {
        self.share_epsilon
    }

    /// Every lot of `ticker`, open and closed, oldest execution first.
    ///
    /// Lots bought at the same instant keep their ledger order.
    pub fn lots(&self, transactions: &[Transaction], ticker: &str) -> Result<Vec<Lot>, CoreError> {
        let ticker = ticker.trim().to_uppercase();

        let mut lots: Vec<Lot> = Vec::new();
        let mut index: HashMap<Uuid, usize> = HashMap::new();
        for buy in transactions
            .iter()
            .filter(|t| t.ticker == ticker && t.transaction_type == TransactionType::Buy)
        {
            if buy.shares <= Decimal::ZERO {
                return Err(CoreError::integrity(
                    buy.portfolio_id,
                    &ticker,
                    buy.id,
                    format!("BUY has non-positive share count {}", buy.shares),
                ));
            }
            index.insert(buy.id, lots.len());
            lots.push(Lot::from_buy(buy));
        }

        for sell in transactions
            .iter()
            .filter(|t| t.ticker == ticker && t.transaction_type == TransactionType::Sell)
        {
            let source_id = sell.source_transaction_id.ok_or_else(|| {
                CoreError::integrity(
                    sell.portfolio_id,
                    &ticker,
                    sell.id,
                    "SELL has no source lot",
                )
            })?;
            let Some(&idx) = index.get(&source_id) else {
                return Err(Self::dangling_source(transactions, sell, source_id));
            };
            let lot = &mut lots[idx];
            lot.remaining_shares = lot
                .remaining_shares
                .checked_sub(sell.shares)
                .ok_or_else(|| {
                    CoreError::integrity(
                        sell.portfolio_id,
                        &ticker,
                        sell.id,
                        format!("SELL of {} overflows lot {}", sell.shares, lot.id),
                    )
                })?;
        }

        for lot in &mut lots {
            if lot.remaining_shares < -self.share_epsilon {
                log::error!(
                    "Lot {} of {} in portfolio {} is over-sold: remaining {}",
                    lot.id,
                    lot.ticker,
                    lot.portfolio_id,
                    lot.remaining_shares
                );
                return Err(CoreError::integrity(
                    lot.portfolio_id,
                    &lot.ticker,
                    lot.id,
                    format!(
                        "lot over-sold: {} bought, {} sold",
                        lot.original_shares,
                        lot.sold_shares()
                    ),
                ));
            }
            if lot.remaining_shares <= self.share_epsilon {
                lot.remaining_shares = Decimal::ZERO;
            }
        }

        // Stable sort: equal timestamps keep ledger order.
        lots.sort_by_key(|lot| lot.executed_at);
        Ok(lots)
    }

    /// Lots of `ticker` that still have shares, oldest execution first.
    pub fn open_lots(
        &self,
        transactions: &[Transaction],
        ticker: &str,
    ) -> Result<Vec<Lot>, CoreError> {
        let mut lots = self.lots(transactions, ticker)?;
        lots.retain(Lot::is_open);
        Ok(lots)
    }

    /// Open lots of every ticker, grouped by ticker (alphabetical).
    pub fn all_open_lots(&self, transactions: &[Transaction]) -> Result<Vec<Lot>, CoreError> {
        let mut all = Vec::new();
        for ticker in self.tickers(transactions) {
            all.extend(self.open_lots(transactions, &ticker)?);
        }
        Ok(all)
    }

    /// Distinct tickers appearing in the log, sorted.
    #[must_use]
    pub fn tickers(&self, transactions: &[Transaction]) -> Vec<String> {
        transactions
            .iter()
            .map(|t| t.ticker.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Check a whole log: field-level sanity of every record, then lot
    /// derivation for every ticker.
    pub fn validate_log(&self, transactions: &[Transaction]) -> Result<(), CoreError> {
        let mut seen = std::collections::HashSet::new();
        for transaction in transactions {
            if !seen.insert(transaction.id) {
                return Err(CoreError::Validation(format!(
                    "Duplicate transaction id {}",
                    transaction.id
                )));
            }
            self.validate_fields(transaction)?;
        }
        for ticker in self.tickers(transactions) {
            self.lots(transactions, &ticker)?;
        }
        Ok(())
    }

    /// Field-level rules shared by every recorded transaction.
    ///
    /// Rules:
    /// - shares must be positive
    /// - price and fees must not be negative
    /// - currency must be a 3-letter code
    /// - a snapshot rate, when present, must be positive
    /// - only SELLs carry a source lot
    pub fn validate_fields(&self, transaction: &Transaction) -> Result<(), CoreError> {
        let context = format!(
            "{} {} in portfolio {}",
            transaction.transaction_type, transaction.ticker, transaction.portfolio_id
        );
        if transaction.ticker.trim().is_empty() {
            return Err(CoreError::Validation(format!("{context}: ticker is empty")));
        }
        if transaction.shares <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "{context}: shares must be positive, got {}",
                transaction.shares
            )));
        }
        if transaction.price_per_share.is_sign_negative() {
            return Err(CoreError::Validation(format!(
                "{context}: price must not be negative, got {}",
                transaction.price_per_share
            )));
        }
        if transaction.fees.is_sign_negative() {
            return Err(CoreError::Validation(format!(
                "{context}: fees must not be negative, got {}",
                transaction.fees
            )));
        }
        validate_currency_code(&transaction.currency)
            .map_err(|e| CoreError::Validation(format!("{context}: {e}")))?;
        if let Some(rate) = transaction.exchange_rate_to_home {
            if rate <= Decimal::ZERO {
                return Err(CoreError::Validation(format!(
                    "{context}: exchange rate must be positive, got {rate}"
                )));
            }
        }
        if transaction.is_buy() && transaction.source_transaction_id.is_some() {
            return Err(CoreError::Validation(format!(
                "{context}: a BUY cannot reference a source lot"
            )));
        }
        Ok(())
    }

    /// A BUY may only be deleted while no SELL draws from it.
    pub fn ensure_removable(
        &self,
        transactions: &[Transaction],
        transaction_id: Uuid,
    ) -> Result<(), CoreError> {
        let target = transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;

        if target.is_buy() {
            let dependants: Vec<Uuid> = transactions
                .iter()
                .filter(|t| t.source_transaction_id == Some(transaction_id))
                .map(|t| t.id)
                .collect();
            if !dependants.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Cannot remove BUY {transaction_id} of {}: {} SELL transaction(s) draw from it",
                    target.ticker,
                    dependants.len()
                )));
            }
        }
        Ok(())
    }

    fn dangling_source(
        transactions: &[Transaction],
        sell: &Transaction,
        source_id: Uuid,
    ) -> CoreError {
        let message = match transactions.iter().find(|t| t.id == source_id) {
            Some(source) if source.is_sell() => {
                format!("source {source_id} is a SELL, not a lot")
            }
            Some(source) => format!(
                "source {source_id} is a BUY of {}, not {}",
                source.ticker, sell.ticker
            ),
            None => format!("source lot {source_id} does not exist"),
        };
        log::error!(
            "Dangling SELL {} in portfolio {}: {}",
            sell.id,
            sell.portfolio_id,
            message
        );
        CoreError::integrity(sell.portfolio_id, &sell.ticker, sell.id, message)
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new(Settings::default().share_epsilon)
    }
}
