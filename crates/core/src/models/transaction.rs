use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::ExchangeRateTable;
use super::sell::{SellAllocation, SellOrder};
use crate::arithmetic;
use crate::errors::CoreError;
use crate::services::currency_service::CurrencyService;

/// Type of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Opens a new lot
    Buy,
    /// Draws down exactly one existing lot
    Sell,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Buy => write!(f, "BUY"),
            TransactionType::Sell => write!(f, "SELL"),
        }
    }
}

/// A single BUY or SELL record in a portfolio's ledger.
///
/// Lots and holdings are never stored; they are always derived from the
/// full list of transactions. SELL records are produced by the sell
/// allocator so that each one references the BUY (lot) it draws down.
///
/// Amounts serialize as decimal strings so an exported log imports back
/// digit for digit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: Uuid,

    /// Owning portfolio
    pub portfolio_id: Uuid,

    /// Ticker symbol, uppercased
    pub ticker: String,

    /// Buy or Sell
    pub transaction_type: TransactionType,

    /// Number of shares (always positive, fractional allowed)
    #[serde(serialize_with = "rust_decimal::serde::str::serialize")]
    pub shares: Decimal,

    /// Actual per-share price in `currency` (never in quoted minor units)
    #[serde(serialize_with = "rust_decimal::serde::str::serialize")]
    pub price_per_share: Decimal,

    /// Currency of `price_per_share` and `fees`
    pub currency: String,

    /// Brokerage fees for this record
    #[serde(default, serialize_with = "rust_decimal::serde::str::serialize")]
    pub fees: Decimal,

    /// Units of home currency per 1 unit of `currency`, captured at execution
    #[serde(default, serialize_with = "rust_decimal::serde::str_option::serialize")]
    pub exchange_rate_to_home: Option<Decimal>,

    pub executed_at: DateTime<Utc>,

    /// Optional free-text notes
    #[serde(default)]
    pub notes: Option<String>,

    /// For SELL only: the BUY transaction this sell draws down
    #[serde(default)]
    pub source_transaction_id: Option<Uuid>,
}

impl Transaction {
    /// Build a BUY record from a user-level order.
    pub fn buy(portfolio_id: Uuid, order: BuyOrder) -> Self {
        Self {
            id: Uuid::new_v4(),
            portfolio_id,
            ticker: order.ticker.trim().to_uppercase(),
            transaction_type: TransactionType::Buy,
            shares: order.shares,
            price_per_share: order.price_per_share,
            currency: order.currency.trim().to_uppercase(),
            fees: order.fees,
            exchange_rate_to_home: order.exchange_rate_to_home,
            executed_at: order.executed_at,
            notes: order.notes,
            source_transaction_id: None,
        }
    }

    /// Build one SELL record for one allocation of a sell order.
    pub(crate) fn sell(portfolio_id: Uuid, order: &SellOrder, allocation: &SellAllocation) -> Self {
        Self {
            id: Uuid::new_v4(),
            portfolio_id,
            ticker: order.ticker.trim().to_uppercase(),
            transaction_type: TransactionType::Sell,
            shares: allocation.shares,
            price_per_share: order.price_per_share,
            currency: order.currency.trim().to_uppercase(),
            fees: allocation.fees,
            exchange_rate_to_home: order.exchange_rate_to_home,
            executed_at: order.executed_at,
            notes: order.notes.clone(),
            source_transaction_id: Some(allocation.source_transaction_id),
        }
    }

    #[must_use]
    pub fn is_buy(&self) -> bool {
        self.transaction_type == TransactionType::Buy
    }

    #[must_use]
    pub fn is_sell(&self) -> bool {
        self.transaction_type == TransactionType::Sell
    }

    /// Gross amount in the transaction currency, fees excluded.
    pub fn total_amount(&self) -> Result<Decimal, CoreError> {
        arithmetic::mul(self.shares, self.price_per_share)
    }

    /// Gross amount in the home currency, at the snapshot rate when there is one.
    pub fn total_amount_home(&self, rates: &ExchangeRateTable) -> Result<Decimal, CoreError> {
        CurrencyService::new()
            .to_home_at(
                self.total_amount()?,
                &self.currency,
                self.exchange_rate_to_home,
                rates,
            )
            .map(|(amount, _)| amount)
    }
}

/// User-level request to record a purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyOrder {
    pub ticker: String,
    pub shares: Decimal,
    pub price_per_share: Decimal,
    pub currency: String,
    #[serde(default)]
    pub fees: Decimal,
    #[serde(default)]
    pub exchange_rate_to_home: Option<Decimal>,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BuyOrder {
    pub fn new(
        ticker: impl Into<String>,
        shares: Decimal,
        price_per_share: Decimal,
        currency: impl Into<String>,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            shares,
            price_per_share,
            currency: currency.into(),
            fees: Decimal::ZERO,
            exchange_rate_to_home: None,
            executed_at,
            notes: None,
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
}
