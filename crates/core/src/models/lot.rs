use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::Transaction;
use crate::arithmetic;
use crate::errors::CoreError;

/// The remaining, sellable portion of one BUY transaction.
///
/// Never stored. Built by the ledger from the BUY and every SELL whose
/// `source_transaction_id` points at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// Id of the BUY transaction this lot was opened by
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub ticker: String,
    pub executed_at: DateTime<Utc>,
    pub original_shares: Decimal,
    /// Shares not yet sold. Exactly zero once the lot is closed.
    pub remaining_shares: Decimal,
    pub price_per_share: Decimal,
    pub currency: String,
    /// Snapshot rate captured when the lot was bought
    pub exchange_rate_to_home: Option<Decimal>,
    pub fees: Decimal,
}

impl Lot {
    /// A freshly opened lot with nothing sold yet.
    pub(crate) fn from_buy(buy: &Transaction) -> Self {
        Self {
            id: buy.id,
            portfolio_id: buy.portfolio_id,
            ticker: buy.ticker.clone(),
            executed_at: buy.executed_at,
            original_shares: buy.shares,
            remaining_shares: buy.shares,
            price_per_share: buy.price_per_share,
            currency: buy.currency.clone(),
            exchange_rate_to_home: buy.exchange_rate_to_home,
            fees: buy.fees,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.remaining_shares > Decimal::ZERO
    }

    #[must_use]
    pub fn sold_shares(&self) -> Decimal {
        self.original_shares - self.remaining_shares
    }

    /// Cost of the remaining shares in the lot currency.
    pub fn remaining_cost(&self) -> Result<Decimal, CoreError> {
        arithmetic::mul(self.remaining_shares, self.price_per_share)
    }
}
