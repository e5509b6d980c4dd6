use rust_decimal::Decimal;
use uuid::Uuid;

use crate::arithmetic;
use crate::errors::CoreError;
use crate::models::lot::Lot;
use crate::models::sell::{SellAllocation, SellMode, SellOrder};
use crate::models::settings::{validate_currency_code, Settings};

/// Decides which open lots a sell order draws from.
///
/// Planning only: the caller turns allocations into SELL transactions and
/// appends them while holding the (portfolio, ticker) mutation lock.
pub struct SellAllocator {
    share_epsilon: Decimal,
}

impl SellAllocator {
    pub fn new(share_epsilon: Decimal) -> Self {
        Self { share_epsilon }
    }

    /// Allocate `order` against `lots` (the ticker's lots as derived by the ledger).
    ///
    /// Rejects instead of clamping unless `order.clamp_to_available` is set.
    pub fn allocate(
        &self,
        lots: &[Lot],
        order: &SellOrder,
    ) -> Result<Vec<SellAllocation>, CoreError> {
        self.validate_order(order)?;
        let ticker = order.ticker.trim().to_uppercase();

        let allocations = match &order.mode {
            SellMode::Entire { quantity } => {
                let quantity = Self::positive(*quantity, &ticker)?;
                self.allocate_fifo(lots, order, &ticker, quantity)?
            }
            SellMode::Lot { lot_id } => {
                let lot = self.find_open_lot(lots, order, &ticker, *lot_id)?;
                vec![SellAllocation {
                    source_transaction_id: lot.id,
                    shares: lot.remaining_shares,
                    fees: order.fees,
                }]
            }
            SellMode::Partial { lot_id, quantity } => {
                let requested = Self::positive(*quantity, &ticker)?;
                let lot = self.find_open_lot(lots, order, &ticker, *lot_id)?;
                let shares = self.fit_quantity(
                    requested,
                    lot.remaining_shares,
                    order.clamp_to_available,
                    || format!("lot {} of {ticker}", lot.id),
                )?;
                vec![SellAllocation {
                    source_transaction_id: lot.id,
                    shares,
                    fees: order.fees,
                }]
            }
        };

        log::debug!(
            "Allocated {} sell of {ticker} across {} lot(s): {:?}",
            order.mode,
            allocations.len(),
            allocations
                .iter()
                .map(|a| (a.source_transaction_id, a.shares))
                .collect::<Vec<_>>()
        );
        Ok(allocations)
    }

    /// Oldest-first walk over eligible lots. Fees ride on the first slice only.
    fn allocate_fifo(
        &self,
        lots: &[Lot],
        order: &SellOrder,
        ticker: &str,
        quantity: Decimal,
    ) -> Result<Vec<SellAllocation>, CoreError> {
        let mut eligible: Vec<&Lot> = lots
            .iter()
            .filter(|lot| lot.ticker == ticker && lot.is_open())
            .filter(|lot| lot.executed_at <= order.executed_at)
            .collect();
        eligible.sort_by_key(|lot| lot.executed_at);

        let available = arithmetic::sum(eligible.iter().map(|lot| lot.remaining_shares))?;
        if available.is_zero() {
            return Err(CoreError::Validation(format!(
                "No open lots of {ticker} available on {}",
                order.executed_at
            )));
        }
        let mut left = self.fit_quantity(quantity, available, order.clamp_to_available, || {
            format!("open lots of {ticker}")
        })?;

        let mut allocations = Vec::new();
        for lot in eligible {
            if left <= Decimal::ZERO {
                break;
            }
            Self::ensure_same_currency(lot, order)?;
            let take = lot.remaining_shares.min(left);
            let fees = if allocations.is_empty() {
                order.fees
            } else {
                Decimal::ZERO
            };
            allocations.push(SellAllocation {
                source_transaction_id: lot.id,
                shares: take,
                fees,
            });
            left -= take;
        }
        Ok(allocations)
    }

    fn find_open_lot<'a>(
        &self,
        lots: &'a [Lot],
        order: &SellOrder,
        ticker: &str,
        lot_id: Uuid,
    ) -> Result<&'a Lot, CoreError> {
        let lot = lots
            .iter()
            .find(|lot| lot.id == lot_id && lot.ticker == ticker)
            .ok_or_else(|| {
                CoreError::Validation(format!("Lot {lot_id} of {ticker} does not exist"))
            })?;
        if !lot.is_open() {
            return Err(CoreError::Validation(format!(
                "Lot {lot_id} of {ticker} is already closed"
            )));
        }
        if lot.executed_at > order.executed_at {
            return Err(CoreError::Validation(format!(
                "Lot {lot_id} of {ticker} was bought on {}, after the sell on {}",
                lot.executed_at, order.executed_at
            )));
        }
        Self::ensure_same_currency(lot, order)?;
        Ok(lot)
    }

    /// Accept `requested` if it fits in `available` (within epsilon),
    /// clamp it if asked to, otherwise reject.
    fn fit_quantity(
        &self,
        requested: Decimal,
        available: Decimal,
        clamp: bool,
        describe: impl Fn() -> String,
    ) -> Result<Decimal, CoreError> {
        if requested <= available {
            return Ok(requested);
        }
        if requested - available <= self.share_epsilon {
            return Ok(available);
        }
        if clamp {
            log::warn!(
                "Sell quantity {requested} exceeds {available} available in {}. Clamping.",
                describe()
            );
            return Ok(available);
        }
        Err(CoreError::Validation(format!(
            "Cannot sell {requested} shares: only {available} available in {}",
            describe()
        )))
    }

    fn validate_order(&self, order: &SellOrder) -> Result<(), CoreError> {
        if order.ticker.trim().is_empty() {
            return Err(CoreError::Validation("Sell order has no ticker".into()));
        }
        if order.price_per_share.is_sign_negative() {
            return Err(CoreError::Validation(format!(
                "Sell price must not be negative, got {}",
                order.price_per_share
            )));
        }
        if order.fees.is_sign_negative() {
            return Err(CoreError::Validation(format!(
                "Sell fees must not be negative, got {}",
                order.fees
            )));
        }
        if let Some(rate) = order.exchange_rate_to_home {
            if rate <= Decimal::ZERO {
                return Err(CoreError::Validation(format!(
                    "Exchange rate must be positive, got {rate}"
                )));
            }
        }
        validate_currency_code(&order.currency).map_err(CoreError::Validation)?;
        Ok(())
    }

    fn positive(quantity: Decimal, ticker: &str) -> Result<Decimal, CoreError> {
        if quantity <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "Sell quantity for {ticker} must be positive, got {quantity}"
            )));
        }
        Ok(quantity)
    }

    fn ensure_same_currency(lot: &Lot, order: &SellOrder) -> Result<(), CoreError> {
        if !lot.currency.eq_ignore_ascii_case(order.currency.trim()) {
            return Err(CoreError::Validation(format!(
                "Sell currency {} does not match lot {} currency {}",
                order.currency, lot.id, lot.currency
            )));
        }
        Ok(())
    }
}

impl Default for SellAllocator {
    fn default() -> Self {
        Self::new(Settings::default().share_epsilon)
    }
}
