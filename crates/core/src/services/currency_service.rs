use rust_decimal::Decimal;

use crate::arithmetic;
use crate::errors::CoreError;
use crate::models::market::ExchangeRateTable;

/// Converts between a position's trading currency and the home currency,
/// and turns quoted prices into actual per-share prices.
///
/// Rates are "units of home currency per 1 unit of X":
/// - X → home: multiply by the rate
/// - home → X: divide by the rate
/// - X → Y: go through home
///
/// A missing rate is always an error. Whether that error is fatal is up
/// to the caller (the valuation service isolates it per holding).
pub struct CurrencyService;

impl CurrencyService {
    pub fn new() -> Self {
        Self
    }

    /// Convert `amount` of `currency` into the home currency.
    pub fn to_home(
        &self,
        amount: Decimal,
        currency: &str,
        rates: &ExchangeRateTable,
    ) -> Result<Decimal, CoreError> {
        if rates.is_home(currency) {
            return Ok(amount);
        }
        let rate = Self::rate_for(currency, rates)?;
        arithmetic::mul(amount, rate)
    }

    /// Convert a home-currency amount back into `currency`.
    pub fn from_home(
        &self,
        amount_home: Decimal,
        currency: &str,
        rates: &ExchangeRateTable,
    ) -> Result<Decimal, CoreError> {
        if rates.is_home(currency) {
            return Ok(amount_home);
        }
        let rate = Self::rate_for(currency, rates)?;
        if rate.is_zero() {
            return Err(CoreError::MissingExchangeRate {
                currency: currency.trim().to_uppercase(),
            });
        }
        arithmetic::div(amount_home, rate)
    }

    /// Convert between two arbitrary currencies through the home currency.
    pub fn convert(
        &self,
        amount: Decimal,
        from_currency: &str,
        to_currency: &str,
        rates: &ExchangeRateTable,
    ) -> Result<Decimal, CoreError> {
        if from_currency.trim().eq_ignore_ascii_case(to_currency.trim()) {
            return Ok(amount);
        }
        let home = self.to_home(amount, from_currency, rates)?;
        self.from_home(home, to_currency, rates)
    }

    /// Convert using a rate captured at execution time when there is one.
    ///
    /// Returns the converted amount and whether the snapshot (or home
    /// currency identity) was used rather than today's rate.
    pub fn to_home_at(
        &self,
        amount: Decimal,
        currency: &str,
        snapshot_rate: Option<Decimal>,
        rates: &ExchangeRateTable,
    ) -> Result<(Decimal, bool), CoreError> {
        if rates.is_home(currency) {
            return Ok((amount, true));
        }
        match snapshot_rate {
            Some(rate) if rate > Decimal::ZERO => Ok((arithmetic::mul(amount, rate)?, true)),
            _ => {
                let converted = self.to_home(amount, currency, rates)?;
                log::debug!(
                    "No snapshot rate for {currency} amount {amount}; using current rate"
                );
                Ok((converted, false))
            }
        }
    }

    /// Turn a quoted price into an actual per-share price.
    ///
    /// Must be applied exactly once, where a live quote enters valuation.
    /// Ledger prices are already actual per-share amounts.
    pub fn scale_price(
        &self,
        quoted_price: Decimal,
        price_scale: Decimal,
    ) -> Result<Decimal, CoreError> {
        arithmetic::mul(quoted_price, price_scale)
    }

    fn rate_for(currency: &str, rates: &ExchangeRateTable) -> Result<Decimal, CoreError> {
        rates
            .rate(currency)
            .ok_or_else(|| CoreError::MissingExchangeRate {
                currency: currency.trim().to_uppercase(),
            })
    }
}

impl Default for CurrencyService {
    fn default() -> Self {
        Self::new()
    }
}
