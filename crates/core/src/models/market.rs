use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::settings::validate_currency_code;
use crate::errors::CoreError;

/// A live quote as delivered by the quote feed, in QUOTED units.
///
/// For exchanges quoting in a minor unit (pence) these numbers are not
/// per-share currency amounts until multiplied by the stock's price scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,

    /// Absolute change since the previous close
    #[serde(default)]
    pub daily_change: Decimal,

    #[serde(default)]
    pub daily_change_pct: Option<Decimal>,
}

impl Quote {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            daily_change: Decimal::ZERO,
            daily_change_pct: None,
        }
    }

    pub fn with_daily_change(mut self, daily_change: Decimal) -> Self {
        self.daily_change = daily_change;
        self
    }
}

/// Point-in-time quotes keyed by uppercased ticker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub quotes: HashMap<String, Quote>,
}

impl QuoteSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: &str, quote: Quote) {
        self.quotes.insert(ticker.trim().to_uppercase(), quote);
    }

    pub fn with_quote(mut self, ticker: &str, quote: Quote) -> Self {
        self.insert(ticker, quote);
        self
    }

    pub fn get(&self, ticker: &str) -> Option<&Quote> {
        self.quotes.get(&ticker.trim().to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Snapshot of "units of home currency per 1 unit of currency X".
///
/// The home currency itself always has rate 1 and is never stored.
/// Deserialized tables go through the same checks as `set_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExchangeRateTable")]
pub struct ExchangeRateTable {
    home_currency: String,
    rates: HashMap<String, Decimal>,
}

impl ExchangeRateTable {
    pub fn new(home_currency: &str) -> Self {
        Self {
            home_currency: home_currency.trim().to_uppercase(),
            rates: HashMap::new(),
        }
    }

    #[must_use]
    pub fn home_currency(&self) -> &str {
        &self.home_currency
    }

    /// Insert or replace a rate. Rates must be strictly positive.
    pub fn set_rate(&mut self, currency: &str, rate: Decimal) -> Result<(), CoreError> {
        if rate <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "Exchange rate for {currency} must be positive, got {rate}"
            )));
        }
        let code = currency.trim().to_uppercase();
        if code == self.home_currency {
            if rate != Decimal::ONE {
                return Err(CoreError::Validation(format!(
                    "Home currency {code} must have rate 1, got {rate}"
                )));
            }
            return Ok(());
        }
        self.rates.insert(code, rate);
        Ok(())
    }

    /// Builder-style `set_rate`.
    pub fn with_rate(mut self, currency: &str, rate: Decimal) -> Result<Self, CoreError> {
        self.set_rate(currency, rate)?;
        Ok(self)
    }

    /// Rate for `currency`; `Some(1)` for the home currency.
    #[must_use]
    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        let code = currency.trim().to_uppercase();
        if code == self.home_currency {
            return Some(Decimal::ONE);
        }
        self.rates.get(&code).copied()
    }

    #[must_use]
    pub fn is_home(&self, currency: &str) -> bool {
        currency.trim().eq_ignore_ascii_case(&self.home_currency)
    }

    /// All non-home currencies with a rate, sorted by code.
    #[must_use]
    pub fn currencies(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.rates.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}

#[derive(Deserialize)]
struct RawExchangeRateTable {
    home_currency: String,
    #[serde(default)]
    rates: HashMap<String, Decimal>,
}

impl TryFrom<RawExchangeRateTable> for ExchangeRateTable {
    type Error = CoreError;

    fn try_from(raw: RawExchangeRateTable) -> Result<Self, Self::Error> {
        let home = validate_currency_code(&raw.home_currency).map_err(CoreError::Validation)?;
        let mut table = Self::new(&home);
        for (currency, rate) in raw.rates {
            table.set_rate(&currency, rate)?;
        }
        Ok(table)
    }
}
