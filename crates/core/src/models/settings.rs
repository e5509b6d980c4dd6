use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Engine configuration.
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Reporting currency for portfolios created without an explicit one (e.g., "CZK").
    pub home_currency: String,

    /// Fractional-share tolerance. A lot with at most this many shares left is closed.
    pub share_epsilon: Decimal,

    /// Decimal places kept in percentages (P/L % and weights).
    pub percent_scale: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home_currency: "USD".to_string(),
            share_epsilon: dec!(0.00000001),
            percent_scale: 2,
        }
    }
}

impl Settings {
    /// Parse and validate settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("Invalid settings JSON: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file on disk.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_currency_code(&self.home_currency).map_err(CoreError::Config)?;
        if self.share_epsilon.is_sign_negative() {
            return Err(CoreError::Config(format!(
                "share_epsilon must not be negative, got {}",
                self.share_epsilon
            )));
        }
        if self.percent_scale > 10 {
            return Err(CoreError::Config(format!(
                "percent_scale must be at most 10, got {}",
                self.percent_scale
            )));
        }
        Ok(())
    }
}

/// Currency codes must be exactly 3 ASCII letters (e.g., USD, EUR, CZK).
pub fn validate_currency_code(code: &str) -> Result<String, String> {
    let trimmed = code.trim().to_uppercase();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!(
            "Invalid currency code '{code}': must be exactly 3 ASCII letters (e.g., USD, EUR, CZK)"
        ));
    }
    Ok(trimmed)
}
