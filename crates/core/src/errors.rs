use thiserror::Error;
use uuid::Uuid;

/// Unified error type for the entire lotbook-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Caller input ────────────────────────────────────────────────
    /// Malformed or out-of-range input. Nothing was changed.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ── Ledger consistency ──────────────────────────────────────────
    /// The transaction log contradicts itself (dangling lot reference,
    /// over-sold lot). Never auto-corrected.
    #[error("Ledger integrity error in portfolio {portfolio_id}, {ticker}, transaction {transaction_id}: {message}")]
    Integrity {
        portfolio_id: Uuid,
        ticker: String,
        transaction_id: Uuid,
        message: String,
    },

    // ── Market data ─────────────────────────────────────────────────
    #[error("No quote available for {ticker}")]
    MissingQuote { ticker: String },

    #[error("No exchange rate available for {currency}")]
    MissingExchangeRate { currency: String },

    // ── Lookups ─────────────────────────────────────────────────────
    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Unknown stock: {0}")]
    UnknownStock(String),

    // ── Serialization / File ────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),
}

impl CoreError {
    /// True for errors that only degrade a single holding's market figures.
    #[must_use]
    pub fn is_missing_market_data(&self) -> bool {
        matches!(
            self,
            CoreError::MissingQuote { .. } | CoreError::MissingExchangeRate { .. }
        )
    }

    pub(crate) fn integrity(
        portfolio_id: Uuid,
        ticker: &str,
        transaction_id: Uuid,
        message: impl Into<String>,
    ) -> Self {
        CoreError::Integrity {
            portfolio_id,
            ticker: ticker.to_string(),
            transaction_id,
            message: message.into(),
        }
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}
