use crate::models::stock::Stock;

/// Read-only lookup of stock reference data (ticker → currency, price scale).
///
/// The master-data registry lives outside this crate; implementations wrap
/// whatever source the host application has (database table, API, fixture).
pub trait StockRegistry: Send + Sync {
    /// Human-readable name of this registry (for logs/errors).
    fn name(&self) -> &str;

    /// Look up a ticker. Implementations should match case-insensitively.
    fn get_stock(&self, ticker: &str) -> Option<Stock>;
}
