use std::collections::HashMap;

use crate::models::stock::Stock;

use super::traits::StockRegistry;

/// Fixed in-memory registry, keyed by uppercased ticker.
///
/// Suitable for tests and for hosts that load the whole master table up front.
#[derive(Debug, Clone, Default)]
pub struct StaticStockRegistry {
    stocks: HashMap<String, Stock>,
}

impl StaticStockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            stocks: HashMap::new(),
        }
    }

    /// Create a registry pre-filled with `stocks`.
    pub fn with_stocks(stocks: impl IntoIterator<Item = Stock>) -> Self {
        let mut registry = Self::new();
        for stock in stocks {
            registry.register(stock);
        }
        registry
    }

    /// Register or replace a stock.
    pub fn register(&mut self, stock: Stock) {
        self.stocks.insert(stock.ticker.clone(), stock);
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }
}

impl StockRegistry for StaticStockRegistry {
    fn name(&self) -> &str {
        "StaticStockRegistry"
    }

    fn get_stock(&self, ticker: &str) -> Option<Stock> {
        self.stocks.get(&ticker.trim().to_uppercase()).cloned()
    }
}
