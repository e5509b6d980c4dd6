// ═══════════════════════════════════════════════════════════════════
// Provider Tests — StockRegistry trait, StaticStockRegistry
// ═══════════════════════════════════════════════════════════════════

use rust_decimal_macros::dec;
use std::sync::Arc;

use lotbook_core::models::stock::Stock;
use lotbook_core::providers::registry::StaticStockRegistry;
use lotbook_core::providers::traits::StockRegistry;

// ═══════════════════════════════════════════════════════════════════
// Custom registry (host-provided master data)
// ═══════════════════════════════════════════════════════════════════

/// Resolves every ticker ending in ".L" as a pence-quoted London listing.
struct LondonRegistry;

impl StockRegistry for LondonRegistry {
    fn name(&self) -> &str {
        "LondonRegistry"
    }

    fn get_stock(&self, ticker: &str) -> Option<Stock> {
        let ticker = ticker.trim().to_uppercase();
        ticker
            .ends_with(".L")
            .then(|| Stock::new(ticker.clone(), ticker.clone(), "GBP", dec!(0.01)))
    }
}

mod static_registry {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = StaticStockRegistry::with_stocks([Stock::unscaled("AAPL", "Apple", "USD")]);
        assert_eq!(registry.get_stock("aapl").unwrap().name, "Apple");
        assert_eq!(registry.get_stock(" AAPL ").unwrap().currency, "USD");
        assert!(registry.get_stock("MSFT").is_none());
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut registry = StaticStockRegistry::new();
        assert!(registry.is_empty());
        registry.register(Stock::unscaled("VOD", "Vodafone", "GBP"));
        registry.register(Stock::new("VOD", "Vodafone Group", "GBP", dec!(0.01)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_stock("VOD").unwrap().price_scale, dec!(0.01));
    }

    #[test]
    fn name() {
        assert_eq!(StaticStockRegistry::new().name(), "StaticStockRegistry");
    }
}

mod trait_objects {
    use super::*;

    #[test]
    fn custom_registry_behind_trait_object() {
        let registry: Arc<dyn StockRegistry> = Arc::new(LondonRegistry);
        let stock = registry.get_stock("vod.l").unwrap();
        assert_eq!(stock.ticker, "VOD.L");
        assert_eq!(stock.price_scale, dec!(0.01));
        assert!(registry.get_stock("AAPL").is_none());
        assert_eq!(registry.name(), "LondonRegistry");
    }
}
