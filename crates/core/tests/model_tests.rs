// ═══════════════════════════════════════════════════════════════════
// Model Tests — Stock, Transaction, SellOrder, market snapshots, Settings
// ═══════════════════════════════════════════════════════════════════

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Write;
use uuid::Uuid;

use lotbook_core::errors::CoreError;
use lotbook_core::models::market::{ExchangeRateTable, Quote, QuoteSnapshot};
use lotbook_core::models::portfolio::Portfolio;
use lotbook_core::models::sell::{SellMode, SellOrder};
use lotbook_core::models::settings::{validate_currency_code, Settings};
use lotbook_core::models::stock::Stock;
use lotbook_core::models::transaction::{BuyOrder, Transaction, TransactionType};
use lotbook_core::models::valuation::MarketValue;

// ═══════════════════════════════════════════════════════════════════
// Stock & Portfolio
// ═══════════════════════════════════════════════════════════════════

mod stock {
    use super::*;

    #[test]
    fn ticker_and_currency_are_uppercased() {
        let stock = Stock::new(" vod ", "Vodafone", "gbp", dec!(0.01));
        assert_eq!(stock.ticker, "VOD");
        assert_eq!(stock.currency, "GBP");
        assert_eq!(stock.price_scale, dec!(0.01));
    }

    #[test]
    fn unscaled_stock_has_scale_one() {
        assert_eq!(Stock::unscaled("AAPL", "Apple", "USD").price_scale, Decimal::ONE);
    }

    #[test]
    fn equality_is_by_ticker() {
        let a = Stock::unscaled("AAPL", "Apple", "USD");
        let b = Stock::unscaled("aapl", "Apple Inc.", "USD");
        assert_eq!(a, b);
    }

    #[test]
    fn portfolio_home_currency_is_normalized() {
        let portfolio = Portfolio::new("alice", "Main", " czk");
        assert_eq!(portfolio.home_currency, "CZK");
        assert!(portfolio.description.is_none());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Transaction & orders
// ═══════════════════════════════════════════════════════════════════

mod transaction {
    use super::*;

    fn order() -> BuyOrder {
        BuyOrder::new(
            "aapl",
            dec!(10),
            dec!(150),
            "usd",
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap(),
        )
    }

    #[test]
    fn buy_normalizes_and_has_no_source() {
        let pid = Uuid::new_v4();
        let t = Transaction::buy(pid, order().with_fees(dec!(1.5)).with_notes("first"));
        assert_eq!(t.portfolio_id, pid);
        assert_eq!(t.ticker, "AAPL");
        assert_eq!(t.currency, "USD");
        assert_eq!(t.fees, dec!(1.5));
        assert_eq!(t.notes.as_deref(), Some("first"));
        assert!(t.is_buy());
        assert!(!t.is_sell());
        assert!(t.source_transaction_id.is_none());
    }

    #[test]
    fn total_amount_excludes_fees() {
        let t = Transaction::buy(Uuid::new_v4(), order().with_fees(dec!(9)));
        assert_eq!(t.total_amount().unwrap(), dec!(1500));
    }

    #[test]
    fn total_amount_home_prefers_snapshot_rate() {
        let rates = ExchangeRateTable::new("CZK").with_rate("USD", dec!(23)).unwrap();
        let with_snapshot = Transaction::buy(Uuid::new_v4(), order().with_rate(dec!(22)));
        let without = Transaction::buy(Uuid::new_v4(), order());
        assert_eq!(with_snapshot.total_amount_home(&rates).unwrap(), dec!(33000));
        assert_eq!(without.total_amount_home(&rates).unwrap(), dec!(34500));
    }

    #[test]
    fn transaction_type_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&TransactionType::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&TransactionType::Sell).unwrap(), "\"SELL\"");
        assert_eq!(TransactionType::Sell.to_string(), "SELL");
    }

    #[test]
    fn transaction_json_defaults_optional_fields() {
        let json = format!(
            r#"{{
                "id": "{}",
                "portfolio_id": "{}",
                "ticker": "AAPL",
                "transaction_type": "BUY",
                "shares": 10,
                "price_per_share": 150,
                "currency": "USD",
                "executed_at": "2024-01-15T00:00:00Z"
            }}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let t: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(t.fees, Decimal::ZERO);
        assert!(t.exchange_rate_to_home.is_none());
        assert!(t.notes.is_none());
        assert!(t.source_transaction_id.is_none());
        assert_eq!(t.shares, dec!(10));
    }

    #[test]
    fn amounts_serialize_as_exact_strings() {
        let shares = Decimal::from(10) / Decimal::from(3);
        let price: Decimal = "123.456789012345678901".parse().unwrap();
        let t = Transaction::buy(
            Uuid::new_v4(),
            BuyOrder::new(
                "AAPL",
                shares,
                price,
                "USD",
                Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            )
            .with_rate(dec!(22.123456789012345678)),
        );

        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["price_per_share"], "123.456789012345678901");
        assert_eq!(json["shares"], shares.to_string());
        assert_eq!(json["fees"], "0");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.total_amount().unwrap(), t.total_amount().unwrap());
    }

    #[test]
    fn sell_mode_is_tagged_by_mode() {
        let lot_id = Uuid::new_v4();
        let json = serde_json::to_value(SellMode::Lot { lot_id }).unwrap();
        assert_eq!(json["mode"], "lot");

        let parsed: SellMode =
            serde_json::from_str(r#"{"mode": "entire", "quantity": 15}"#).unwrap();
        assert_eq!(parsed, SellMode::Entire { quantity: dec!(15) });
        assert_eq!(parsed.to_string(), "entire");
    }

    #[test]
    fn sell_order_builders() {
        let order = SellOrder::new(
            "AAPL",
            SellMode::Entire { quantity: dec!(5) },
            dec!(180),
            "USD",
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        )
        .with_fees(dec!(4))
        .with_rate(dec!(23))
        .with_notes("trim")
        .clamped();
        assert_eq!(order.fees, dec!(4));
        assert_eq!(order.exchange_rate_to_home, Some(dec!(23)));
        assert_eq!(order.notes.as_deref(), Some("trim"));
        assert!(order.clamp_to_available);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Quotes & exchange rates
// ═══════════════════════════════════════════════════════════════════

mod market {
    use super::*;

    #[test]
    fn quote_lookup_is_case_insensitive() {
        let quotes = QuoteSnapshot::new().with_quote("aapl", Quote::new(dec!(180)));
        assert_eq!(quotes.get("AAPL").unwrap().price, dec!(180));
        assert_eq!(quotes.len(), 1);
        assert!(quotes.get("MSFT").is_none());
    }

    #[test]
    fn home_currency_has_rate_one() {
        let rates = ExchangeRateTable::new("czk");
        assert_eq!(rates.home_currency(), "CZK");
        assert_eq!(rates.rate("CZK"), Some(Decimal::ONE));
        assert!(rates.is_home("czk"));
        assert!(rates.rate("USD").is_none());
    }

    #[test]
    fn non_positive_rates_are_rejected() {
        let mut rates = ExchangeRateTable::new("CZK");
        assert!(matches!(
            rates.set_rate("USD", Decimal::ZERO).unwrap_err(),
            CoreError::Validation(_)
        ));
        assert!(rates.set_rate("USD", dec!(-1)).is_err());
        assert!(rates.set_rate("CZK", dec!(2)).is_err());
        assert!(rates.set_rate("CZK", Decimal::ONE).is_ok());
    }

    #[test]
    fn currencies_are_sorted() {
        let rates = ExchangeRateTable::new("CZK")
            .with_rate("usd", dec!(23))
            .unwrap()
            .with_rate("EUR", dec!(25))
            .unwrap();
        assert_eq!(rates.currencies(), vec!["EUR", "USD"]);
        assert_eq!(rates.rate("Usd"), Some(dec!(23)));
    }

    #[test]
    fn rate_table_json_is_validated() {
        let rates: ExchangeRateTable =
            serde_json::from_str(r#"{"home_currency": "czk", "rates": {"usd": "23"}}"#).unwrap();
        assert_eq!(rates.home_currency(), "CZK");
        assert_eq!(rates.rate("USD"), Some(dec!(23)));
        assert_eq!(rates.rate("CZK"), Some(Decimal::ONE));

        for bad in [
            r#"{"home_currency": "CZK", "rates": {"USD": "0"}}"#,
            r#"{"home_currency": "CZK", "rates": {"USD": "-2"}}"#,
            r#"{"home_currency": "CZK", "rates": {"CZK": "2"}}"#,
            r#"{"home_currency": "KORUNA", "rates": {}}"#,
        ] {
            assert!(serde_json::from_str::<ExchangeRateTable>(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn unavailable_market_value_has_no_figures() {
        let market = MarketValue::Unavailable {
            reason: "No quote available for AAPL".into(),
        };
        assert!(!market.is_available());
        assert!(market.figures().is_none());
        assert!(market.current_value_home().is_none());
        assert_eq!(serde_json::to_value(&market).unwrap()["status"], "unavailable");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════════════

mod settings {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.home_currency, "USD");
        assert_eq!(settings.share_epsilon, dec!(0.00000001));
        assert_eq!(settings.percent_scale, 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let settings = Settings::from_json(r#"{"home_currency": "CZK"}"#).unwrap();
        assert_eq!(settings.home_currency, "CZK");
        assert_eq!(settings.percent_scale, 2);
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        assert!(matches!(
            Settings::from_json("{not json").unwrap_err(),
            CoreError::Config(_)
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Settings::from_json(r#"{"home_currency": "KORUNA"}"#).is_err());
        assert!(Settings::from_json(r#"{"share_epsilon": -0.1}"#).is_err());
        assert!(Settings::from_json(r#"{"percent_scale": 30}"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"home_currency": "EUR", "percent_scale": 4}}"#).unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.home_currency, "EUR");
        assert_eq!(settings.percent_scale, 4);
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::from_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, CoreError::FileIO(_)));
    }

    #[test]
    fn currency_codes_are_three_letters() {
        assert_eq!(validate_currency_code(" eur ").unwrap(), "EUR");
        assert!(validate_currency_code("EU").is_err());
        assert!(validate_currency_code("E1R").is_err());
    }
}
