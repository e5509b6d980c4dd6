// ═══════════════════════════════════════════════════════════════════
// Property Tests — share conservation, no oversell, currency round trip
// ═══════════════════════════════════════════════════════════════════

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

use lotbook_core::errors::CoreError;
use lotbook_core::models::lot::Lot;
use lotbook_core::models::market::ExchangeRateTable;
use lotbook_core::models::sell::{SellMode, SellOrder};
use lotbook_core::models::stock::Stock;
use lotbook_core::models::transaction::{BuyOrder, Transaction};
use lotbook_core::providers::registry::StaticStockRegistry;
use lotbook_core::services::currency_service::CurrencyService;
use lotbook_core::LotBook;

/// Shares with up to 2 decimals, from 0.01 to 100.00.
fn shares() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000).prop_map(|cents| Decimal::new(cents, 2))
}

/// What a book looks like after replaying random buys and sells.
struct Replay {
    log: Vec<Transaction>,
    lots: Vec<Lot>,
    rejected: Vec<CoreError>,
}

/// Records every buy, then sends each sell through `LotBook::execute_sell`.
fn replay(buys: &[Decimal], sells: &[(Decimal, bool)]) -> Replay {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let registry = Arc::new(StaticStockRegistry::with_stocks([Stock::unscaled(
            "AAPL",
            "Apple Inc.",
            "USD",
        )]));
        let book = LotBook::in_memory(registry);
        let portfolio = book.create_portfolio("alice", "Main", None).await.unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        for (i, shares) in buys.iter().enumerate() {
            let order = BuyOrder::new(
                "AAPL",
                *shares,
                Decimal::from(100 + i as i64),
                "USD",
                start + Duration::days(i as i64),
            );
            book.record_buy(portfolio.id, order).await.unwrap();
        }

        let sell_day = start + Duration::days(buys.len() as i64);
        let mut rejected = Vec::new();
        for (quantity, clamp) in sells {
            let mut order = SellOrder::new(
                "AAPL",
                SellMode::Entire { quantity: *quantity },
                Decimal::from(150),
                "USD",
                sell_day,
            );
            order.clamp_to_available = *clamp;
            if let Err(e) = book.execute_sell(portfolio.id, &order).await {
                rejected.push(e);
            }
        }

        Replay {
            log: book.list_transactions(portfolio.id).await.unwrap(),
            lots: book.list_open_lots(portfolio.id, "AAPL").await.unwrap(),
            rejected,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn remaining_shares_are_bought_minus_sold(
        buys in prop::collection::vec(shares(), 1..6),
        sells in prop::collection::vec((shares(), any::<bool>()), 0..12),
    ) {
        let replay = replay(&buys, &sells);

        for error in &replay.rejected {
            prop_assert!(matches!(error, CoreError::Validation(_)), "{error:?}");
        }
        for lot in &replay.lots {
            prop_assert!(lot.remaining_shares > Decimal::ZERO);
            prop_assert!(lot.remaining_shares <= lot.original_shares);
        }

        let bought: Decimal = buys.iter().copied().sum();
        let sold: Decimal = replay.log.iter().filter(|t| t.is_sell()).map(|t| t.shares).sum();
        let remaining: Decimal = replay.lots.iter().map(|lot| lot.remaining_shares).sum();
        prop_assert!(sold <= bought);
        prop_assert_eq!(remaining, bought - sold);
    }

    #[test]
    fn every_sell_points_at_a_buy_of_the_same_ticker(
        buys in prop::collection::vec(shares(), 1..4),
        sells in prop::collection::vec((shares(), any::<bool>()), 1..6),
    ) {
        let log = replay(&buys, &sells).log;
        for sell in log.iter().filter(|t| t.is_sell()) {
            let source = log.iter().find(|t| Some(t.id) == sell.source_transaction_id);
            prop_assert!(source.is_some());
            let source = source.unwrap();
            prop_assert!(source.is_buy());
            prop_assert_eq!(&source.ticker, &sell.ticker);
            prop_assert!(source.executed_at <= sell.executed_at);
        }
    }

    #[test]
    fn from_home_undoes_to_home(
        cents in -10_000_000i64..10_000_000,
        rate_milli in 1i64..1_000_000,
    ) {
        let svc = CurrencyService::new();
        let amount = Decimal::new(cents, 2);
        let rate = Decimal::new(rate_milli, 3);
        let rates = ExchangeRateTable::new("CZK").with_rate("USD", rate).unwrap();

        let home = svc.to_home(amount, "USD", &rates).unwrap();
        prop_assert_eq!(svc.from_home(home, "USD", &rates).unwrap(), amount);
    }
}
