// ═══════════════════════════════════════════════════════════════════
// Storage Tests — InMemoryLedgerStore, MutationLocks
// ═══════════════════════════════════════════════════════════════════

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use std::time::Duration;
use uuid::Uuid;

use lotbook_core::errors::CoreError;
use lotbook_core::models::portfolio::Portfolio;
use lotbook_core::models::transaction::{BuyOrder, Transaction};
use lotbook_core::storage::locks::MutationLocks;
use lotbook_core::storage::memory::InMemoryLedgerStore;
use lotbook_core::storage::traits::LedgerStore;

fn buy(portfolio_id: Uuid, ticker: &str) -> Transaction {
    Transaction::buy(
        portfolio_id,
        BuyOrder::new(
            ticker,
            dec!(1),
            dec!(100),
            "USD",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ),
    )
}

// ═══════════════════════════════════════════════════════════════════
// InMemoryLedgerStore
// ═══════════════════════════════════════════════════════════════════

mod memory_store {
    use super::*;

    #[tokio::test]
    async fn insert_and_get_portfolio() {
        let store = InMemoryLedgerStore::new();
        let p = Portfolio::new("alice", "Main", "USD");
        store.insert_portfolio(p.clone()).await.unwrap();

        assert_eq!(store.get_portfolio(p.id).await.unwrap(), p);
        assert!(store.load_transactions(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_portfolio_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let p = Portfolio::new("alice", "Main", "USD");
        store.insert_portfolio(p.clone()).await.unwrap();
        assert!(matches!(
            store.insert_portfolio(p).await.unwrap_err(),
            CoreError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn unknown_portfolio_is_not_found() {
        let store = InMemoryLedgerStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.get_portfolio(id).await.unwrap_err(),
            CoreError::PortfolioNotFound(_)
        ));
        assert!(store.load_transactions(id).await.is_err());
        assert!(store.append_transactions(id, vec![buy(id, "AAPL")]).await.is_err());
        assert!(store.delete_empty_portfolio(id).await.is_err());
    }

    #[tokio::test]
    async fn append_keeps_order() {
        let store = InMemoryLedgerStore::new();
        let p = Portfolio::new("alice", "Main", "USD");
        store.insert_portfolio(p.clone()).await.unwrap();

        let a = buy(p.id, "AAPL");
        let b = buy(p.id, "MSFT");
        let c = buy(p.id, "AAPL");
        store.append_transactions(p.id, vec![a.clone()]).await.unwrap();
        store
            .append_transactions(p.id, vec![b.clone(), c.clone()])
            .await
            .unwrap();

        let ids: Vec<Uuid> = store
            .load_transactions(p.id)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn batch_with_foreign_record_is_rejected_whole() {
        let store = InMemoryLedgerStore::new();
        let p = Portfolio::new("alice", "Main", "USD");
        store.insert_portfolio(p.clone()).await.unwrap();

        let batch = vec![buy(p.id, "AAPL"), buy(Uuid::new_v4(), "AAPL")];
        assert!(store.append_transactions(p.id, batch).await.is_err());
        assert!(store.load_transactions(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_and_set_notes() {
        let store = InMemoryLedgerStore::new();
        let p = Portfolio::new("alice", "Main", "USD");
        store.insert_portfolio(p.clone()).await.unwrap();
        let t = buy(p.id, "AAPL");
        store.append_transactions(p.id, vec![t.clone()]).await.unwrap();

        store.set_notes(p.id, t.id, Some("note".into())).await.unwrap();
        assert_eq!(
            store.load_transactions(p.id).await.unwrap()[0].notes.as_deref(),
            Some("note")
        );

        let removed = store.remove_transaction(p.id, t.id).await.unwrap();
        assert_eq!(removed.id, t.id);
        assert!(matches!(
            store.remove_transaction(p.id, t.id).await.unwrap_err(),
            CoreError::TransactionNotFound(_)
        ));
        assert!(store.set_notes(p.id, t.id, None).await.is_err());
    }

    #[tokio::test]
    async fn delete_empty_portfolio_refuses_one_with_history() {
        let store = InMemoryLedgerStore::new();
        let p = Portfolio::new("alice", "Main", "USD");
        store.insert_portfolio(p.clone()).await.unwrap();
        store.append_transactions(p.id, vec![buy(p.id, "AAPL")]).await.unwrap();

        assert!(matches!(
            store.delete_empty_portfolio(p.id).await.unwrap_err(),
            CoreError::Validation(_)
        ));
        assert_eq!(store.load_transactions(p.id).await.unwrap().len(), 1);

        let empty = Portfolio::new("alice", "Spare", "USD");
        store.insert_portfolio(empty.clone()).await.unwrap();
        store.delete_empty_portfolio(empty.id).await.unwrap();
        assert!(matches!(
            store.get_portfolio(empty.id).await.unwrap_err(),
            CoreError::PortfolioNotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_filters_by_owner_and_update_replaces() {
        let store = InMemoryLedgerStore::new();
        let mut mine = Portfolio::new("alice", "Main", "USD");
        store.insert_portfolio(mine.clone()).await.unwrap();
        store
            .insert_portfolio(Portfolio::new("bob", "Other", "USD"))
            .await
            .unwrap();

        mine.name = "Renamed".into();
        store.update_portfolio(mine.clone()).await.unwrap();

        let listed = store.list_portfolios("alice").await.unwrap();
        assert_eq!(listed, vec![mine]);
        assert_eq!(store.name(), "InMemoryLedgerStore");
    }
}

// ═══════════════════════════════════════════════════════════════════
// MutationLocks
// ═══════════════════════════════════════════════════════════════════

mod locks {
    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = MutationLocks::new();
        let pid = Uuid::new_v4();

        let guard = locks.acquire(pid, "AAPL").await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire(pid, "aapl")).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(pid, "AAPL")).await;
        assert!(reacquired.is_ok());
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn other_keys_do_not_contend() {
        let locks = MutationLocks::new();
        let pid = Uuid::new_v4();

        let _aapl = locks.acquire(pid, "AAPL").await;
        let msft = tokio::time::timeout(Duration::from_millis(50), locks.acquire(pid, "MSFT")).await;
        assert!(msft.is_ok());
        let other_portfolio =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(Uuid::new_v4(), "AAPL"))
                .await;
        assert!(other_portfolio.is_ok());
        assert_eq!(locks.len(), 3);
    }

    #[test]
    fn starts_empty() {
        assert!(MutationLocks::new().is_empty());
    }

    #[tokio::test]
    async fn released_keys_are_forgotten() {
        let locks = MutationLocks::new();
        let pid = Uuid::new_v4();

        for i in 0..100 {
            let _guard = locks.acquire(pid, &format!("T{i}")).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn key_with_a_waiter_survives_release() {
        let locks = std::sync::Arc::new(MutationLocks::new());
        let pid = Uuid::new_v4();

        let first = locks.acquire(pid, "AAPL").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(pid, "AAPL").await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        // Let the waiter reach the mutex.
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
