use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockKey = (Uuid, String);

/// Exclusive mutation locks keyed by (portfolio id, ticker).
///
/// Two sells of the same ticker in the same portfolio must not both read
/// the same open-lot snapshot, so every mutation holds the key's lock from
/// reading the ledger until its append returns. Unrelated tickers and other
/// portfolios never contend. Reads take no lock.
///
/// Entries live only while someone holds or waits for them, so the map is
/// bounded by the number of in-flight mutations.
#[derive(Debug, Default)]
pub struct MutationLocks {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl MutationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the lock of one (portfolio, ticker) pair.
    /// Released when the guard is dropped.
    pub async fn acquire(&self, portfolio_id: Uuid, ticker: &str) -> MutationGuard<'_> {
        let key = (portfolio_id, ticker.trim().to_uppercase());
        // Clone the Arc out so no map shard stays locked across the await.
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        MutationGuard {
            guard: Some(mutex.lock_owned().await),
            key,
            locks: self,
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds one key's lock; drops the map entry when nobody else wants it.
#[derive(Debug)]
pub struct MutationGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    key: LockKey,
    locks: &'a MutationLocks,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        // Release first: the guard owns a clone of the Arc.
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of 1 means only the map does.
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
