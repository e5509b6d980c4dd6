use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::portfolio::Portfolio;
use crate::models::transaction::Transaction;

/// Persistence seam for portfolios and their transaction logs.
///
/// The engine never stores lots or holdings, only what is declared here.
/// Implementations decide the technology (SQL, document store, memory);
/// the only contract is that `append_transactions` is all-or-nothing and
/// that `load_transactions` returns records in the order they were appended.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Human-readable name of this store (for logs/errors).
    fn name(&self) -> &str;

    async fn insert_portfolio(&self, portfolio: Portfolio) -> Result<(), CoreError>;

    /// Fails with `PortfolioNotFound` for unknown ids.
    async fn get_portfolio(&self, portfolio_id: Uuid) -> Result<Portfolio, CoreError>;

    /// Every portfolio owned by `owner`, oldest first.
    async fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>, CoreError>;

    /// Replace the stored portfolio record (rename, description).
    async fn update_portfolio(&self, portfolio: Portfolio) -> Result<(), CoreError>;

    /// Delete a portfolio only if its log is empty. The emptiness check and
    /// the removal are one atomic step: a concurrent append either lands
    /// first (and the delete fails with `Validation`) or fails with
    /// `PortfolioNotFound`.
    async fn delete_empty_portfolio(&self, portfolio_id: Uuid) -> Result<(), CoreError>;

    /// The full transaction log of a portfolio, in append order.
    async fn load_transactions(&self, portfolio_id: Uuid) -> Result<Vec<Transaction>, CoreError>;

    /// Durably append a batch. Either every record is stored or none is.
    async fn append_transactions(
        &self,
        portfolio_id: Uuid,
        transactions: Vec<Transaction>,
    ) -> Result<(), CoreError>;

    /// Remove one record and return it.
    async fn remove_transaction(
        &self,
        portfolio_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, CoreError>;

    async fn set_notes(
        &self,
        portfolio_id: Uuid,
        transaction_id: Uuid,
        notes: Option<String>,
    ) -> Result<(), CoreError>;
}
