use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::portfolio::Portfolio;
use crate::models::transaction::Transaction;

use super::traits::LedgerStore;

#[derive(Debug, Clone)]
struct PortfolioEntry {
    portfolio: Portfolio,
    transactions: Vec<Transaction>,
}

/// Process-local store. Everything is lost when it is dropped.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    entries: RwLock<HashMap<Uuid, PortfolioEntry>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    fn name(&self) -> &str {
        "InMemoryLedgerStore"
    }

    async fn insert_portfolio(&self, portfolio: Portfolio) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&portfolio.id) {
            return Err(CoreError::Validation(format!(
                "Portfolio {} already exists",
                portfolio.id
            )));
        }
        entries.insert(
            portfolio.id,
            PortfolioEntry {
                portfolio,
                transactions: Vec::new(),
            },
        );
        Ok(())
    }

    async fn get_portfolio(&self, portfolio_id: Uuid) -> Result<Portfolio, CoreError> {
        self.entries
            .read()
            .await
            .get(&portfolio_id)
            .map(|entry| entry.portfolio.clone())
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))
    }

    async fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>, CoreError> {
        let mut portfolios: Vec<Portfolio> = self
            .entries
            .read()
            .await
            .values()
            .filter(|entry| entry.portfolio.owner == owner)
            .map(|entry| entry.portfolio.clone())
            .collect();
        portfolios.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(portfolios)
    }

    async fn update_portfolio(&self, portfolio: Portfolio) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&portfolio.id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio.id.to_string()))?;
        entry.portfolio = portfolio;
        Ok(())
    }

    async fn delete_empty_portfolio(&self, portfolio_id: Uuid) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get(&portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;
        if !entry.transactions.is_empty() {
            return Err(CoreError::Validation(format!(
                "Cannot delete portfolio {portfolio_id}: it still has {} transaction(s)",
                entry.transactions.len()
            )));
        }
        entries.remove(&portfolio_id);
        Ok(())
    }

    async fn load_transactions(&self, portfolio_id: Uuid) -> Result<Vec<Transaction>, CoreError> {
        self.entries
            .read()
            .await
            .get(&portfolio_id)
            .map(|entry| entry.transactions.clone())
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))
    }

    async fn append_transactions(
        &self,
        portfolio_id: Uuid,
        transactions: Vec<Transaction>,
    ) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;
        if let Some(foreign) = transactions.iter().find(|t| t.portfolio_id != portfolio_id) {
            return Err(CoreError::Validation(format!(
                "Transaction {} belongs to portfolio {}, not {portfolio_id}",
                foreign.id, foreign.portfolio_id
            )));
        }
        entry.transactions.extend(transactions);
        Ok(())
    }

    async fn remove_transaction(
        &self,
        portfolio_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, CoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;
        let idx = entry
            .transactions
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        Ok(entry.transactions.remove(idx))
    }

    async fn set_notes(
        &self,
        portfolio_id: Uuid,
        transaction_id: Uuid,
        notes: Option<String>,
    ) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;
        let transaction = entry
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        transaction.notes = notes;
        Ok(())
    }
}
