use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account-scoped container of transactions.
///
/// All valuation output for the portfolio is expressed in `home_currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Unique identifier
    pub id: Uuid,

    /// Owning user
    pub owner: String,

    /// Display name
    pub name: String,

    /// Optional free-text description
    #[serde(default)]
    pub description: Option<String>,

    /// Reporting currency, uppercased ISO code (e.g., "CZK")
    pub home_currency: String,

    pub created_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        home_currency: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: name.into(),
            description: None,
            home_currency: home_currency.into().trim().to_uppercase(),
            created_at: Utc::now(),
        }
    }
}
