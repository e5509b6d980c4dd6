pub mod aggregate;
pub mod history;
pub mod lot;
pub mod market;
pub mod portfolio;
pub mod sell;
pub mod settings;
pub mod stock;
pub mod transaction;
pub mod valuation;
