//! Ledger repository over the legacy store

pub mod loader;
pub mod tables;

pub use loader::{CalculationMode, LedgerRepository, LoadOptions};
