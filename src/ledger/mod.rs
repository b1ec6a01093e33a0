//! Ledger domain model and point-in-time balance calculation

pub mod account;
pub mod balance;
pub mod core;
pub mod transaction;

pub use account::{
    Account, AccountGroup, BudgetAccount, BudgetAccountGroup, BudgetSnapshot, CreditSnapshot,
};
pub use balance::SEQUENCE_UNBOUNDED;
pub use core::{Ledger, LedgerEntry, Letterhead};
pub use transaction::{Address, LazyAddress, TransactionLine};
