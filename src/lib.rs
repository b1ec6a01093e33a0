//! # Bookkeeping Core
//!
//! Reconstructs accounting ledgers from a legacy indexed-sequential
//! (ISAM-style) store and computes point-in-time account balances.
//!
//! ## Features
//!
//! - **Key-interval traversal**: every scan is bounded by an exact
//!   composite-key prefix, keeping I/O proportional to the requested
//!   ledger
//! - **Cascading loads**: group dictionaries, accounts and budget
//!   accounts, then per-account snapshots and transaction lines, with
//!   fatal errors on any unresolved reference
//! - **As-of balances**: deterministic `calculate(date, sequence)` with
//!   same-date lines tie-broken by sequence number; balances are derived,
//!   never persisted
//! - **Scoped resources**: table handles and search cursors release on
//!   every exit path
//! - **Reference caches**: groups and letterheads cached in process,
//!   invalidated by legacy source file name
//! - **Engine abstraction**: the legacy store sits behind a trait, with
//!   an in-memory implementation for tests and development
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use bookkeeping_core::utils::{FixtureBuilder, LineRow, StaticAddresses, StaticLetterheads};
//! use bookkeeping_core::{LedgerRepository, LoadOptions, RepositoryConfig};
//! use chrono::NaiveDate;
//!
//! let engine = Arc::new(
//!     FixtureBuilder::new()
//!         .account_group(1, "Current assets", 1)
//!         .ledger(1, "Household books", 0)
//!         .account(1, "1000", "Cash", 1)
//!         .line(LineRow::new(
//!             1, "1000", 1,
//!             NaiveDate::from_ymd_opt(2011, 3, 1).unwrap(),
//!             "Opening balance", 1000, 0,
//!         ))
//!         .build(),
//! );
//! let data_dir = std::env::temp_dir();
//! let repository = LedgerRepository::new(
//!     RepositoryConfig::new(data_dir, "clerk", "secret"),
//!     engine,
//!     Arc::new(StaticAddresses::new(Vec::new())),
//!     Arc::new(StaticLetterheads::new("LETTERHD", Vec::new())),
//! ).unwrap();
//!
//! let mut ledger = repository.load_ledger(1, &LoadOptions::default()).unwrap();
//! ledger.calculate_at(NaiveDate::from_ymd_opt(2011, 3, 31).unwrap());
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod keys;
pub mod ledger;
pub mod repository;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use cache::ReferenceCache;
pub use config::RepositoryConfig;
pub use keys::KeyBuilder;
pub use ledger::*;
pub use repository::{CalculationMode, LedgerRepository, LoadOptions};
pub use traits::*;
pub use types::*;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with sensible defaults; safe to call more
/// than once.
pub fn init() {
    INIT_TRACING.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter =
            EnvFilter::from_default_env().add_directive("bookkeeping_core=info".parse().unwrap());

        fmt().with_env_filter(filter).init();
    });
}
