//! Legacy store layout: file names, logical table ids, field names
//!
//! The legacy store multiplexes several logical tables into two physical
//! files, discriminated by a leading table-id key field. Field widths are
//! never listed here; they come from the engine's schema metadata at open
//! time.

/// Master file: groups, ledger headers, and account records.
pub const MASTER_FILE: &str = "FINMAST";

/// Detail file: per-account snapshots and transaction lines.
pub const DETAIL_FILE: &str = "FINDETL";

/// Name of the composite index both files are searched through.
pub const PRIMARY_KEY: &str = "Primary";

// Logical tables in the master file.
pub const TABLE_ACCOUNT_GROUPS: i32 = 10;
pub const TABLE_BUDGET_GROUPS: i32 = 15;
pub const TABLE_LEDGERS: i32 = 20;
pub const TABLE_ACCOUNTS: i32 = 30;

// Logical tables in the detail file.
pub const TABLE_CREDIT_SNAPSHOTS: i32 = 40;
pub const TABLE_BUDGET_SNAPSHOTS: i32 = 50;
pub const TABLE_LINES: i32 = 60;

// Master file fields.
pub const F_TABLE: &str = "TableNo";
pub const F_LEDGER: &str = "LedgerNo";
pub const F_NUMBER: &str = "Number";
pub const F_ACCOUNT: &str = "AccountNo";
pub const F_KIND: &str = "Kind";
pub const F_NAME: &str = "Name";
pub const F_CATEGORY: &str = "Category";
pub const F_GROUP: &str = "GroupNo";
pub const F_DESCRIPTION: &str = "Description";
pub const F_NOTE: &str = "Note";
pub const F_LETTERHEAD: &str = "LetterheadNo";

// Detail file fields (shared key fields F_TABLE/F_LEDGER/F_ACCOUNT reused).
pub const F_YEAR: &str = "Year";
pub const F_MONTH: &str = "Month";
pub const F_CREDIT_LIMIT: &str = "CreditLimit";
pub const F_INCOME: &str = "Income";
pub const F_EXPENSE: &str = "Expense";
pub const F_DATE: &str = "Date";
pub const F_SEQ: &str = "SeqNo";
pub const F_VOUCHER: &str = "Voucher";
pub const F_TEXT: &str = "Text";
pub const F_DEBIT: &str = "Debit";
pub const F_CREDIT: &str = "Credit";
pub const F_BUDGET_ACCOUNT: &str = "BudgetAccountNo";
pub const F_ADDRESS: &str = "AddressNo";
