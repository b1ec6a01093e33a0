//! Core types and errors shared across the repository

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category tag carried by account groups.
///
/// The legacy store encodes this as a numeric code; an unknown code is a
/// fatal load error, never a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountCategory {
    /// Assets - what the business owns
    Assets,
    /// Liabilities - what the business owes
    Liabilities,
}

impl AccountCategory {
    /// Maps the legacy category code (1 = assets, 2 = liabilities).
    pub fn from_code(code: i32) -> RepositoryResult<Self> {
        match code {
            1 => Ok(AccountCategory::Assets),
            2 => Ok(AccountCategory::Liabilities),
            other => Err(RepositoryError::UnhandledCode {
                what: "account group category".to_string(),
                code: other,
            }),
        }
    }
}

/// Discriminator for rows in the legacy account table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    /// A posting account with credit snapshots
    Account,
    /// A budget account with budget snapshots
    BudgetAccount,
}

impl AccountKind {
    /// Maps the legacy kind code (1 = account, 2 = budget account).
    pub fn from_code(code: i32) -> RepositoryResult<Self> {
        match code {
            1 => Ok(AccountKind::Account),
            2 => Ok(AccountKind::BudgetAccount),
            other => Err(RepositoryError::UnhandledCode {
                what: "account kind".to_string(),
                code: other,
            }),
        }
    }
}

/// Opaque handle to an open table file in the legacy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DbHandle(pub u32);

/// Opaque handle to a search cursor created on an open table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchHandle(pub u32);

/// A single typed cell read from (or staged into) a positioned row.
///
/// The legacy engine stores fixed-width fields; this is the typed view the
/// field accessor coerces from and to. A missing cell is `None` at the
/// engine boundary, not a `Cell` variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Decimal(BigDecimal),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    /// Short type label used in decode error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Int(_) => "int",
            Cell::Decimal(_) => "decimal",
            Cell::Text(_) => "text",
            Cell::Date(_) => "date",
        }
    }
}

/// Errors raised by the legacy engine itself.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("table file '{0}' could not be opened")]
    OpenFailed(String),
    #[error("login rejected for table file '{0}'")]
    LoginRejected(String),
    #[error("table file '{0}' is open read-only")]
    ReadOnly(String),
    #[error("stale or unknown handle")]
    InvalidHandle,
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("cursor is not positioned on a row")]
    NotPositioned,
}

/// Errors that can occur in the repository
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("cannot find unique record: {entity} '{id}' ({context})")]
    UnresolvedReference {
        entity: &'static str,
        id: String,
        context: String,
    },
    #[error("unhandled {what} code: {code}")]
    UnhandledCode { what: String, code: i32 },
    #[error("missing mandatory field '{field}' on {record}")]
    MissingField { field: &'static str, record: String },
    #[error("cannot decode field '{field}': {detail}")]
    Decode { field: String, detail: String },
    #[error("legacy engine error")]
    Engine(#[from] EngineError),
}

impl RepositoryError {
    /// Shorthand for the fatal lookup failure on a row that was expected
    /// to exist.
    pub fn unresolved(
        entity: &'static str,
        id: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        RepositoryError::UnresolvedReference {
            entity,
            id: id.to_string(),
            context: context.into(),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_codes_map() {
        assert_eq!(AccountCategory::from_code(1).unwrap(), AccountCategory::Assets);
        assert_eq!(
            AccountCategory::from_code(2).unwrap(),
            AccountCategory::Liabilities
        );
    }

    #[test]
    fn unknown_category_code_is_fatal() {
        let err = AccountCategory::from_code(7).unwrap_err();
        match err {
            RepositoryError::UnhandledCode { code, .. } => assert_eq!(code, 7),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_code_is_fatal() {
        assert!(matches!(
            AccountKind::from_code(0),
            Err(RepositoryError::UnhandledCode { .. })
        ));
    }

    #[test]
    fn unresolved_reference_carries_context() {
        let err = RepositoryError::unresolved("account group", 42, "ledger 1");
        assert_eq!(
            err.to_string(),
            "cannot find unique record: account group '42' (ledger 1)"
        );
    }
}
