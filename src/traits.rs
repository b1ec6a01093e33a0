//! Traits for the legacy engine seam and cross-domain collaborators

use crate::ledger::{Address, Letterhead};
use crate::types::*;

/// Credentials presented when opening a table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub username: String,
    pub password: String,
}

/// Raw, handle-based access to the legacy ISAM engine.
///
/// This trait mirrors the blocking call surface of the legacy store: named
/// table files opened with a login, search cursors created per scan, and
/// key-interval bounded iteration in ascending key order. The engine has no
/// automatic cleanup; every handle returned by [`open_database`] and every
/// cursor returned by [`create_search`] must be released by the caller. The
/// owned wrappers in [`crate::engine`] enforce that discipline; code above
/// the wrappers never touches raw handles.
///
/// Key intervals compare the upper bound over its own length only, so an
/// interval whose bounds both equal an encoded key prefix selects exactly
/// the rows whose key starts with that prefix.
///
/// [`open_database`]: IsamEngine::open_database
/// [`create_search`]: IsamEngine::create_search
pub trait IsamEngine: Send + Sync {
    /// Open a named table file. The handle stays valid until
    /// [`close_database`](IsamEngine::close_database).
    fn open_database(
        &self,
        file_name: &str,
        login: &Login,
        read_only: bool,
    ) -> EngineResult<DbHandle>;

    /// Close an open table file. Closing a stale handle is a no-op.
    fn close_database(&self, handle: DbHandle);

    /// Create a search cursor over an open table file.
    fn create_search(&self, handle: DbHandle) -> EngineResult<SearchHandle>;

    /// Destroy a search cursor. Destroying a stale cursor is a no-op.
    fn delete_search(&self, cursor: SearchHandle);

    /// Select the named index as the cursor's active key. Returns `false`
    /// when the key does not exist; that is an empty result set, not an
    /// error.
    fn set_active_key(&self, cursor: SearchHandle, key_name: &str) -> bool;

    /// Bound the cursor to keys in `[low, high]` (upper bound compared over
    /// its own length). Returns `false` when the interval cannot be set.
    fn set_key_interval(&self, cursor: SearchHandle, low: &str, high: &str) -> bool;

    /// Remove a previously set key interval.
    fn clear_key_interval(&self, cursor: SearchHandle);

    /// Position on the first row within the interval. `false` means no
    /// matching rows.
    fn search_first(&self, cursor: SearchHandle) -> bool;

    /// Advance to the next row within the interval. `false` means the scan
    /// is exhausted.
    fn search_next(&self, cursor: SearchHandle) -> bool;

    /// Schema introspection: field number for a field name.
    fn field_number(&self, handle: DbHandle, field_name: &str) -> EngineResult<usize>;

    /// Schema introspection: declared width of a field. Key encodings are
    /// sized from this, never from constants.
    fn field_length(&self, handle: DbHandle, field_no: usize) -> EngineResult<usize>;

    /// Read one cell from the positioned row. `None` is a missing/null
    /// cell; whether that is significant is the caller's decision.
    fn get_cell(&self, cursor: SearchHandle, field_no: usize) -> EngineResult<Option<Cell>>;

    /// Stage one cell into the positioned row. Takes effect on
    /// [`commit_row`](IsamEngine::commit_row).
    fn put_cell(&self, cursor: SearchHandle, field_no: usize, cell: Cell) -> EngineResult<()>;

    /// Apply all staged cells to the positioned row.
    fn commit_row(&self, cursor: SearchHandle) -> EngineResult<()>;
}

/// Cross-domain lookup used to resolve transaction line address
/// back-references by opaque id.
pub trait AddressResolver: Send + Sync {
    fn address(&self, number: i32) -> RepositoryResult<Option<Address>>;
}

/// Supplier of letterhead reference rows, keyed to the legacy source file
/// they come from so cache invalidation can be scoped by file name.
pub trait LetterheadProvider: Send + Sync {
    /// Legacy file name the rows originate from.
    fn source_file(&self) -> &str;

    /// Load all letterheads. Called at most once per cache fill.
    fn letterheads(&self) -> RepositoryResult<Vec<Letterhead>>;
}
