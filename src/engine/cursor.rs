//! Scoped ownership of table file handles and search cursors

use crate::traits::{IsamEngine, Login};
use crate::types::{DbHandle, EngineResult, SearchHandle};

/// An open table file, closed on drop.
///
/// The legacy engine pairs every open with a close and has no cleanup of
/// its own; owning the handle in a droppable type guarantees the close on
/// every exit path, including unwinding out of a failed load.
pub struct Database<'e> {
    engine: &'e dyn IsamEngine,
    handle: DbHandle,
    file_name: String,
}

impl<'e> Database<'e> {
    pub fn open(
        engine: &'e dyn IsamEngine,
        file_name: &str,
        login: &Login,
        read_only: bool,
    ) -> EngineResult<Self> {
        let handle = engine.open_database(file_name, login, read_only)?;
        Ok(Self {
            engine,
            handle,
            file_name: file_name.to_string(),
        })
    }

    pub fn handle(&self) -> DbHandle {
        self.handle
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub(crate) fn engine(&self) -> &'e dyn IsamEngine {
        self.engine
    }

    /// Create a search cursor over this table file. The cursor borrows the
    /// database, so it is always destroyed before the file closes.
    pub fn search(&self) -> EngineResult<Search<'_>> {
        let cursor = self.engine.create_search(self.handle)?;
        Ok(Search {
            engine: self.engine,
            cursor,
        })
    }
}

impl Drop for Database<'_> {
    fn drop(&mut self) {
        self.engine.close_database(self.handle);
    }
}

/// A search cursor, deleted on drop.
pub struct Search<'d> {
    engine: &'d dyn IsamEngine,
    cursor: SearchHandle,
}

impl Search<'_> {
    pub fn cursor(&self) -> SearchHandle {
        self.cursor
    }

    pub(crate) fn engine(&self) -> &dyn IsamEngine {
        self.engine
    }

    /// Select the named index. `false` yields an empty scan, not an error.
    pub fn set_active_key(&mut self, key_name: &str) -> bool {
        self.engine.set_active_key(self.cursor, key_name)
    }

    /// Bound the scan to `[low, high]`. With both bounds equal to an
    /// encoded prefix the scan covers exactly that prefix. `false` yields
    /// an empty scan, not an error.
    pub fn set_key_interval(&mut self, low: &str, high: &str) -> bool {
        self.engine.set_key_interval(self.cursor, low, high)
    }

    pub fn clear_key_interval(&mut self) {
        self.engine.clear_key_interval(self.cursor)
    }

    pub fn first(&mut self) -> bool {
        self.engine.search_first(self.cursor)
    }

    pub fn next(&mut self) -> bool {
        self.engine.search_next(self.cursor)
    }
}

impl Drop for Search<'_> {
    fn drop(&mut self) {
        self.engine.delete_search(self.cursor);
    }
}
