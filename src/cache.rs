//! In-process cache for rarely changing reference data

use std::sync::{Arc, Mutex};

use tracing::debug;

/// One cached reference collection, keyed to the legacy source file it was
/// populated from.
///
/// Every read, fill, and invalidation runs under the same mutex; a fill is
/// published while the lock is held, so readers never observe a partial
/// collection. Invalidation is scoped by file name: a change notification
/// for an unrelated file is a no-op, not an error.
pub struct ReferenceCache<T> {
    source_file: String,
    slot: Mutex<Option<Arc<Vec<T>>>>,
}

impl<T> ReferenceCache<T> {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            slot: Mutex::new(None),
        }
    }

    /// Legacy file name this cache is scoped to.
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// Serve the cached collection, filling it through `load` on first
    /// use. `load` runs under the cache lock.
    pub fn get_or_load<E>(
        &self,
        load: impl FnOnce() -> Result<Vec<T>, E>,
    ) -> Result<Arc<Vec<T>>, E> {
        let mut slot = self.slot.lock().unwrap();
        if let Some(cached) = slot.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let filled = Arc::new(load()?);
        *slot = Some(Arc::clone(&filled));
        Ok(filled)
    }

    /// Drop the cached collection when `file_name` matches the source
    /// file. Returns whether anything was cleared.
    pub fn invalidate(&self, file_name: &str) -> bool {
        if file_name != self.source_file {
            return false;
        }
        let cleared = self.slot.lock().unwrap().take().is_some();
        if cleared {
            debug!(file = %self.source_file, "reference cache invalidated");
        }
        cleared
    }

    /// Drop the cached collection unconditionally.
    pub fn clear(&self) {
        self.slot.lock().unwrap().take();
    }

    pub fn is_cached(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }
}
