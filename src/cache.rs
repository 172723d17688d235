//! The shared file-object cache.
//!
//! Maps (filesystem identity, canonical name) to the single live handle
//! for that resource. The cache is the owner of handle lifetime: handles
//! hold names, not references, for their neighbors, and re-resolve
//! through here. One cache instance is typically shared by every
//! filesystem of a repository and injected at construction.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use std::sync::Arc;

use crate::file::FileObject;
use crate::name::FileName;
use crate::options::FileSystemKey;

/// Cache of live [`FileObject`] handles, keyed by filesystem identity and
/// canonical name.
///
/// At most one handle per (identity, name) pair is ever returned to
/// callers; `put` with `overwrite` replaces rather than merges.
#[derive(Default)]
pub struct FilesCache {
    entries: Mutex<FxHashMap<FileSystemKey, FxHashMap<FileName, Arc<FileObject>>>>,
}

impl FilesCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle under its filesystem identity and name.
    ///
    /// Returns `false` (and keeps the existing entry) when the slot is
    /// occupied and `overwrite` is not set.
    pub fn put(&self, file: &Arc<FileObject>, overwrite: bool) -> bool {
        let key = file.filesystem().cache_key().clone();
        let mut entries = self.entries.lock();
        let files = entries.entry(key).or_default();
        if !overwrite && files.contains_key(file.name()) {
            return false;
        }
        files.insert(file.name().clone(), Arc::clone(file));
        true
    }

    /// Look up the live handle for a name.
    pub fn get(&self, key: &FileSystemKey, name: &FileName) -> Option<Arc<FileObject>> {
        self.entries
            .lock()
            .get(key)
            .and_then(|files| files.get(name))
            .cloned()
    }

    /// Remove one handle.
    pub fn remove(&self, key: &FileSystemKey, name: &FileName) {
        let mut entries = self.entries.lock();
        if let Some(files) = entries.get_mut(key) {
            files.remove(name);
            if files.is_empty() {
                entries.remove(key);
            }
        }
    }

    /// Drop every handle of one filesystem.
    pub fn clear(&self, key: &FileSystemKey) {
        self.entries.lock().remove(key);
    }

    /// Drop every handle of every filesystem.
    pub fn close(&self) {
        self.entries.lock().clear();
    }

    /// Number of live handles cached for one filesystem.
    pub fn len(&self, key: &FileSystemKey) -> usize {
        self.entries.lock().get(key).map_or(0, FxHashMap::len)
    }

    /// Whether the cache holds no handles at all.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
