//! In-memory backing store.
//!
//! A complete [`FileProvider`] over a shared map of path → entry,
//! supporting the full capability set. It backs the crate's own tests and
//! serves as the reference for writing real providers; nothing in the
//! core treats it specially.

use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::VfsResult;
use crate::name::{FileName, FileType};
use crate::provider::{
    CapabilitySet, FileProvider, ProviderNode, RandomAccessMode, RandomAccessor,
};

// =============================================================================
// Store
// =============================================================================

#[derive(Clone)]
struct Entry {
    kind: FileType,
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

impl Entry {
    fn folder() -> Self {
        Self {
            kind: FileType::Folder,
            data: Vec::new(),
            modified: Utc::now(),
        }
    }

    fn file() -> Self {
        Self {
            kind: FileType::File,
            data: Vec::new(),
            modified: Utc::now(),
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    entries: Mutex<FxHashMap<String, Entry>>,
}

impl MemoryStore {
    /// Direct children of `path`, sorted by base name.
    fn children_of(&self, path: &str) -> Vec<String> {
        let prefix_len = if path == "/" { 1 } else { path.len() + 1 };
        let entries = self.entries.lock();
        let mut children: Vec<String> = entries
            .keys()
            .filter(|key| key.len() > prefix_len && is_direct_child(key.as_str(), path))
            .map(|key| key[prefix_len..].to_string())
            .collect();
        children.sort();
        children
    }
}

fn is_direct_child(key: &str, parent: &str) -> bool {
    let rest = if parent == "/" {
        match key.strip_prefix('/') {
            Some(rest) => rest,
            None => return false,
        }
    } else {
        match key.strip_prefix(parent).and_then(|r| r.strip_prefix('/')) {
            Some(rest) => rest,
            None => return false,
        }
    };
    !rest.is_empty() && !rest.contains('/')
}

// =============================================================================
// MemoryProvider
// =============================================================================

/// Backing-store provider keeping everything in memory.
///
/// Created with the full [`CapabilitySet`] by default;
/// [`MemoryProvider::with_capabilities`] restricts it, which is how the
/// tests exercise capability gating.
pub struct MemoryProvider {
    scheme: String,
    capabilities: CapabilitySet,
    store: Arc<MemoryStore>,
}

impl MemoryProvider {
    /// Create an empty store for `scheme`, with every capability.
    pub fn new(scheme: impl Into<String>) -> Self {
        Self::with_capabilities(scheme, CapabilitySet::all())
    }

    /// Create an empty store advertising only `capabilities`.
    pub fn with_capabilities(scheme: impl Into<String>, capabilities: CapabilitySet) -> Self {
        let store = MemoryStore::default();
        store
            .entries
            .lock()
            .insert("/".to_string(), Entry::folder());
        Self {
            scheme: scheme.into(),
            capabilities,
            store: Arc::new(store),
        }
    }
}

impl FileProvider for MemoryProvider {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn create_node(&self, name: &FileName) -> VfsResult<Arc<dyn ProviderNode>> {
        Ok(Arc::new(MemoryNode {
            path: name.path().to_string(),
            store: Arc::clone(&self.store),
        }))
    }
}

// =============================================================================
// MemoryNode
// =============================================================================

struct MemoryNode {
    path: String,
    store: Arc<MemoryStore>,
}

impl MemoryNode {
    fn with_entry<T>(&self, f: impl FnOnce(&Entry) -> T) -> io::Result<T> {
        let entries = self.store.entries.lock();
        entries
            .get(&self.path)
            .map(f)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, self.path.clone()))
    }
}

impl ProviderNode for MemoryNode {
    fn kind(&self) -> io::Result<FileType> {
        let entries = self.store.entries.lock();
        Ok(entries
            .get(&self.path)
            .map_or(FileType::Imaginary, |entry| entry.kind))
    }

    fn list_children(&self) -> io::Result<Option<Vec<String>>> {
        let kind = self.kind()?;
        if kind != FileType::Folder {
            return Ok(None);
        }
        Ok(Some(self.store.children_of(&self.path)))
    }

    fn create_folder(&self) -> io::Result<()> {
        self.store
            .entries
            .lock()
            .insert(self.path.clone(), Entry::folder());
        Ok(())
    }

    fn delete(&self) -> io::Result<()> {
        self.store.entries.lock().remove(&self.path);
        Ok(())
    }

    fn rename_to(&self, target: &FileName) -> io::Result<()> {
        let target_path = target.path().to_string();
        let mut entries = self.store.entries.lock();
        let prefix = format!("{}/", self.path);
        let moved: Vec<String> = entries
            .keys()
            .filter(|key| **key == self.path || key.starts_with(&prefix))
            .cloned()
            .collect();
        if moved.is_empty() {
            return Err(io::Error::new(io::ErrorKind::NotFound, self.path.clone()));
        }
        for key in moved {
            if let Some(entry) = entries.remove(&key) {
                let new_key = format!("{}{}", target_path, &key[self.path.len()..]);
                entries.insert(new_key, entry);
            }
        }
        Ok(())
    }

    fn content_size(&self) -> io::Result<u64> {
        self.with_entry(|entry| entry.data.len() as u64)
    }

    fn open_input(&self) -> io::Result<Box<dyn Read + Send>> {
        let data = self.with_entry(|entry| entry.data.clone())?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn open_output(&self, append: bool) -> io::Result<Box<dyn Write + Send>> {
        let mut entries = self.store.entries.lock();
        let entry = entries.entry(self.path.clone()).or_insert_with(Entry::file);
        if entry.kind == FileType::Folder {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot write folder content",
            ));
        }
        if !append {
            entry.data.clear();
        }
        drop(entries);
        Ok(Box::new(MemoryWriter {
            path: self.path.clone(),
            store: Arc::clone(&self.store),
        }))
    }

    fn open_random(&self, mode: RandomAccessMode) -> io::Result<Box<dyn RandomAccessor>> {
        // Validate existence up front.
        self.with_entry(|_| ())?;
        Ok(Box::new(MemoryRandomAccessor {
            path: self.path.clone(),
            store: Arc::clone(&self.store),
            mode,
            position: 0,
        }))
    }

    fn last_modified(&self) -> io::Result<DateTime<Utc>> {
        self.with_entry(|entry| entry.modified)
    }

    fn set_last_modified(&self, when: DateTime<Utc>) -> io::Result<()> {
        let mut entries = self.store.entries.lock();
        match entries.get_mut(&self.path) {
            Some(entry) => {
                entry.modified = when;
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, self.path.clone())),
        }
    }
}

// =============================================================================
// Streams
// =============================================================================

/// Writes through to the store; each chunk lands under the lock, the
/// modification time updates when the writer drops.
struct MemoryWriter {
    path: String,
    store: Arc<MemoryStore>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut entries = self.store.entries.lock();
        match entries.get_mut(&self.path) {
            Some(entry) => {
                entry.data.extend_from_slice(buf);
                Ok(buf.len())
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, self.path.clone())),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let mut entries = self.store.entries.lock();
        if let Some(entry) = entries.get_mut(&self.path) {
            entry.modified = Utc::now();
        }
    }
}

struct MemoryRandomAccessor {
    path: String,
    store: Arc<MemoryStore>,
    mode: RandomAccessMode,
    position: u64,
}

impl Read for MemoryRandomAccessor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let entries = self.store.entries.lock();
        let entry = entries
            .get(&self.path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, self.path.clone()))?;
        let start = (self.position as usize).min(entry.data.len());
        let count = buf.len().min(entry.data.len() - start);
        buf[..count].copy_from_slice(&entry.data[start..start + count]);
        drop(entries);
        self.position += count as u64;
        Ok(count)
    }
}

impl Write for MemoryRandomAccessor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.mode.requires_write() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "random accessor opened read-only",
            ));
        }
        let mut entries = self.store.entries.lock();
        let entry = entries
            .get_mut(&self.path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, self.path.clone()))?;
        let start = self.position as usize;
        if entry.data.len() < start + buf.len() {
            entry.data.resize(start + buf.len(), 0);
        }
        entry.data[start..start + buf.len()].copy_from_slice(buf);
        drop(entries);
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RandomAccessor for MemoryRandomAccessor {
    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.position = pos;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn len(&self) -> io::Result<u64> {
        let entries = self.store.entries.lock();
        entries
            .get(&self.path)
            .map(|entry| entry.data.len() as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, self.path.clone()))
    }

    fn set_len(&mut self, new_len: u64) -> io::Result<()> {
        if !self.mode.requires_write() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "random accessor opened read-only",
            ));
        }
        let mut entries = self.store.entries.lock();
        let entry = entries
            .get_mut(&self.path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, self.path.clone()))?;
        entry.data.resize(new_len as usize, 0);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileSystemBuilder;

    use std::io::Write;

    fn memfs() -> Arc<crate::fs::FileSystem> {
        FileSystemBuilder::new()
            .provider(Arc::new(MemoryProvider::new("mem")))
            .build()
    }

    #[test]
    fn test_end_to_end_create_write_read() {
        let fs = memfs();
        let file = fs.resolve("/docs/readme.md").unwrap();
        {
            let mut out = file.write_stream(false).unwrap();
            out.write_all(b"hello").unwrap();
        }
        assert!(file.is_file().unwrap());
        assert_eq!(file.content().unwrap().read_all().unwrap(), b"hello");
        assert!(fs.resolve("/docs").unwrap().is_folder().unwrap());
    }

    #[test]
    fn test_listing_is_sorted() {
        let fs = memfs();
        for name in ["/d/zebra", "/d/apple", "/d/mango"] {
            fs.resolve(name).unwrap().create(false).unwrap();
        }
        let names: Vec<String> = fs
            .resolve("/d")
            .unwrap()
            .children()
            .unwrap()
            .iter()
            .map(|child| child.name().base_name().to_string())
            .collect();
        assert_eq!(names, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = memfs();
        fs.resolve("/old/nested/f.txt").unwrap().create(false).unwrap();
        let src = fs.resolve("/old").unwrap();
        let dest = fs.resolve("/new").unwrap();
        src.move_to(&dest).unwrap();

        assert!(!src.exists().unwrap());
        assert!(fs.resolve("/new/nested/f.txt").unwrap().exists().unwrap());
    }

    #[test]
    fn test_delete_all_empties_store() {
        let fs = memfs();
        fs.resolve("/a/b/c").unwrap().create(false).unwrap();
        fs.resolve("/a/d").unwrap().create(false).unwrap();
        let a = fs.resolve("/a").unwrap();
        // Depth-first order: c, b, d, a.
        assert_eq!(a.delete_all().unwrap(), 4);
        assert!(!a.exists().unwrap());
        assert!(fs.root().unwrap().children().unwrap().is_empty());
    }

    #[test]
    fn test_root_always_exists() {
        let fs = memfs();
        let root = fs.root().unwrap();
        assert!(root.exists().unwrap());
        assert_eq!(root.file_type().unwrap(), FileType::Folder);
    }
}
