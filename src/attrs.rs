//! Attribute storage.
//!
//! Handles and filesystems carry arbitrary named attributes through an
//! [`AttributeStore`], an external collaborator injected at filesystem
//! construction. Values are opaque [`serde_json::Value`]s. An attribute
//! stored read-only rejects later writes.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{VfsError, VfsResult};
use crate::name::FileName;

// =============================================================================
// Well-known metadata keys
// =============================================================================

/// Well-known attribute keys.
///
/// Custom attributes may use any name not starting with a double
/// underscore.
pub mod meta {
    /// Content size in bytes.
    pub const FILE_SIZE: &str = "__FILE_SIZE";
    /// Content type (e.g. a MIME type), distinct from the file type.
    pub const CONTENT_TYPE: &str = "__FILE_CONTENT_TYPE";
    /// Last time the content was modified.
    pub const LAST_MODIFIED: &str = "__FILE_LAST_MODIFIED_CONTENT_TIME";
    /// Last time the resource was accessed.
    pub const LAST_ACCESS: &str = "__FILE_LAST_ACCESS_TIME";
    /// Privilege word for the owner.
    pub const OWNER_PRIVILEGES: &str = "__FILE_OWNER_PRIVILEGES";
    /// Privilege word for the owning group.
    pub const GROUP_PRIVILEGES: &str = "__FILE_GROUP_PRIVILEGES";
    /// Privilege word for everyone.
    pub const ANY_PRIVILEGES: &str = "__FILE_ANY_PRIVILEGES";
    /// Name of the owner.
    pub const OWNER: &str = "__FILE_OWNER";
    /// Name of the owning group.
    pub const GROUP: &str = "__FILE_GROUP";
}

/// Read bit of a privilege word.
pub const PRIVILEGE_READ: u64 = 0b100;
/// Write bit of a privilege word.
pub const PRIVILEGE_WRITE: u64 = 0b010;
/// Execute bit of a privilege word.
pub const PRIVILEGE_EXECUTE: u64 = 0b001;

/// Scope a privilege word applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeScope {
    /// The owner of the resource.
    Owner,
    /// The owning group.
    Group,
    /// Everyone.
    Any,
}

impl PrivilegeScope {
    /// The attribute key carrying this scope's privilege word.
    pub fn meta_key(self) -> &'static str {
        match self {
            Self::Owner => meta::OWNER_PRIVILEGES,
            Self::Group => meta::GROUP_PRIVILEGES,
            Self::Any => meta::ANY_PRIVILEGES,
        }
    }
}

// =============================================================================
// AttributeStore
// =============================================================================

/// Storage backend for per-resource attributes.
///
/// Keys are canonical names; a filesystem's own attributes are stored
/// under its root name.
pub trait AttributeStore: Send + Sync {
    /// Look up one attribute.
    fn get(&self, name: &FileName, attr: &str) -> Option<Value>;

    /// All attributes of a resource, in stable key order.
    fn get_all(&self, name: &FileName) -> BTreeMap<String, Value>;

    /// Store an attribute.
    ///
    /// Fails with [`VfsError::AttributeReadOnly`] when the attribute was
    /// previously stored with `read_only` set.
    fn set(&self, name: &FileName, attr: &str, value: Value, read_only: bool) -> VfsResult<()>;

    /// Remove one attribute, or every attribute of the resource when
    /// `attr` is empty.
    fn remove(&self, name: &FileName, attr: &str) -> VfsResult<()>;

    /// Whether an attribute is present.
    fn has(&self, name: &FileName, attr: &str) -> bool {
        self.get(name, attr).is_some()
    }
}

// =============================================================================
// MemoryAttributeStore
// =============================================================================

struct AttrEntry {
    value: Value,
    read_only: bool,
}

/// In-memory attribute store, the default when a filesystem is built
/// without an external one.
#[derive(Default)]
pub struct MemoryAttributeStore {
    entries: RwLock<FxHashMap<String, FxHashMap<String, AttrEntry>>>,
}

impl MemoryAttributeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttributeStore for MemoryAttributeStore {
    fn get(&self, name: &FileName, attr: &str) -> Option<Value> {
        self.entries
            .read()
            .get(name.uri())
            .and_then(|attrs| attrs.get(attr))
            .map(|entry| entry.value.clone())
    }

    fn get_all(&self, name: &FileName) -> BTreeMap<String, Value> {
        self.entries
            .read()
            .get(name.uri())
            .map(|attrs| {
                attrs
                    .iter()
                    .map(|(key, entry)| (key.clone(), entry.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set(&self, name: &FileName, attr: &str, value: Value, read_only: bool) -> VfsResult<()> {
        let mut entries = self.entries.write();
        let attrs = entries.entry(name.uri().to_string()).or_default();
        if let Some(existing) = attrs.get(attr) {
            if existing.read_only {
                return Err(VfsError::AttributeReadOnly {
                    uri: name.friendly_uri(),
                    attr: attr.to_string(),
                });
            }
        }
        attrs.insert(attr.to_string(), AttrEntry { value, read_only });
        Ok(())
    }

    fn remove(&self, name: &FileName, attr: &str) -> VfsResult<()> {
        let mut entries = self.entries.write();
        if attr.is_empty() {
            entries.remove(name.uri());
            return Ok(());
        }
        if let Some(attrs) = entries.get_mut(name.uri()) {
            attrs.remove(attr);
            if attrs.is_empty() {
                entries.remove(name.uri());
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
