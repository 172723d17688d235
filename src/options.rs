//! Per-filesystem configuration.
//!
//! A [`FileSystemOptions`] is a sorted bag of opaque values keyed by
//! (filesystem kind, option name). Bags order and compare structurally:
//! entry count first, then the sorted key list, then a deep hash of the
//! values. That is exactly what is needed to build a deterministic
//! filesystem cache key, and nothing more.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde_json::Value;

// =============================================================================
// FileSystemOptions
// =============================================================================

/// Key of one option: the filesystem kind it applies to plus the option
/// name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct OptionKey {
    kind: String,
    name: String,
}

/// Configuration options for one filesystem instance.
///
/// Every filesystem kind can define its own options; all file objects
/// resolved through a filesystem see the same bag. Two bags with
/// different sizes are never equal; otherwise comparison runs over the
/// sorted keys and a structural hash of the values, independent of
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct FileSystemOptions {
    options: BTreeMap<OptionKey, Value>,
}

impl FileSystemOptions {
    /// Create an empty option bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option for a filesystem kind.
    pub fn set(&mut self, kind: impl Into<String>, name: impl Into<String>, value: impl Into<Value>) {
        self.options.insert(
            OptionKey {
                kind: kind.into(),
                name: name.into(),
            },
            value.into(),
        );
    }

    /// Look up an option.
    pub fn get(&self, kind: &str, name: &str) -> Option<&Value> {
        self.options.get(&OptionKey {
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }

    /// Whether an option is present.
    pub fn has(&self, kind: &str, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    /// Number of options in the bag.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Deterministic deep hash of the values, in key order.
    ///
    /// Values hash by their canonical serialized form; the only
    /// requirement here is a stable, structural order for cache keys.
    fn value_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (key, value) in &self.options {
            key.hash(&mut hasher);
            value.to_string().hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl Ord for FileSystemOptions {
    fn cmp(&self, other: &Self) -> Ordering {
        self.options
            .len()
            .cmp(&other.options.len())
            .then_with(|| self.options.keys().cmp(other.options.keys()))
            .then_with(|| self.value_hash().cmp(&other.value_hash()))
    }
}

impl PartialOrd for FileSystemOptions {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FileSystemOptions {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FileSystemOptions {}

impl Hash for FileSystemOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.options.len().hash(state);
        self.value_hash().hash(state);
    }
}

// =============================================================================
// FileSystemKey
// =============================================================================

/// Identity of one filesystem instance for caching purposes: its root URI
/// plus its option bag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileSystemKey {
    root_uri: String,
    options: FileSystemOptions,
}

impl FileSystemKey {
    /// Create a key from a root URI and options.
    pub fn new(root_uri: impl Into<String>, options: FileSystemOptions) -> Self {
        Self {
            root_uri: root_uri.into(),
            options,
        }
    }

    /// The root URI part of the key.
    pub fn root_uri(&self) -> &str {
        &self.root_uri
    }

    /// The option bag part of the key.
    pub fn options(&self) -> &FileSystemOptions {
        &self.options
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_has() {
        let mut options = FileSystemOptions::new();
        options.set("ftp", "passive", true);
        assert_eq!(options.get("ftp", "passive"), Some(&Value::Bool(true)));
        assert!(options.has("ftp", "passive"));
        assert!(!options.has("ftp", "timeout"));
        assert!(!options.has("sftp", "passive"));
    }

    #[test]
    fn test_different_sizes_never_equal() {
        let mut a = FileSystemOptions::new();
        a.set("mem", "x", 1);
        let mut b = FileSystemOptions::new();
        b.set("mem", "x", 1);
        b.set("mem", "y", 2);
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let mut a = FileSystemOptions::new();
        a.set("mem", "x", 1);
        a.set("mem", "y", 2);
        let mut b = FileSystemOptions::new();
        b.set("mem", "y", 2);
        b.set("mem", "x", 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_keys_different_value_unequal() {
        let mut a = FileSystemOptions::new();
        a.set("mem", "x", 1);
        let mut b = FileSystemOptions::new();
        b.set("mem", "x", 2);
        assert_ne!(a, b);
        // The order between them is the value-hash order, but it is total.
        assert!(a.cmp(&b) != Ordering::Equal);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut a = FileSystemOptions::new();
        a.set("mem", "x", 1);
        let b = a.clone();
        a.set("mem", "y", 2);
        assert_eq!(b.len(), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_filesystem_key() {
        let mut options = FileSystemOptions::new();
        options.set("mem", "case-sensitive", true);
        let a = FileSystemKey::new("mem:///", options.clone());
        let b = FileSystemKey::new("mem:///", options);
        let c = FileSystemKey::new("mem:///", FileSystemOptions::new());
        assert_eq!(a, b);
        assert_ne!(a, c);

        let d = FileSystemKey::new("other:///", FileSystemOptions::new());
        assert_ne!(c, d);
    }
}
