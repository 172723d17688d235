//! Backing-store provider contracts.
//!
//! The core never talks to a concrete store directly. A [`FileProvider`]
//! supplies a [`ProviderNode`] per canonical name, the full set of
//! low-level primitives for that one resource, plus a [`CapabilitySet`]
//! the core consults before attempting any gated operation. Backing-store
//! behavior is reached through these interface-checked traits, never
//! through runtime type probing.

pub mod memory;

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::VfsResult;
use crate::name::{FileName, FileType};

// =============================================================================
// Capabilities
// =============================================================================

/// Fixed vocabulary of backing-store capabilities.
///
/// Operations check the corresponding flag before calling into the
/// provider; a disabled flag yields
/// [`VfsError::CapabilityUnsupported`](crate::error::VfsError::CapabilityUnsupported)
/// instead of an attempted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Capability {
    /// Content can be read.
    ReadContent,
    /// Content can be written.
    WriteContent,
    /// Content can be opened for appending.
    AppendContent,
    /// Content supports random-access reads.
    RandomAccessRead,
    /// Content supports random-access writes.
    RandomAccessWrite,
    /// Content length can be truncated or extended in place.
    RandomAccessSetLength,
    /// Folders can list their children.
    ListChildren,
    /// Resources can be created.
    Create,
    /// Resources can be deleted.
    Delete,
    /// Resources can be renamed within the filesystem.
    Rename,
    /// Last-modified times can be read.
    GetLastModified,
    /// Last-modified times can be written.
    SetLastModified,
    /// Arbitrary attributes are supported.
    Attributes,
    /// Link resources are supported.
    Links,
    /// Names have a globally unique URI form.
    Uri,
}

impl Capability {
    const ALL: [Capability; 15] = [
        Capability::ReadContent,
        Capability::WriteContent,
        Capability::AppendContent,
        Capability::RandomAccessRead,
        Capability::RandomAccessWrite,
        Capability::RandomAccessSetLength,
        Capability::ListChildren,
        Capability::Create,
        Capability::Delete,
        Capability::Rename,
        Capability::GetLastModified,
        Capability::SetLastModified,
        Capability::Attributes,
        Capability::Links,
        Capability::Uri,
    ];

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadContent => "read-content",
            Self::WriteContent => "write-content",
            Self::AppendContent => "append-content",
            Self::RandomAccessRead => "random-access-read",
            Self::RandomAccessWrite => "random-access-write",
            Self::RandomAccessSetLength => "random-access-set-length",
            Self::ListChildren => "list-children",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::GetLastModified => "get-last-modified",
            Self::SetLastModified => "set-last-modified",
            Self::Attributes => "attributes",
            Self::Links => "links",
            Self::Uri => "uri",
        };
        f.write_str(name)
    }
}

/// Set of capabilities a backing store supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    bits: u32,
}

impl CapabilitySet {
    /// The empty set.
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    /// The set containing every capability.
    pub fn all() -> Self {
        Capability::ALL
            .iter()
            .fold(Self::new(), |set, &cap| set.with(cap))
    }

    /// Add a capability.
    pub fn with(mut self, capability: Capability) -> Self {
        self.bits |= capability.bit();
        self
    }

    /// Remove a capability.
    pub fn without(mut self, capability: Capability) -> Self {
        self.bits &= !capability.bit();
        self
    }

    /// Whether the set contains `capability`.
    pub fn supports(&self, capability: Capability) -> bool {
        self.bits & capability.bit() != 0
    }
}

// =============================================================================
// Random access
// =============================================================================

/// Mode for random-access content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomAccessMode {
    /// Read-only random access.
    Read,
    /// Read-write random access.
    ReadWrite,
}

impl RandomAccessMode {
    /// Whether this mode requires write support.
    pub fn requires_write(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// Random-access view over a resource's content.
///
/// Reads and writes go through the inherited [`Read`] and [`Write`]
/// implementations at the current position.
pub trait RandomAccessor: Read + Write + Send {
    /// Move the position to `pos` bytes from the start.
    fn seek_to(&mut self, pos: u64) -> io::Result<()>;

    /// The current position.
    fn position(&self) -> u64;

    /// The current content length.
    fn len(&self) -> io::Result<u64>;

    /// Whether the content is empty.
    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Truncate or extend the content to `new_len` bytes.
    fn set_len(&mut self, new_len: u64) -> io::Result<()>;
}

// =============================================================================
// ProviderNode
// =============================================================================

/// The low-level primitives for one resource in a backing store.
///
/// One node is created per resolved name and owned (shared) by the
/// resource handle. Primitives return plain [`io::Result`]s; the core
/// wraps failures into typed errors with the operation name and the name
/// context attached. Optional primitives default to
/// [`io::ErrorKind::Unsupported`]; a provider advertising the matching
/// capability must override them.
pub trait ProviderNode: Send + Sync {
    /// Associate the node with its backing resource.
    ///
    /// Called once before the first real access; may be a no-op for
    /// stores that need no per-resource session state.
    fn attach(&self) -> io::Result<()> {
        Ok(())
    }

    /// Release the association created by [`ProviderNode::attach`].
    fn detach(&self) -> io::Result<()> {
        Ok(())
    }

    /// The current type of the resource ([`FileType::Imaginary`] when it
    /// does not exist).
    fn kind(&self) -> io::Result<FileType>;

    /// List the base names of this resource's children.
    ///
    /// `Ok(None)` means the resource is not a folder.
    fn list_children(&self) -> io::Result<Option<Vec<String>>>;

    /// List children as fully typed names, when the store can do so more
    /// cheaply than name-by-name resolution. Defaults to `Ok(None)`,
    /// which falls back to [`ProviderNode::list_children`].
    fn list_children_resolved(&self) -> io::Result<Option<Vec<FileName>>> {
        Ok(None)
    }

    /// Create this resource as a folder. The parent is guaranteed to
    /// exist when this is called.
    fn create_folder(&self) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }

    /// Delete this resource. Only called on resources without children.
    fn delete(&self) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }

    /// Rename this resource to `target` within the same filesystem.
    fn rename_to(&self, _target: &FileName) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }

    /// The content size in bytes.
    fn content_size(&self) -> io::Result<u64>;

    /// Open a stream reading the content from the start.
    fn open_input(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Open a stream writing the content, truncating unless `append`.
    ///
    /// Opening the stream materializes an imaginary resource as an empty
    /// file even if nothing is written.
    fn open_output(&self, _append: bool) -> io::Result<Box<dyn Write + Send>> {
        Err(io::ErrorKind::Unsupported.into())
    }

    /// Open random-access content.
    fn open_random(&self, _mode: RandomAccessMode) -> io::Result<Box<dyn RandomAccessor>> {
        Err(io::ErrorKind::Unsupported.into())
    }

    /// The last-modified time of the content.
    fn last_modified(&self) -> io::Result<DateTime<Utc>> {
        Err(io::ErrorKind::Unsupported.into())
    }

    /// Set the last-modified time of the content.
    fn set_last_modified(&self, _when: DateTime<Utc>) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }

    /// Whether the resource is readable.
    fn is_readable(&self) -> io::Result<bool> {
        Ok(true)
    }

    /// Whether the resource is writable.
    fn is_writable(&self) -> io::Result<bool> {
        Ok(true)
    }

    /// Whether the resource is executable.
    fn is_executable(&self) -> io::Result<bool> {
        Ok(false)
    }

    /// Whether the resource is hidden.
    fn is_hidden(&self) -> io::Result<bool> {
        Ok(false)
    }

    /// The target of a link resource, `None` for non-links.
    fn link_target(&self) -> io::Result<Option<FileName>> {
        Ok(None)
    }

    /// Store-specific cache refresh, invoked after the children of this
    /// resource changed.
    fn refresh(&self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// FileProvider
// =============================================================================

/// Factory and capability surface of one backing store.
pub trait FileProvider: Send + Sync {
    /// The filesystem-kind identifier (usually the scheme).
    fn scheme(&self) -> &str;

    /// The capabilities this store supports.
    fn capabilities(&self) -> &CapabilitySet;

    /// Create the primitive node for a canonical name. Never consults a
    /// cache; the filesystem layer owns caching.
    fn create_node(&self, name: &FileName) -> VfsResult<Arc<dyn ProviderNode>>;

    /// One-time initialization hook, called when the owning filesystem is
    /// initialized.
    fn init(&self) -> io::Result<()> {
        Ok(())
    }

    /// Accuracy of last-modified times in seconds (0 = unknown).
    fn last_mod_time_accuracy(&self) -> f64 {
        0.0
    }

    /// Invoked when the last open content stream of the owning filesystem
    /// closes.
    fn all_streams_closed(&self) {}
}

/// Hook wrapping a freshly created provider node before the resource
/// handle is built and cached.
///
/// Used for cross-cutting behavior such as auto-refresh; the default
/// filesystem configuration applies no decoration.
pub trait NodeDecorator: Send + Sync {
    /// Wrap `node`, returning the node the handle should use.
    fn decorate(&self, node: Arc<dyn ProviderNode>) -> Arc<dyn ProviderNode>;
}

// =============================================================================
// Tests
// =============================================================================
