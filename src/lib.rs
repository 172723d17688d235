//! # vfskit
//!
//! A virtual-filesystem toolkit: one object model for hierarchically
//! named, addressable resources (local files, archive entries, remote
//! resources) navigated, created, deleted and streamed through a single
//! polymorphic interface regardless of backing store.
//!
//! The crate supplies the store-independent core:
//!
//! - **Names**: a canonical-path/URI parser and normalizer with exact
//!   semantics for `.`/`..`, percent-encoding, scheme extraction and
//!   separator fix-up, plus the immutable [`FileName`] value and its
//!   ancestor/descendant scope arithmetic.
//! - **Filesystems**: a [`FileSystem`] per mounted root, owning an option
//!   bag, a listener table and the per-instance lock that linearizes all
//!   metadata operations.
//! - **Handles**: one live [`FileObject`] per (filesystem, name), cached
//!   in a shared [`FilesCache`] and running the attach/create/delete
//!   lifecycle against a pluggable [`FileProvider`].
//!
//! Concrete backing stores live behind the [`provider`] traits; the
//! bundled [`MemoryProvider`] is a complete in-memory reference.
//!
//! ## Quick Start
//!
//! ```
//! use std::io::Write;
//! use std::sync::Arc;
//! use vfskit::{FileSystem, MemoryProvider};
//!
//! # fn main() -> vfskit::VfsResult<()> {
//! let fs = FileSystem::builder()
//!     .provider(Arc::new(MemoryProvider::new("mem")))
//!     .build();
//!
//! // Create a file (parents materialize on demand) and write to it.
//! let file = fs.resolve("/docs/readme.md")?;
//! file.write_stream(false)?.write_all(b"hello")?;
//!
//! // Resolving the same name again yields the identical cached handle.
//! let again = fs.resolve("/docs/readme.md")?;
//! assert!(Arc::ptr_eq(&file, &again));
//!
//! // Read it back and clean up.
//! assert_eq!(file.content()?.read_all()?, b"hello");
//! fs.resolve("/docs")?.delete_all()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attrs;
pub mod cache;
pub mod error;
pub mod file;
pub mod fs;
pub mod name;
pub mod options;
pub mod provider;

// =============================================================================
// Names
// =============================================================================

pub use name::codec;
pub use name::parser::{FileNameParser, UriFileNameParser};
pub use name::{check_name, Authority, FileName, FileType, NameScope, PathStyle};

// =============================================================================
// Filesystem
// =============================================================================

pub use cache::FilesCache;
pub use fs::events::{FileChangeEvent, FileListener};
pub use fs::{FileSystem, FileSystemBuilder};
pub use options::{FileSystemKey, FileSystemOptions};

// =============================================================================
// Handles
// =============================================================================

pub use file::accessor::ContentAccessor;
pub use file::selector::{
    AllSelector, DepthRangeSelector, ExtensionSelector, FileInfo, FileSelector, NotSelector,
    PatternSelector, TypeSelector,
};
pub use file::FileObject;

// =============================================================================
// Providers and collaborators
// =============================================================================

pub use attrs::{AttributeStore, MemoryAttributeStore, PrivilegeScope};
pub use error::{VfsError, VfsResult};
pub use provider::memory::MemoryProvider;
pub use provider::{
    Capability, CapabilitySet, FileProvider, NodeDecorator, ProviderNode, RandomAccessMode,
    RandomAccessor,
};
