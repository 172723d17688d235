//! Error type for filesystem operations.

use thiserror::Error;

use crate::name::FileType;
use crate::provider::Capability;

/// Result alias used throughout the crate.
pub type VfsResult<T> = Result<T, VfsError>;

/// Error type for virtual-filesystem failures.
///
/// Every variant carries the offending name as a URI string so failures can
/// be traced to a resource without holding a reference to it. URIs embedded
/// in errors are always the credential-redacted ("friendly") form.
#[derive(Debug, Error)]
pub enum VfsError {
    /// A path could not be normalized (e.g. a `..` segment escaping the root).
    #[error("malformed path `{path}`: {reason}")]
    MalformedPath {
        /// The offending path or URI.
        path: String,
        /// Why normalization rejected it.
        reason: String,
    },

    /// A `%` sequence was not followed by two hex digits.
    #[error("malformed percent-encoding `{input}`")]
    MalformedEncoding {
        /// The offending encoded fragment.
        input: String,
    },

    /// A name was resolved against a filesystem with a different root.
    #[error("`{uri}` does not belong to the filesystem rooted at `{root_uri}`")]
    MismatchedRoot {
        /// The name that was being resolved.
        uri: String,
        /// The root URI of the filesystem it was resolved against.
        root_uri: String,
    },

    /// An operation was attempted against a capability flag the backing
    /// store disables.
    #[error("backing store for `{uri}` does not support {capability}")]
    CapabilityUnsupported {
        /// The resource the operation targeted.
        uri: String,
        /// The missing capability.
        capability: Capability,
    },

    /// A children listing was requested for a name that is not a folder.
    #[error("`{uri}` is not a folder")]
    NotAFolder {
        /// The resource that was asked for children.
        uri: String,
    },

    /// The backing store does not support listing children at all.
    #[error("`{uri}` does not support listing children")]
    NotListable {
        /// The resource that was asked for children.
        uri: String,
    },

    /// A file creation collided with an existing resource of another type.
    #[error("`{uri}` already exists and is not a file")]
    AlreadyExists {
        /// The name that was being created.
        uri: String,
    },

    /// An existing resource has the wrong type for the requested operation.
    #[error("`{uri}` has type {actual}, expected {expected}")]
    TypeMismatch {
        /// The offending resource.
        uri: String,
        /// The type the resource currently has.
        actual: FileType,
        /// The type the operation required.
        expected: FileType,
    },

    /// The provider failed to attach a handle to its backing store.
    #[error("could not attach `{uri}` to its backing store")]
    AttachFailed {
        /// The resource that failed to attach.
        uri: String,
        /// The provider-level failure.
        #[source]
        source: std::io::Error,
    },

    /// An attribute was stored read-only and a new value was rejected.
    #[error("attribute `{attr}` on `{uri}` is read-only")]
    AttributeReadOnly {
        /// The resource carrying the attribute.
        uri: String,
        /// The attribute name.
        attr: String,
    },

    /// A content accessor was used after `close`.
    #[error("content accessor for `{uri}` is closed")]
    Closed {
        /// The resource whose accessor was closed.
        uri: String,
    },

    /// A provider primitive failed. Wraps the provider-level error together
    /// with the operation name and the name context.
    #[error("{op} failed for `{uri}`")]
    BackingStore {
        /// The operation that was being performed.
        op: &'static str,
        /// The resource the operation targeted.
        uri: String,
        /// The underlying provider error.
        #[source]
        source: std::io::Error,
    },

    /// Plain I/O error outside any provider call (e.g. bulk content copy).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    /// Wrap a provider-level failure with the operation name and the
    /// (redacted) name it was performed on.
    pub fn backing(op: &'static str, name: &crate::name::FileName, source: std::io::Error) -> Self {
        Self::BackingStore {
            op,
            uri: name.friendly_uri(),
            source,
        }
    }
}
