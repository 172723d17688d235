//! Change notification.
//!
//! Filesystems fire an event whenever a resource is resolved, created,
//! deleted or changed. Listeners register per name; delivery is
//! synchronous against a snapshot of the listener list taken at fire
//! time, and a failing listener never blocks the remaining ones.

use std::sync::Arc;

use crate::error::VfsResult;
use crate::file::FileObject;
use crate::name::FileName;

/// A change to one resource.
pub struct FileChangeEvent {
    file: Arc<FileObject>,
}

impl FileChangeEvent {
    pub(crate) fn new(file: Arc<FileObject>) -> Self {
        Self { file }
    }

    /// The handle the change happened to.
    pub fn file(&self) -> &Arc<FileObject> {
        &self.file
    }

    /// The canonical name of the changed resource.
    pub fn name(&self) -> &FileName {
        self.file.name()
    }
}

/// Listener for resource changes on one name.
///
/// Every method returns a result so dispatch failures can be logged per
/// listener without aborting delivery; the default implementations do
/// nothing.
pub trait FileListener: Send + Sync {
    /// A resource was created.
    fn file_created(&self, _event: &FileChangeEvent) -> VfsResult<()> {
        Ok(())
    }

    /// A resource was deleted.
    fn file_deleted(&self, _event: &FileChangeEvent) -> VfsResult<()> {
        Ok(())
    }

    /// A resource's content or type changed.
    fn file_changed(&self, _event: &FileChangeEvent) -> VfsResult<()> {
        Ok(())
    }

    /// A resource was resolved through the filesystem.
    fn file_resolved(&self, _event: &FileChangeEvent) -> VfsResult<()> {
        Ok(())
    }
}

/// Which listener method an event dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    Created,
    Deleted,
    Changed,
    Resolved,
}

impl EventKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Deleted => "deleted",
            Self::Changed => "changed",
            Self::Resolved => "resolved",
        }
    }

    pub(crate) fn dispatch(
        self,
        listener: &dyn FileListener,
        event: &FileChangeEvent,
    ) -> VfsResult<()> {
        match self {
            Self::Created => listener.file_created(event),
            Self::Deleted => listener.file_deleted(event),
            Self::Changed => listener.file_changed(event),
            Self::Resolved => listener.file_resolved(event),
        }
    }
}
