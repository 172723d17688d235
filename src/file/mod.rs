//! Resource handles.
//!
//! A [`FileObject`] binds one canonical name to its backing-store node
//! and runs the lifecycle state machine: lazy attach on first real
//! access, typed existence, children caching, create/delete/move
//! orchestration and parent notification. Every mutation of handle state
//! happens under the owning filesystem's lock; a handle never owns its
//! parent or children, it re-resolves them through the shared cache.

pub mod accessor;
pub mod selector;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::Value;

use crate::attrs::{PrivilegeScope, PRIVILEGE_EXECUTE, PRIVILEGE_READ, PRIVILEGE_WRITE};
use crate::error::{VfsError, VfsResult};
use crate::fs::FileSystem;
use crate::name::{FileName, FileType, NameScope};
use crate::provider::{Capability, ProviderNode};

use self::accessor::ContentAccessor;
use self::selector::{AllSelector, DepthRangeSelector, FileInfo, FileSelector};

/// Mutable handle state, guarded by the owning filesystem's lock.
struct HandleState {
    attached: bool,
    /// Cached type; `None` until the provider has been asked.
    kind: Option<FileType>,
    /// Weakly cached parent handle.
    parent: Weak<FileObject>,
    /// Cached children names; `None` = not listed yet.
    children: Option<Vec<FileName>>,
}

/// A resource handle: one live object per (filesystem, canonical name).
///
/// Handles are created by the filesystem's provider, registered in the
/// shared cache, and stay valid across structural changes: deleting a
/// file flips its handle back to [`FileType::Imaginary`] rather than
/// invalidating it.
pub struct FileObject {
    name: FileName,
    fs: Arc<FileSystem>,
    node: Arc<dyn ProviderNode>,
    state: Mutex<HandleState>,
    accessor: Mutex<Option<Arc<ContentAccessor>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for FileObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileObject")
            .field("name", &self.name.uri())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl FileObject {
    pub(crate) fn new(
        name: FileName,
        fs: Arc<FileSystem>,
        node: Arc<dyn ProviderNode>,
    ) -> Arc<Self> {
        fs.file_object_handed();
        Arc::new(Self {
            name,
            fs,
            node,
            state: Mutex::new(HandleState {
                attached: false,
                kind: None,
                parent: Weak::new(),
                children: None,
            }),
            accessor: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// The canonical name of this handle.
    pub fn name(&self) -> &FileName {
        &self.name
    }

    /// The filesystem this handle belongs to.
    pub fn filesystem(&self) -> &Arc<FileSystem> {
        &self.fs
    }

    /// The full URI of this handle.
    pub fn uri(&self) -> &str {
        self.name.uri()
    }

    /// The URI with credentials redacted.
    pub fn friendly_uri(&self) -> String {
        self.name.friendly_uri()
    }

    // =========================================================================
    // Attach / detach
    // =========================================================================

    /// Associate the handle with its backing resource. Idempotent.
    fn attach(&self) -> VfsResult<()> {
        let _guard = self.fs.lock();
        let mut state = self.state.lock();
        if state.attached {
            return Ok(());
        }
        match self.node.attach() {
            Ok(()) => {
                state.attached = true;
                debug!("attached `{}`", self.name.friendly_uri());
                Ok(())
            }
            Err(source) => Err(VfsError::AttachFailed {
                uri: self.name.friendly_uri(),
                source,
            }),
        }
    }

    /// Release the backing association and every cached piece of state.
    ///
    /// The caches are cleared even when the provider detach fails.
    fn detach(&self) -> VfsResult<()> {
        let _guard = self.fs.lock();
        let mut state = self.state.lock();
        if !state.attached {
            return Ok(());
        }
        let result = self.node.detach();
        state.attached = false;
        state.parent = Weak::new();
        state.children = None;
        debug!("detached `{}`", self.name.friendly_uri());
        result.map_err(|e| VfsError::backing("detach", &self.name, e))
    }

    /// Whether the handle is attached to its backing resource.
    pub fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    /// Drop cached state so the next access re-reads the backing store.
    pub fn refresh(&self) -> VfsResult<()> {
        self.detach()
    }

    /// Close the handle: release the content accessor first, then detach.
    ///
    /// Aggregates the first error encountered while still performing the
    /// full cleanup. Idempotent.
    pub fn close(&self) -> VfsResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut first_error = None;
        if let Some(accessor) = self.accessor.lock().take() {
            if let Err(error) = accessor.close() {
                first_error = Some(error);
            }
        }
        if let Err(error) = self.detach() {
            first_error.get_or_insert(error);
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Type and existence
    // =========================================================================

    /// The current type of the resource, attaching if necessary.
    pub fn file_type(&self) -> VfsResult<FileType> {
        let _guard = self.fs.lock();
        self.attach()?;
        if let Some(kind) = self.state.lock().kind {
            return Ok(kind);
        }
        let kind = self
            .node
            .kind()
            .map_err(|e| VfsError::backing("get-type", &self.name, e))?;
        self.state.lock().kind = Some(kind);
        Ok(kind)
    }

    /// Whether the resource currently exists in the backing store.
    pub fn exists(&self) -> VfsResult<bool> {
        Ok(self.file_type()? != FileType::Imaginary)
    }

    /// Whether the resource is a regular file.
    pub fn is_file(&self) -> VfsResult<bool> {
        Ok(self.file_type()? == FileType::File)
    }

    /// Whether the resource is a folder.
    pub fn is_folder(&self) -> VfsResult<bool> {
        Ok(self.file_type()? == FileType::Folder)
    }

    /// Whether the resource is a link.
    pub fn is_link(&self) -> VfsResult<bool> {
        Ok(self.file_type()? == FileType::Link)
    }

    /// Resolve the target of a link resource.
    pub fn link(self: &Arc<Self>) -> VfsResult<Option<Arc<FileObject>>> {
        self.fs.require_capability(Capability::Links, &self.name)?;
        match self
            .node
            .link_target()
            .map_err(|e| VfsError::backing("read-link", &self.name, e))?
        {
            Some(target) => Ok(Some(self.fs.resolve_name(&target)?)),
            None => Ok(None),
        }
    }

    /// Set the cached and canonical type after a structural change.
    fn change_type(&self, kind: FileType) {
        self.name.reclassify(kind);
        self.state.lock().kind = Some(kind);
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// The parent handle.
    ///
    /// `None` at the root of an unstacked filesystem; for a stacked
    /// filesystem the root's parent is the parent of the layer handle.
    pub fn parent(self: &Arc<Self>) -> VfsResult<Option<Arc<FileObject>>> {
        if self.name == *self.fs.root_name() {
            return match self.fs.parent_layer() {
                Some(layer) => layer.parent(),
                None => Ok(None),
            };
        }

        let _guard = self.fs.lock();
        if let Some(parent) = self.state.lock().parent.upgrade() {
            return Ok(Some(parent));
        }
        match self.name.parent() {
            Some(parent_name) => {
                let parent = self.fs.resolve_name(&parent_name)?;
                self.state.lock().parent = Arc::downgrade(&parent);
                Ok(Some(parent))
            }
            None => Ok(None),
        }
    }

    /// Resolve `path` relative to this handle's name within `scope`.
    pub fn resolve_relative(
        self: &Arc<Self>,
        path: &str,
        scope: NameScope,
    ) -> VfsResult<Arc<FileObject>> {
        let name = self.fs.resolve_name_relative(&self.name, path, scope)?;
        self.fs.resolve_name(&name)
    }

    /// The children of this folder, resolved to live handles.
    ///
    /// The name list is cached after the first listing and kept current
    /// by [`children_changed`](Self::children_changed) notifications.
    pub fn children(self: &Arc<Self>) -> VfsResult<Vec<Arc<FileObject>>> {
        let _guard = self.fs.lock();
        if !self.fs.capabilities().supports(Capability::ListChildren) {
            return Err(VfsError::NotListable {
                uri: self.name.friendly_uri(),
            });
        }
        self.attach()?;

        let cached = self.state.lock().children.clone();
        if let Some(names) = cached {
            return self.resolve_children(&names);
        }

        if let Some(names) = self
            .node
            .list_children_resolved()
            .map_err(|e| VfsError::backing("list-children", &self.name, e))?
        {
            self.state.lock().children = Some(names.clone());
            return self.resolve_children(&names);
        }

        let raw = self
            .node
            .list_children()
            .map_err(|e| VfsError::backing("list-children", &self.name, e))?;
        let Some(raw) = raw else {
            return Err(VfsError::NotAFolder {
                uri: self.name.friendly_uri(),
            });
        };

        let mut names = Vec::with_capacity(raw.len());
        for base_name in &raw {
            names.push(
                self.fs
                    .resolve_name_relative(&self.name, base_name, NameScope::Child)?,
            );
        }
        self.state.lock().children = Some(names.clone());
        self.resolve_children(&names)
    }

    fn resolve_children(self: &Arc<Self>, names: &[FileName]) -> VfsResult<Vec<Arc<FileObject>>> {
        names.iter().map(|name| self.fs.resolve_name(name)).collect()
    }

    /// Look up a direct child by its base name.
    pub fn child(self: &Arc<Self>, base_name: &str) -> VfsResult<Option<Arc<FileObject>>> {
        for child in self.children()? {
            if child.name().base_name() == base_name {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Update the cached children list after a child changed type.
    ///
    /// An imaginary child leaves the list, everything else joins it; the
    /// provider's refresh hook runs afterwards.
    pub(crate) fn children_changed(&self, child: &FileName, new_type: FileType) -> VfsResult<()> {
        let _guard = self.fs.lock();
        {
            let mut state = self.state.lock();
            if let Some(children) = state.children.as_mut() {
                if new_type == FileType::Imaginary {
                    children.retain(|existing| existing != child);
                } else if !children.contains(child) {
                    children.push(child.clone());
                }
            }
        }
        self.node
            .refresh()
            .map_err(|e| VfsError::backing("refresh", &self.name, e))
    }

    /// Tell the cached parent (if any handle for it is live) that this
    /// resource changed type.
    fn notify_parent(self: &Arc<Self>, new_type: FileType) -> VfsResult<()> {
        let cached = self.state.lock().parent.upgrade();
        let parent = match cached {
            Some(parent) => Some(parent),
            None => match self.name.parent() {
                // Only a parent that is already live needs its children
                // cache fixed up; nothing is resolved just for this.
                Some(parent_name) => self.fs.peek_cache(&parent_name),
                None => None,
            },
        };
        if let Some(parent) = parent {
            self.state.lock().parent = Arc::downgrade(&parent);
            parent.children_changed(&self.name, new_type)?;
        }
        Ok(())
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Create this resource: a folder when `as_folder`, an empty file
    /// otherwise. Creating an already existing resource of the right type
    /// does nothing.
    pub fn create(self: &Arc<Self>, as_folder: bool) -> VfsResult<()> {
        if as_folder {
            self.create_folder()
        } else {
            self.create_file()
        }
    }

    fn create_file(self: &Arc<Self>) -> VfsResult<()> {
        let _guard = self.fs.lock();
        if self.exists()? && !self.is_file()? {
            return Err(VfsError::AlreadyExists {
                uri: self.name.friendly_uri(),
            });
        }
        if !self.exists()? {
            self.fs.require_capability(Capability::Create, &self.name)?;
            // Materialize an empty file: open a write stream and close it
            // immediately.
            let out = self.prepare_writing(false)?;
            drop(out);
            self.end_output()?;
        }
        Ok(())
    }

    fn create_folder(self: &Arc<Self>) -> VfsResult<()> {
        let _guard = self.fs.lock();
        let kind = self.file_type()?;
        if kind.has_children() {
            // Already a folder, nothing to do.
            return Ok(());
        }
        if kind != FileType::Imaginary {
            return Err(VfsError::TypeMismatch {
                uri: self.name.friendly_uri(),
                actual: kind,
                expected: FileType::Folder,
            });
        }
        self.fs.require_capability(Capability::Create, &self.name)?;
        if let Some(parent) = self.parent()? {
            parent.create(true)?;
        }
        self.node
            .create_folder()
            .map_err(|e| VfsError::backing("create-folder", &self.name, e))?;
        self.handle_create(FileType::Folder)
    }

    /// Open a write stream, ensuring the parent folder exists first and
    /// checking the append capability.
    ///
    /// Callers writing real content should prefer
    /// [`write_stream`](Self::write_stream), which finalizes the create
    /// bookkeeping when the stream drops.
    pub(crate) fn prepare_writing(
        self: &Arc<Self>,
        append: bool,
    ) -> VfsResult<Box<dyn std::io::Write + Send>> {
        if append {
            self.fs
                .require_capability(Capability::AppendContent, &self.name)?;
        }
        if self.file_type()? == FileType::Imaginary {
            if let Some(parent) = self.parent()? {
                parent.create(true)?;
            }
        }
        self.node
            .open_output(append)
            .map_err(|e| VfsError::backing("write", &self.name, e))
    }

    /// Finish a write: reclassify a freshly materialized file and fire
    /// the matching notification.
    fn end_output(self: &Arc<Self>) -> VfsResult<()> {
        if self.file_type()? == FileType::Imaginary {
            self.handle_create(FileType::File)
        } else {
            self.fs.fire_changed(self);
            Ok(())
        }
    }

    /// Open a stream writing this file's content.
    ///
    /// The parent folder is created if needed; when the stream drops, the
    /// handle reclassifies and the `Created`/`Changed` notification
    /// fires.
    pub fn write_stream(
        self: &Arc<Self>,
        append: bool,
    ) -> VfsResult<Box<dyn std::io::Write + Send>> {
        let inner = self.prepare_writing(append)?;
        Ok(Box::new(WriteFinisher {
            inner,
            file: Arc::clone(self),
        }))
    }

    /// Reclassify after a create, update caches, notify the parent and
    /// fire `Created`.
    fn handle_create(self: &Arc<Self>, new_type: FileType) -> VfsResult<()> {
        let _guard = self.fs.lock();
        let attached = self.state.lock().attached;
        if attached {
            self.change_type(new_type);
            self.state.lock().children = None;
        }
        self.notify_parent(new_type)?;
        self.fs.fire_created(self);
        Ok(())
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete this resource only.
    ///
    /// Returns `false` without deleting anything when the resource has
    /// children or does not exist.
    pub fn delete(self: &Arc<Self>) -> VfsResult<bool> {
        Ok(self.delete_matching(&DepthRangeSelector::self_only())? > 0)
    }

    /// Delete every resource of the subtree matching `selector`,
    /// returning the number deleted.
    ///
    /// Folders that still have children are skipped, not failed: the
    /// traversal is depth-first, so a fully matched subtree empties
    /// bottom-up.
    pub fn delete_matching(self: &Arc<Self>, selector: &dyn FileSelector) -> VfsResult<usize> {
        let files = self.find_files(selector, true)?;
        let mut deleted = 0;
        for file in files {
            // Refuse to delete anything that still has children.
            if file.file_type()?.has_children() && !file.children()?.is_empty() {
                continue;
            }
            if file.delete_self()? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Delete this resource and all of its descendants.
    pub fn delete_all(self: &Arc<Self>) -> VfsResult<usize> {
        self.delete_matching(&AllSelector)
    }

    fn delete_self(self: &Arc<Self>) -> VfsResult<bool> {
        let _guard = self.fs.lock();
        self.fs.require_capability(Capability::Delete, &self.name)?;
        self.node
            .delete()
            .map_err(|e| VfsError::backing("delete", &self.name, e))?;
        self.handle_delete()?;
        Ok(true)
    }

    /// Flip the handle back to imaginary, clear caches, notify the parent
    /// and fire `Deleted`.
    fn handle_delete(self: &Arc<Self>) -> VfsResult<()> {
        let _guard = self.fs.lock();
        {
            let mut state = self.state.lock();
            if state.attached {
                state.kind = Some(FileType::Imaginary);
                state.children = None;
            }
        }
        self.notify_parent(FileType::Imaginary)?;
        self.fs.fire_deleted(self);
        Ok(())
    }

    // =========================================================================
    // Move and copy
    // =========================================================================

    /// Whether this resource can be renamed onto `dest` in place (same
    /// filesystem identity).
    pub fn can_rename_to(&self, dest: &FileObject) -> bool {
        self.fs.cache_key() == dest.fs.cache_key()
    }

    /// Move this resource to `dest`.
    ///
    /// Uses the provider rename primitive when both handles share a
    /// filesystem and the store supports renaming; otherwise falls back
    /// to a copy of the subtree followed by deletion.
    pub fn move_to(self: &Arc<Self>, dest: &Arc<FileObject>) -> VfsResult<()> {
        if self.can_rename_to(dest) && self.fs.capabilities().supports(Capability::Rename) {
            let _guard = self.fs.lock();
            let kind = self.file_type()?;
            if dest.exists()? {
                dest.delete_all()?;
            }
            self.node
                .rename_to(dest.name())
                .map_err(|e| VfsError::backing("rename", &self.name, e))?;
            self.handle_delete()?;
            dest.handle_create(kind)
        } else {
            dest.copy_from(self, &AllSelector)?;
            self.delete_all()?;
            Ok(())
        }
    }

    /// Copy every file `selector` picks out of `src`'s subtree into the
    /// same relative position under this handle.
    ///
    /// A destination that exists with a different type is deleted (with
    /// its subtree) before being replaced.
    pub fn copy_from(self: &Arc<Self>, src: &Arc<FileObject>, selector: &dyn FileSelector) -> VfsResult<()> {
        if !src.exists()? {
            return Ok(());
        }
        for file in src.find_files(selector, false)? {
            let relative = src.name().relative_name(file.name());
            let dest = self.resolve_relative(&relative, NameScope::DescendantOrSelf)?;
            if dest.exists()? && dest.file_type()? != file.file_type()? {
                dest.delete_all()?;
            }
            let kind = file.file_type()?;
            if kind.has_content() {
                dest.copy_content_from(&file)?;
            } else if kind.has_children() {
                dest.create(true)?;
            }
        }
        Ok(())
    }

    fn copy_content_from(self: &Arc<Self>, src: &Arc<FileObject>) -> VfsResult<()> {
        let accessor = src.content()?;
        let mut output = self.prepare_writing(false)?;
        accessor.write_to(&mut output)?;
        drop(output);
        self.end_output()
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// The content accessor of this handle, built lazily and reused
    /// across calls.
    pub fn content(self: &Arc<Self>) -> VfsResult<Arc<ContentAccessor>> {
        let _guard = self.fs.lock();
        self.attach()?;
        let mut accessor = self.accessor.lock();
        if let Some(existing) = accessor.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let created = Arc::new(ContentAccessor::new(
            self.name.clone(),
            Arc::clone(&self.node),
            Arc::clone(&self.fs),
        ));
        *accessor = Some(Arc::clone(&created));
        Ok(created)
    }

    /// Whether any content stream of this handle is open.
    pub fn is_content_open(&self) -> bool {
        self.accessor
            .lock()
            .as_ref()
            .is_some_and(|accessor| accessor.is_open())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Collect every resource of this subtree `selector` picks.
    ///
    /// `depth_first` appends matches after their children (deletion
    /// order); otherwise parents come before their children.
    pub fn find_files(
        self: &Arc<Self>,
        selector: &dyn FileSelector,
        depth_first: bool,
    ) -> VfsResult<Vec<Arc<FileObject>>> {
        let mut selected = Vec::new();
        if self.exists()? {
            let mut info = FileInfo {
                base: Some(Arc::clone(self)),
                file: Arc::clone(self),
                depth: 0,
            };
            selector::traverse(&mut info, selector, depth_first, &mut selected)?;
        }
        Ok(selected)
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// Whether the resource is readable.
    pub fn is_readable(&self) -> VfsResult<bool> {
        self.node
            .is_readable()
            .map_err(|e| VfsError::backing("is-readable", &self.name, e))
    }

    /// Whether the resource is writable.
    pub fn is_writable(&self) -> VfsResult<bool> {
        self.node
            .is_writable()
            .map_err(|e| VfsError::backing("is-writable", &self.name, e))
    }

    /// Whether the resource is executable.
    pub fn is_executable(&self) -> VfsResult<bool> {
        self.node
            .is_executable()
            .map_err(|e| VfsError::backing("is-executable", &self.name, e))
    }

    /// Whether the resource is hidden.
    pub fn is_hidden(&self) -> VfsResult<bool> {
        self.node
            .is_hidden()
            .map_err(|e| VfsError::backing("is-hidden", &self.name, e))
    }

    /// Set or clear the read bit of the stored privilege word.
    pub fn set_readable(&self, readable: bool, owner_only: bool) -> VfsResult<()> {
        self.set_privilege_bit(PRIVILEGE_READ, readable, owner_only)
    }

    /// Set or clear the write bit of the stored privilege word.
    pub fn set_writable(&self, writable: bool, owner_only: bool) -> VfsResult<()> {
        self.set_privilege_bit(PRIVILEGE_WRITE, writable, owner_only)
    }

    /// Set or clear the execute bit of the stored privilege word.
    pub fn set_executable(&self, executable: bool, owner_only: bool) -> VfsResult<()> {
        self.set_privilege_bit(PRIVILEGE_EXECUTE, executable, owner_only)
    }

    /// The stored privilege word for a scope (0 when absent).
    pub fn privileges(&self, scope: PrivilegeScope) -> u64 {
        self.fs
            .attributes()
            .get(&self.name, scope.meta_key())
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
    }

    fn set_privilege_bit(&self, bit: u64, enable: bool, owner_only: bool) -> VfsResult<()> {
        let scope = if owner_only {
            PrivilegeScope::Owner
        } else {
            PrivilegeScope::Any
        };
        let mut word = self.privileges(scope);
        if enable {
            word |= bit;
        } else {
            word &= !bit;
        }
        self.fs
            .attributes()
            .set(&self.name, scope.meta_key(), Value::from(word), false)
    }
}

impl Drop for FileObject {
    fn drop(&mut self) {
        self.fs.file_object_destroyed();
    }
}

/// Write stream that finalizes create bookkeeping when dropped.
struct WriteFinisher {
    inner: Box<dyn std::io::Write + Send>,
    file: Arc<FileObject>,
}

impl std::io::Write for WriteFinisher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl Drop for WriteFinisher {
    fn drop(&mut self) {
        if let Err(error) = self.file.end_output() {
            warn!(
                "finishing write to `{}` failed: {error}",
                self.file.name().friendly_uri()
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileSystemBuilder;
    use crate::provider::memory::MemoryProvider;
    use crate::provider::CapabilitySet;

    use std::io::Write;

    fn memfs() -> Arc<FileSystem> {
        FileSystemBuilder::new()
            .provider(Arc::new(MemoryProvider::new("mem")))
            .build()
    }

    #[test]
    fn test_create_file_from_imaginary() {
        let fs = memfs();
        let file = fs.resolve("/a/b/c.txt").unwrap();
        assert!(!file.exists().unwrap());
        assert_eq!(file.file_type().unwrap(), FileType::Imaginary);

        file.create(false).unwrap();
        assert!(file.exists().unwrap());
        assert_eq!(file.file_type().unwrap(), FileType::File);
        // Parents were materialized on the way.
        assert!(fs.resolve("/a/b").unwrap().is_folder().unwrap());
        assert!(fs.resolve("/a").unwrap().is_folder().unwrap());
    }

    #[test]
    fn test_create_file_over_folder_fails() {
        let fs = memfs();
        fs.resolve("/dir").unwrap().create(true).unwrap();
        let err = fs.resolve("/dir").unwrap().create(false).unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists { .. }));
    }

    #[test]
    fn test_create_folder_over_file_fails() {
        let fs = memfs();
        fs.resolve("/f").unwrap().create(false).unwrap();
        let err = fs.resolve("/f").unwrap().create(true).unwrap_err();
        assert!(matches!(err, VfsError::TypeMismatch { .. }));
    }

    #[test]
    fn test_create_existing_is_noop() {
        let fs = memfs();
        let file = fs.resolve("/f").unwrap();
        file.create(false).unwrap();
        file.create(false).unwrap();

        let folder = fs.resolve("/d").unwrap();
        folder.create(true).unwrap();
        folder.create(true).unwrap();
    }

    #[test]
    fn test_delete_round_trip() {
        let fs = memfs();
        let file = fs.resolve("/a.txt").unwrap();
        file.create(false).unwrap();
        assert!(file.exists().unwrap());

        assert!(file.delete().unwrap());
        assert!(!file.exists().unwrap());
        assert_eq!(file.file_type().unwrap(), FileType::Imaginary);

        // Deleting an imaginary resource deletes nothing.
        assert!(!file.delete().unwrap());
    }

    #[test]
    fn test_delete_refuses_nonempty_folder() {
        let fs = memfs();
        fs.resolve("/dir/child.txt").unwrap().create(false).unwrap();
        let dir = fs.resolve("/dir").unwrap();

        assert!(!dir.delete().unwrap());
        assert!(dir.exists().unwrap());

        // delete_all removes the child and then the folder itself.
        assert_eq!(dir.delete_all().unwrap(), 2);
        assert!(!dir.exists().unwrap());
    }

    #[test]
    fn test_children_and_child() {
        let fs = memfs();
        fs.resolve("/dir/a").unwrap().create(false).unwrap();
        fs.resolve("/dir/b").unwrap().create(false).unwrap();
        let dir = fs.resolve("/dir").unwrap();

        let mut names: Vec<String> = dir
            .children()
            .unwrap()
            .iter()
            .map(|child| child.name().base_name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);

        assert!(dir.child("a").unwrap().is_some());
        assert!(dir.child("missing").unwrap().is_none());
    }

    #[test]
    fn test_children_cache_tracks_structural_changes() {
        let fs = memfs();
        fs.resolve("/dir/a").unwrap().create(false).unwrap();
        let dir = fs.resolve("/dir").unwrap();
        assert_eq!(dir.children().unwrap().len(), 1);

        // Creating a sibling updates the cached listing via the parent
        // notification.
        fs.resolve("/dir/b").unwrap().create(false).unwrap();
        assert_eq!(dir.children().unwrap().len(), 2);

        fs.resolve("/dir/a").unwrap().delete().unwrap();
        let children = dir.children().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name().base_name(), "b");
    }

    #[test]
    fn test_children_of_file_is_not_a_folder() {
        let fs = memfs();
        let file = fs.resolve("/f").unwrap();
        file.create(false).unwrap();
        assert!(matches!(
            file.children().unwrap_err(),
            VfsError::NotAFolder { .. }
        ));
    }

    #[test]
    fn test_children_without_capability_is_not_listable() {
        let caps = CapabilitySet::all().without(Capability::ListChildren);
        let fs = FileSystemBuilder::new()
            .provider(Arc::new(MemoryProvider::with_capabilities("mem", caps)))
            .build();
        let root = fs.root().unwrap();
        assert!(matches!(
            root.children().unwrap_err(),
            VfsError::NotListable { .. }
        ));
    }

    #[test]
    fn test_parent_navigation() {
        let fs = memfs();
        let file = fs.resolve("/a/b").unwrap();
        let parent = file.parent().unwrap().unwrap();
        assert_eq!(parent.name().path(), "/a");

        // The parent handle is the cached one.
        let again = file.parent().unwrap().unwrap();
        assert!(Arc::ptr_eq(&parent, &again));

        let root = fs.root().unwrap();
        assert!(root.parent().unwrap().is_none());
    }

    #[test]
    fn test_parent_layer_chain() {
        let outer = memfs();
        let archive = outer.resolve("/archive.zip").unwrap();
        archive.create(false).unwrap();

        let inner = FileSystemBuilder::new()
            .provider(Arc::new(MemoryProvider::new("zip")))
            .parent_layer(archive.clone())
            .build();
        let root = inner.root().unwrap();
        // The inner root's parent is the archive file's parent.
        let parent = root.parent().unwrap().unwrap();
        assert_eq!(parent.name().uri(), "mem:///");
    }

    #[test]
    fn test_resolve_relative_scopes() {
        let fs = memfs();
        fs.resolve("/a/b").unwrap().create(false).unwrap();
        let base = fs.resolve("/a").unwrap();

        let child = base.resolve_relative("b", NameScope::Child).unwrap();
        assert_eq!(child.name().uri(), "mem:///a/b");

        // Two segments beyond the base is not a child.
        assert!(matches!(
            base.resolve_relative("b/x", NameScope::Child).unwrap_err(),
            VfsError::MalformedPath { .. }
        ));

        let deep = base
            .resolve_relative("b/x", NameScope::Descendant)
            .unwrap();
        assert_eq!(deep.name().uri(), "mem:///a/b/x");

        assert!(matches!(
            base.resolve_relative("../other", NameScope::Descendant)
                .unwrap_err(),
            VfsError::MalformedPath { .. }
        ));
    }

    #[test]
    fn test_write_stream_materializes_and_reads_back() {
        let fs = memfs();
        let file = fs.resolve("/notes/today.md").unwrap();
        {
            let mut out = file.write_stream(false).unwrap();
            out.write_all(b"# notes").unwrap();
        }
        assert!(file.is_file().unwrap());
        assert_eq!(file.content().unwrap().read_all().unwrap(), b"# notes");
    }

    #[test]
    fn test_move_to_renames_in_place() {
        let fs = memfs();
        let src = fs.resolve("/old.txt").unwrap();
        {
            let mut out = src.write_stream(false).unwrap();
            out.write_all(b"payload").unwrap();
        }
        let dest = fs.resolve("/new.txt").unwrap();
        src.move_to(&dest).unwrap();

        assert!(!src.exists().unwrap());
        assert!(dest.is_file().unwrap());
        assert_eq!(dest.content().unwrap().read_all().unwrap(), b"payload");
    }

    #[test]
    fn test_move_to_falls_back_to_copy_across_filesystems() {
        let fs1 = memfs();
        let fs2 = FileSystemBuilder::new()
            .provider(Arc::new(MemoryProvider::new("other")))
            .build();

        let src = fs1.resolve("/data.bin").unwrap();
        {
            let mut out = src.write_stream(false).unwrap();
            out.write_all(b"xyz").unwrap();
        }
        let dest = fs2.resolve("/copied.bin").unwrap();
        assert!(!src.can_rename_to(&dest));
        src.move_to(&dest).unwrap();

        assert!(!src.exists().unwrap());
        assert_eq!(dest.content().unwrap().read_all().unwrap(), b"xyz");
    }

    #[test]
    fn test_copy_from_subtree() {
        let fs = memfs();
        fs.resolve("/src/sub").unwrap().create(true).unwrap();
        let a = fs.resolve("/src/a.txt").unwrap();
        {
            let mut out = a.write_stream(false).unwrap();
            out.write_all(b"alpha").unwrap();
        }
        let b = fs.resolve("/src/sub/b.txt").unwrap();
        {
            let mut out = b.write_stream(false).unwrap();
            out.write_all(b"beta").unwrap();
        }

        let src = fs.resolve("/src").unwrap();
        let dest = fs.resolve("/dest").unwrap();
        dest.create(true).unwrap();
        dest.copy_from(&src, &AllSelector).unwrap();

        assert_eq!(
            fs.resolve("/dest/a.txt")
                .unwrap()
                .content()
                .unwrap()
                .read_all()
                .unwrap(),
            b"alpha"
        );
        assert_eq!(
            fs.resolve("/dest/sub/b.txt")
                .unwrap()
                .content()
                .unwrap()
                .read_all()
                .unwrap(),
            b"beta"
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let fs = memfs();
        let file = fs.resolve("/f").unwrap();
        file.create(false).unwrap();
        file.content().unwrap();
        assert!(file.is_attached());

        file.close().unwrap();
        assert!(!file.is_attached());
        file.close().unwrap();
    }

    #[test]
    fn test_refresh_detaches() {
        let fs = memfs();
        let file = fs.resolve("/f").unwrap();
        file.create(false).unwrap();
        assert!(file.is_attached());
        file.refresh().unwrap();
        assert!(!file.is_attached());
        // Next access re-attaches.
        assert!(file.exists().unwrap());
        assert!(file.is_attached());
    }

    #[test]
    fn test_privilege_bits() {
        let fs = memfs();
        let file = fs.resolve("/f").unwrap();
        file.create(false).unwrap();

        file.set_readable(true, false).unwrap();
        file.set_executable(true, true).unwrap();
        assert_eq!(file.privileges(PrivilegeScope::Any), PRIVILEGE_READ);
        assert_eq!(file.privileges(PrivilegeScope::Owner), PRIVILEGE_EXECUTE);

        file.set_readable(false, false).unwrap();
        assert_eq!(file.privileges(PrivilegeScope::Any), 0);
    }
}
