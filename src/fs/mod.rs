//! The filesystem object.
//!
//! A [`FileSystem`] owns a root name, an option bag, the listener table
//! and the per-instance lock that linearizes all metadata operations. It
//! delegates handle construction to its provider and coordinates the
//! shared object cache: resolving the same name twice without an
//! intervening structural change yields the identical cached handle.

pub mod events;

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::attrs::{AttributeStore, MemoryAttributeStore};
use crate::cache::FilesCache;
use crate::error::{VfsError, VfsResult};
use crate::file::FileObject;
use crate::name::parser::{FileNameParser, UriFileNameParser};
use crate::name::{FileName, NameScope};
use crate::options::{FileSystemKey, FileSystemOptions};
use crate::provider::{Capability, CapabilitySet, FileProvider, NodeDecorator};

use self::events::{EventKind, FileChangeEvent, FileListener};

// =============================================================================
// FileSystem
// =============================================================================

/// One mounted filesystem instance.
///
/// Constructed through [`FileSystemBuilder`]; all collaborators (the
/// provider, the shared cache, the attribute store, an optional node
/// decorator and an optional parent layer for stacked filesystems) are
/// injected rather than discovered through any global registry.
pub struct FileSystem {
    root_name: FileName,
    options: FileSystemOptions,
    key: FileSystemKey,
    provider: Arc<dyn FileProvider>,
    parser: Arc<dyn FileNameParser>,
    cache: Arc<FilesCache>,
    attributes: Arc<dyn AttributeStore>,
    decorator: Option<Arc<dyn NodeDecorator>>,
    parent_layer: Mutex<Option<Arc<FileObject>>>,
    listeners: Mutex<FxHashMap<FileName, Vec<Arc<dyn FileListener>>>>,
    /// Linearizes cache mutation, attach/detach and structural changes.
    /// Reentrant: structural operations recurse through parents on the
    /// same thread.
    lock: ReentrantMutex<()>,
    /// Live handles handed out for this filesystem.
    use_count: AtomicI64,
    /// Open content streams across all handles.
    open_streams: AtomicUsize,
    closed: AtomicBool,
}

impl FileSystem {
    /// Start building a filesystem.
    pub fn builder() -> FileSystemBuilder {
        FileSystemBuilder::new()
    }

    /// One-time initialization of the underlying store.
    pub fn init(&self) -> VfsResult<()> {
        let _guard = self.lock.lock();
        self.provider
            .init()
            .map_err(|e| VfsError::backing("init", &self.root_name, e))
    }

    /// The root name of this filesystem.
    pub fn root_name(&self) -> &FileName {
        &self.root_name
    }

    /// The root URI of this filesystem.
    pub fn root_uri(&self) -> &str {
        self.root_name.root_uri()
    }

    /// The option bag this filesystem was built with.
    pub fn options(&self) -> &FileSystemOptions {
        &self.options
    }

    /// The identity of this filesystem for caching purposes.
    pub fn cache_key(&self) -> &FileSystemKey {
        &self.key
    }

    /// The capabilities of the backing store.
    pub fn capabilities(&self) -> &CapabilitySet {
        self.provider.capabilities()
    }

    /// The parent-layer handle for stacked filesystems (e.g. an archive
    /// filesystem layered over the archive file), if any.
    pub fn parent_layer(&self) -> Option<Arc<FileObject>> {
        self.parent_layer.lock().clone()
    }

    /// Accuracy of last-modified times in seconds (0 = unknown).
    pub fn last_mod_time_accuracy(&self) -> f64 {
        self.provider.last_mod_time_accuracy()
    }

    /// Resolve the root handle.
    pub fn root(self: &Arc<Self>) -> VfsResult<Arc<FileObject>> {
        let name = self.root_name.clone();
        self.resolve_name(&name)
    }

    /// Resolve a name string against this filesystem's root.
    pub fn resolve(self: &Arc<Self>, uri: &str) -> VfsResult<Arc<FileObject>> {
        let name = self.parser.parse_uri(Some(&self.root_name), uri)?;
        self.resolve_name(&name)
    }

    /// Resolve a canonical name to its (single) live handle.
    ///
    /// On a cache miss the provider builds a node, the optional decorator
    /// wraps it, and the handle is cached. A `Resolved` notification
    /// fires on every call, hit or miss, strictly before the handle is
    /// returned. A failure leaves nothing cached.
    pub fn resolve_name(self: &Arc<Self>, name: &FileName) -> VfsResult<Arc<FileObject>> {
        if name.root_uri() != self.root_name.root_uri() {
            return Err(VfsError::MismatchedRoot {
                uri: name.friendly_uri(),
                root_uri: self.root_name.root_uri().to_string(),
            });
        }

        let _guard = self.lock.lock();
        let file = match self.cache.get(&self.key, name) {
            Some(file) => file,
            None => {
                let node = self.provider.create_node(name)?;
                let node = match &self.decorator {
                    Some(decorator) => decorator.decorate(node),
                    None => node,
                };
                let file = FileObject::new(name.clone(), Arc::clone(self), node);
                self.cache.put(&file, true);
                file
            }
        };
        self.fire(EventKind::Resolved, &file);
        Ok(file)
    }

    /// Parse `uri` against `base` and enforce `scope` on the result.
    pub fn resolve_name_relative(
        &self,
        base: &FileName,
        uri: &str,
        scope: NameScope,
    ) -> VfsResult<FileName> {
        let name = self.parser.parse_uri(Some(base), uri)?;
        if !base.is_descendant(&name, scope) {
            return Err(VfsError::MalformedPath {
                path: uri.to_string(),
                reason: format!("not within {scope} scope of `{}`", base.friendly_uri()),
            });
        }
        Ok(name)
    }

    /// Look up a handle in the cache without creating one.
    pub(crate) fn peek_cache(&self, name: &FileName) -> Option<Arc<FileObject>> {
        self.cache.get(&self.key, name)
    }

    /// Drop one handle from the cache. The next resolve of the name
    /// builds a fresh handle; used by repository-level eviction policies.
    pub fn evict(&self, name: &FileName) {
        self.cache.remove(&self.key, name);
    }

    /// Take the per-instance lock. Held across every metadata mutation.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Check a capability flag, failing instead of calling the provider.
    pub(crate) fn require_capability(&self, capability: Capability, name: &FileName) -> VfsResult<()> {
        if self.provider.capabilities().supports(capability) {
            Ok(())
        } else {
            Err(VfsError::CapabilityUnsupported {
                uri: name.friendly_uri(),
                capability,
            })
        }
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Register a listener for changes to one name.
    pub fn add_listener(&self, name: &FileName, listener: Arc<dyn FileListener>) {
        let mut listeners = self.listeners.lock();
        listeners.entry(name.clone()).or_default().push(listener);
    }

    /// Remove a previously registered listener. Removing the last
    /// listener of a name removes the name's entry entirely.
    pub fn remove_listener(&self, name: &FileName, listener: &Arc<dyn FileListener>) {
        let mut listeners = self.listeners.lock();
        if let Some(list) = listeners.get_mut(name) {
            list.retain(|existing| !Arc::ptr_eq(existing, listener));
            if list.is_empty() {
                listeners.remove(name);
            }
        }
    }

    /// Fire an event to the listeners of the file's name.
    ///
    /// The listener list is snapshotted under the table lock; mutation
    /// during dispatch affects only future events. Per-listener failures
    /// are logged and never abort delivery to the rest.
    fn fire(&self, kind: EventKind, file: &Arc<FileObject>) {
        let snapshot = self.listeners.lock().get(file.name()).cloned();
        let Some(listeners) = snapshot else {
            return;
        };
        let event = FileChangeEvent::new(Arc::clone(file));
        for listener in listeners {
            if let Err(error) = kind.dispatch(listener.as_ref(), &event) {
                warn!(
                    "file-{} listener failed for `{}`: {error}",
                    kind.as_str(),
                    event.name().friendly_uri()
                );
            }
        }
    }

    pub(crate) fn fire_created(&self, file: &Arc<FileObject>) {
        self.fire(EventKind::Created, file);
    }

    pub(crate) fn fire_deleted(&self, file: &Arc<FileObject>) {
        self.fire(EventKind::Deleted, file);
    }

    pub(crate) fn fire_changed(&self, file: &Arc<FileObject>) {
        self.fire(EventKind::Changed, file);
    }

    // =========================================================================
    // Filesystem attributes
    // =========================================================================

    /// The attribute store backing this filesystem.
    pub fn attributes(&self) -> &Arc<dyn AttributeStore> {
        &self.attributes
    }

    /// Look up a filesystem-level attribute (stored under the root name).
    pub fn attribute(&self, attr: &str) -> Option<Value> {
        self.attributes.get(&self.root_name, attr)
    }

    /// Set a filesystem-level attribute.
    pub fn set_attribute(&self, attr: &str, value: Value, read_only: bool) -> VfsResult<()> {
        self.attributes.set(&self.root_name, attr, value, read_only)
    }

    /// Remove a filesystem-level attribute.
    pub fn remove_attribute(&self, attr: &str) -> VfsResult<()> {
        self.attributes.remove(&self.root_name, attr)
    }

    // =========================================================================
    // Use and stream counting
    // =========================================================================

    pub(crate) fn file_object_handed(&self) {
        self.use_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn file_object_destroyed(&self) {
        self.use_count.fetch_sub(1, Ordering::SeqCst);
    }

    /// Whether no handles of this filesystem are live any more.
    ///
    /// Consumed by repository-level eviction policies deciding when to
    /// close idle filesystems.
    pub fn is_releasable(&self) -> bool {
        self.use_count.load(Ordering::SeqCst) <= 0
    }

    pub(crate) fn stream_opened(&self) {
        self.open_streams.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn stream_closed(&self) {
        if self.open_streams.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.provider.all_streams_closed();
        }
    }

    /// Whether any content stream of this filesystem is open.
    pub fn is_open(&self) -> bool {
        self.open_streams.load(Ordering::SeqCst) > 0
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close this filesystem: drop its cached handles and release the
    /// parent layer. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("closing filesystem `{}`", self.root_name.friendly_uri());
        self.cache.clear(&self.key);
        *self.parent_layer.lock() = None;
    }
}

// =============================================================================
// FileSystemBuilder
// =============================================================================

/// Builder for [`FileSystem`].
///
/// Only the provider is mandatory; the root name defaults to the
/// provider's scheme with path `/`, the parser to [`UriFileNameParser`],
/// the cache to a fresh [`FilesCache`] and the attribute store to an
/// in-memory one.
#[derive(Default)]
pub struct FileSystemBuilder {
    root_name: Option<FileName>,
    provider: Option<Arc<dyn FileProvider>>,
    parser: Option<Arc<dyn FileNameParser>>,
    options: FileSystemOptions,
    cache: Option<Arc<FilesCache>>,
    attributes: Option<Arc<dyn AttributeStore>>,
    decorator: Option<Arc<dyn NodeDecorator>>,
    parent_layer: Option<Arc<FileObject>>,
}

impl FileSystemBuilder {
    /// Create a builder with nothing configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backing-store provider. Mandatory.
    pub fn provider(mut self, provider: Arc<dyn FileProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the root name.
    pub fn root_name(mut self, root_name: FileName) -> Self {
        self.root_name = Some(root_name);
        self
    }

    /// Set the name parser.
    pub fn parser(mut self, parser: Arc<dyn FileNameParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Set the option bag.
    pub fn options(mut self, options: FileSystemOptions) -> Self {
        self.options = options;
        self
    }

    /// Share an existing handle cache.
    pub fn cache(mut self, cache: Arc<FilesCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the attribute store.
    pub fn attributes(mut self, attributes: Arc<dyn AttributeStore>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Wrap every freshly created provider node through `decorator`.
    pub fn decorator(mut self, decorator: Arc<dyn NodeDecorator>) -> Self {
        self.decorator = Some(decorator);
        self
    }

    /// Stack this filesystem over a handle of another one (archive over
    /// file, for instance).
    pub fn parent_layer(mut self, parent_layer: Arc<FileObject>) -> Self {
        self.parent_layer = Some(parent_layer);
        self
    }

    /// Build the filesystem.
    ///
    /// # Panics
    ///
    /// Panics if no provider was set.
    pub fn build(self) -> Arc<FileSystem> {
        let provider = self.provider.expect("provider must be set");
        let root_name = self.root_name.unwrap_or_else(|| {
            FileName::new(
                provider.scheme(),
                None,
                crate::name::codec::ROOT_PATH,
                crate::name::FileType::Folder,
            )
        });
        let key = FileSystemKey::new(root_name.root_uri(), self.options.clone());
        Arc::new(FileSystem {
            root_name,
            options: self.options,
            key,
            provider,
            parser: self
                .parser
                .unwrap_or_else(|| Arc::new(UriFileNameParser::default())),
            cache: self.cache.unwrap_or_default(),
            attributes: self
                .attributes
                .unwrap_or_else(|| Arc::new(MemoryAttributeStore::new())),
            decorator: self.decorator,
            parent_layer: Mutex::new(self.parent_layer),
            listeners: Mutex::new(FxHashMap::default()),
            lock: ReentrantMutex::new(()),
            use_count: AtomicI64::new(0),
            open_streams: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
