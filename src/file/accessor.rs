//! Content access.
//!
//! A [`ContentAccessor`] is the streaming and random-access view over one
//! handle's bytes. Streams returned here carry an RAII guard driving the
//! owning filesystem's open-stream counter, so a dropped stream always
//! closes exactly once regardless of how the caller lets go of it.
//! Content I/O is never serialized by the filesystem lock.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{VfsError, VfsResult};
use crate::fs::FileSystem;
use crate::name::FileName;
use crate::provider::{Capability, ProviderNode, RandomAccessMode, RandomAccessor};

// =============================================================================
// Stream guards
// =============================================================================

/// Counts one open stream against the accessor and the filesystem for as
/// long as it lives.
struct StreamTracker {
    fs: Arc<FileSystem>,
    count: Arc<AtomicUsize>,
}

impl StreamTracker {
    fn new(fs: Arc<FileSystem>, count: Arc<AtomicUsize>) -> Self {
        fs.stream_opened();
        count.fetch_add(1, Ordering::SeqCst);
        Self { fs, count }
    }
}

impl Drop for StreamTracker {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        self.fs.stream_closed();
    }
}

struct InputGuard {
    inner: Box<dyn Read + Send>,
    _tracker: StreamTracker,
}

impl Read for InputGuard {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

struct OutputGuard {
    inner: Box<dyn Write + Send>,
    _tracker: StreamTracker,
}

impl Write for OutputGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RandomGuard {
    inner: Box<dyn RandomAccessor>,
    _tracker: StreamTracker,
}

impl Read for RandomGuard {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for RandomGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl RandomAccessor for RandomGuard {
    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek_to(pos)
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn len(&self) -> io::Result<u64> {
        self.inner.len()
    }

    fn set_len(&mut self, new_len: u64) -> io::Result<()> {
        self.inner.set_len(new_len)
    }
}

// =============================================================================
// ContentAccessor
// =============================================================================

/// Streaming and random-access view over one resource's content.
///
/// Exactly one accessor exists per handle (lazily built, reused across
/// calls). It holds the provider node and the filesystem, never the
/// handle itself.
pub struct ContentAccessor {
    name: FileName,
    node: Arc<dyn ProviderNode>,
    fs: Arc<FileSystem>,
    open_streams: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl ContentAccessor {
    pub(crate) fn new(name: FileName, node: Arc<dyn ProviderNode>, fs: Arc<FileSystem>) -> Self {
        Self {
            name,
            node,
            fs,
            open_streams: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
        }
    }

    /// The name of the resource this accessor reads and writes.
    pub fn name(&self) -> &FileName {
        &self.name
    }

    fn ensure_open(&self) -> VfsResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(VfsError::Closed {
                uri: self.name.friendly_uri(),
            });
        }
        Ok(())
    }

    /// The content size in bytes.
    pub fn size(&self) -> VfsResult<u64> {
        self.ensure_open()?;
        self.node
            .content_size()
            .map_err(|e| VfsError::backing("get-size", &self.name, e))
    }

    /// The last-modified time of the content.
    pub fn last_modified(&self) -> VfsResult<DateTime<Utc>> {
        self.ensure_open()?;
        self.fs
            .require_capability(Capability::GetLastModified, &self.name)?;
        self.node
            .last_modified()
            .map_err(|e| VfsError::backing("get-last-modified", &self.name, e))
    }

    /// Set the last-modified time of the content.
    pub fn set_last_modified(&self, when: DateTime<Utc>) -> VfsResult<()> {
        self.ensure_open()?;
        self.fs
            .require_capability(Capability::SetLastModified, &self.name)?;
        self.node
            .set_last_modified(when)
            .map_err(|e| VfsError::backing("set-last-modified", &self.name, e))
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Look up an attribute of this resource.
    pub fn attribute(&self, attr: &str) -> Option<Value> {
        self.fs.attributes().get(&self.name, attr)
    }

    /// Whether an attribute is present.
    pub fn has_attribute(&self, attr: &str) -> bool {
        self.fs.attributes().has(&self.name, attr)
    }

    /// All attributes of this resource.
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.fs.attributes().get_all(&self.name)
    }

    /// Store an attribute on this resource.
    pub fn set_attribute(&self, attr: &str, value: Value, read_only: bool) -> VfsResult<()> {
        self.fs.attributes().set(&self.name, attr, value, read_only)
    }

    /// Remove an attribute from this resource.
    pub fn remove_attribute(&self, attr: &str) -> VfsResult<()> {
        self.fs.attributes().remove(&self.name, attr)
    }

    // =========================================================================
    // Streams
    // =========================================================================

    /// Open a stream reading the content from the start.
    pub fn input(&self) -> VfsResult<Box<dyn Read + Send>> {
        self.ensure_open()?;
        self.fs.require_capability(Capability::ReadContent, &self.name)?;
        let inner = self
            .node
            .open_input()
            .map_err(|e| VfsError::backing("read", &self.name, e))?;
        Ok(Box::new(InputGuard {
            inner,
            _tracker: StreamTracker::new(Arc::clone(&self.fs), Arc::clone(&self.open_streams)),
        }))
    }

    /// Open a stream writing the content, truncating unless `append`.
    pub fn output(&self, append: bool) -> VfsResult<Box<dyn Write + Send>> {
        self.ensure_open()?;
        self.fs.require_capability(Capability::WriteContent, &self.name)?;
        if append {
            self.fs
                .require_capability(Capability::AppendContent, &self.name)?;
        }
        let inner = self
            .node
            .open_output(append)
            .map_err(|e| VfsError::backing("write", &self.name, e))?;
        Ok(Box::new(OutputGuard {
            inner,
            _tracker: StreamTracker::new(Arc::clone(&self.fs), Arc::clone(&self.open_streams)),
        }))
    }

    /// Open random-access content in the given mode.
    pub fn random(&self, mode: RandomAccessMode) -> VfsResult<Box<dyn RandomAccessor>> {
        self.ensure_open()?;
        self.fs
            .require_capability(Capability::RandomAccessRead, &self.name)?;
        if mode.requires_write() {
            self.fs
                .require_capability(Capability::RandomAccessWrite, &self.name)?;
        }
        let inner = self
            .node
            .open_random(mode)
            .map_err(|e| VfsError::backing("random-access", &self.name, e))?;
        Ok(Box::new(RandomGuard {
            inner,
            _tracker: StreamTracker::new(Arc::clone(&self.fs), Arc::clone(&self.open_streams)),
        }))
    }

    /// Copy the whole content into `out`, returning the byte count.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> VfsResult<u64> {
        let mut input = self.input()?;
        Ok(io::copy(&mut input, out)?)
    }

    /// Read the whole content into memory.
    pub fn read_all(&self) -> VfsResult<Vec<u8>> {
        let mut input = self.input()?;
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Whether any stream opened through this accessor is still open.
    pub fn is_open(&self) -> bool {
        self.open_streams.load(Ordering::SeqCst) > 0
    }

    /// Close the accessor. New streams are refused afterwards; streams
    /// already handed out drain through their guards. Idempotent.
    pub fn close(&self) -> VfsResult<()> {
        self.closed.swap(true, Ordering::SeqCst);
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
    use crate::provider::memory::MemoryProvider;
    use crate::provider::CapabilitySet;

    fn memfs() -> Arc<FileSystem> {
        FileSystemBuilder::new()
            .provider(Arc::new(MemoryProvider::new("mem")))
            .build()
    }

    #[test]
    fn test_write_then_read() {
        let fs = memfs();
        let file = fs.resolve("/data.bin").unwrap();
        file.create(false).unwrap();

        let accessor = file.content().unwrap();
        {
            let mut out = accessor.output(false).unwrap();
            out.write_all(b"hello bytes").unwrap();
        }
        assert_eq!(accessor.read_all().unwrap(), b"hello bytes");
        assert_eq!(accessor.size().unwrap(), 11);
    }

    #[test]
    fn test_append() {
        let fs = memfs();
        let file = fs.resolve("/log.txt").unwrap();
        file.create(false).unwrap();
        let accessor = file.content().unwrap();
        accessor.output(false).unwrap().write_all(b"one").unwrap();
        accessor.output(true).unwrap().write_all(b",two").unwrap();
        assert_eq!(accessor.read_all().unwrap(), b"one,two");
    }

    #[test]
    fn test_stream_counters() {
        let fs = memfs();
        let file = fs.resolve("/data").unwrap();
        file.create(false).unwrap();
        let accessor = file.content().unwrap();

        assert!(!accessor.is_open());
        assert!(!fs.is_open());
        {
            let _input = accessor.input().unwrap();
            assert!(accessor.is_open());
            assert!(fs.is_open());
        }
        assert!(!accessor.is_open());
        assert!(!fs.is_open());
    }

    #[test]
    fn test_accessor_is_reused() {
        let fs = memfs();
        let file = fs.resolve("/data").unwrap();
        file.create(false).unwrap();
        let a = file.content().unwrap();
        let b = file.content().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_closed_accessor_refuses_streams() {
        let fs = memfs();
        let file = fs.resolve("/data").unwrap();
        file.create(false).unwrap();
        let accessor = file.content().unwrap();
        accessor.close().unwrap();
        accessor.close().unwrap();
        assert!(matches!(
            accessor.input().err().unwrap(),
            VfsError::Closed { .. }
        ));
    }

    #[test]
    fn test_random_access() {
        let fs = memfs();
        let file = fs.resolve("/data").unwrap();
        file.create(false).unwrap();
        let accessor = file.content().unwrap();
        accessor
            .output(false)
            .unwrap()
            .write_all(b"0123456789")
            .unwrap();

        let mut random = accessor.random(RandomAccessMode::ReadWrite).unwrap();
        random.seek_to(4).unwrap();
        let mut buf = [0u8; 3];
        random.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"456");
        assert_eq!(random.position(), 7);

        random.seek_to(0).unwrap();
        random.write_all(b"xx").unwrap();
        drop(random);
        assert_eq!(accessor.read_all().unwrap(), b"xx23456789");
    }

    #[test]
    fn test_capability_gating() {
        let caps = CapabilitySet::all()
            .without(Capability::AppendContent)
            .without(Capability::RandomAccessRead);
        let fs = FileSystemBuilder::new()
            .provider(Arc::new(MemoryProvider::with_capabilities("mem", caps)))
            .build();
        let file = fs.resolve("/data").unwrap();
        file.create(false).unwrap();
        let accessor = file.content().unwrap();

        assert!(matches!(
            accessor.output(true).err().unwrap(),
            VfsError::CapabilityUnsupported { .. }
        ));
        assert!(matches!(
            accessor.random(RandomAccessMode::Read).err().unwrap(),
            VfsError::CapabilityUnsupported { .. }
        ));
        // Plain writes are still allowed.
        accessor.output(false).unwrap().write_all(b"ok").unwrap();
    }

    #[test]
    fn test_last_modified_round_trip() {
        let fs = memfs();
        let file = fs.resolve("/data").unwrap();
        file.create(false).unwrap();
        let accessor = file.content().unwrap();

        let when = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        accessor.set_last_modified(when).unwrap();
        assert_eq!(accessor.last_modified().unwrap(), when);
    }
}
