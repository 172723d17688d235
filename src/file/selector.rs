//! File selection and traversal.
//!
//! A [`FileSelector`] steers the recursive walk over a handle's subtree:
//! `visit` decides whether to descend into a folder, `select` whether the
//! node joins the result. Traversal is pre-order with children handled
//! before the node's own selection, so depth-first results list children
//! before their parents, which is exactly what recursive deletion needs.

use std::sync::Arc;

use regex::Regex;

use crate::error::VfsResult;
use crate::file::FileObject;
use crate::name::FileType;

// =============================================================================
// FileInfo and FileSelector
// =============================================================================

/// Context handed to a selector for one node of the traversal.
pub struct FileInfo {
    pub(crate) base: Option<Arc<FileObject>>,
    pub(crate) file: Arc<FileObject>,
    pub(crate) depth: usize,
}

impl FileInfo {
    /// The folder the traversal started from, if any.
    pub fn base_folder(&self) -> Option<&Arc<FileObject>> {
        self.base.as_ref()
    }

    /// The node currently being visited.
    pub fn file(&self) -> &Arc<FileObject> {
        &self.file
    }

    /// Depth of the current node relative to the base (base = 0).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Decides which files a traversal descends into and which it selects.
pub trait FileSelector: Send + Sync {
    /// Whether to descend into the children of a container node.
    fn visit(&self, info: &FileInfo) -> bool;

    /// Whether to include this node in the result.
    fn select(&self, info: &FileInfo) -> VfsResult<bool>;
}

/// Walk `info.file`'s subtree, collecting selected nodes into `selected`.
///
/// Depth-first callers get matches appended at the end; breadth-first
/// callers get each match inserted at the position the node's recursion
/// started, preserving encounter order per level.
pub(crate) fn traverse(
    info: &mut FileInfo,
    selector: &dyn FileSelector,
    depth_first: bool,
    selected: &mut Vec<Arc<FileObject>>,
) -> VfsResult<()> {
    let file = Arc::clone(&info.file);
    let index = selected.len();

    if file.file_type()?.has_children() && selector.visit(info) {
        info.depth += 1;
        for child in file.children()? {
            info.file = child;
            traverse(info, selector, depth_first, selected)?;
        }
        info.file = Arc::clone(&file);
        info.depth -= 1;
    }

    if selector.select(info)? {
        if depth_first {
            selected.push(file);
        } else {
            selected.insert(index, file);
        }
    }

    Ok(())
}

// =============================================================================
// Stock selectors
// =============================================================================

/// Selects nodes whose depth falls into an inclusive range.
#[derive(Debug, Clone, Copy)]
pub struct DepthRangeSelector {
    min: usize,
    max: usize,
}

impl DepthRangeSelector {
    /// Select depths in `min..=max`.
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Select only the base itself.
    pub fn self_only() -> Self {
        Self::new(0, 0)
    }

    /// Select only direct children.
    pub fn children() -> Self {
        Self::new(1, 1)
    }

    /// Select the base and its direct children.
    pub fn self_and_children() -> Self {
        Self::new(0, 1)
    }

    /// Select the whole subtree except the base itself.
    pub fn exclude_self() -> Self {
        Self::new(1, usize::MAX)
    }
}

impl FileSelector for DepthRangeSelector {
    fn visit(&self, info: &FileInfo) -> bool {
        info.depth <= self.max
    }

    fn select(&self, info: &FileInfo) -> VfsResult<bool> {
        Ok(info.depth >= self.min && info.depth <= self.max)
    }
}

/// Selects every node of the subtree, the base included.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllSelector;

impl FileSelector for AllSelector {
    fn visit(&self, _info: &FileInfo) -> bool {
        true
    }

    fn select(&self, _info: &FileInfo) -> VfsResult<bool> {
        Ok(true)
    }
}

/// Selects nodes by their [`FileType`].
#[derive(Debug, Clone, Copy)]
pub struct TypeSelector {
    kind: FileType,
}

impl TypeSelector {
    /// Select nodes of the given type.
    pub fn new(kind: FileType) -> Self {
        Self { kind }
    }

    /// Select only regular files.
    pub fn files() -> Self {
        Self::new(FileType::File)
    }

    /// Select only folders.
    pub fn folders() -> Self {
        Self::new(FileType::Folder)
    }
}

impl FileSelector for TypeSelector {
    fn visit(&self, _info: &FileInfo) -> bool {
        true
    }

    fn select(&self, info: &FileInfo) -> VfsResult<bool> {
        Ok(info.file().file_type()? == self.kind)
    }
}

/// Selects nodes whose full path matches a regular expression.
pub struct PatternSelector {
    pattern: Regex,
}

impl PatternSelector {
    /// Select paths matching a pre-built pattern.
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }

    /// Compile `pattern` and select paths matching it.
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(Regex::new(pattern)?))
    }
}

impl FileSelector for PatternSelector {
    fn visit(&self, _info: &FileInfo) -> bool {
        true
    }

    fn select(&self, info: &FileInfo) -> VfsResult<bool> {
        Ok(self.pattern.is_match(&info.file().name().path()))
    }
}

/// Selects files by extension, case-insensitively.
pub struct ExtensionSelector {
    extensions: Vec<String>,
}

impl ExtensionSelector {
    /// Select files carrying any of `extensions`.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.into().to_lowercase())
                .collect(),
        }
    }
}

impl FileSelector for ExtensionSelector {
    fn visit(&self, _info: &FileInfo) -> bool {
        true
    }

    fn select(&self, info: &FileInfo) -> VfsResult<bool> {
        let extension = info.file().name().extension().to_lowercase();
        Ok(self.extensions.iter().any(|ext| *ext == extension))
    }
}

/// Inverts the selection of a delegate selector, visiting what it visits.
pub struct NotSelector {
    inner: Box<dyn FileSelector>,
}

impl NotSelector {
    /// Select exactly what `inner` does not.
    pub fn new(inner: Box<dyn FileSelector>) -> Self {
        Self { inner }
    }
}

impl FileSelector for NotSelector {
    fn visit(&self, info: &FileInfo) -> bool {
        self.inner.visit(info)
    }

    fn select(&self, info: &FileInfo) -> VfsResult<bool> {
        Ok(!self.inner.select(info)?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileSystem;
    use crate::provider::memory::MemoryProvider;

    fn populated_fs() -> Arc<FileSystem> {
        let fs = FileSystem::builder()
            .provider(Arc::new(MemoryProvider::new("mem")))
            .build();
        for folder in ["/a", "/a/sub"] {
            fs.resolve(folder).unwrap().create(true).unwrap();
        }
        for file in ["/a/one.txt", "/a/two.rs", "/a/sub/three.txt"] {
            fs.resolve(file).unwrap().create(false).unwrap();
        }
        fs
    }

    fn paths(files: &[Arc<FileObject>]) -> Vec<String> {
        files.iter().map(|f| f.name().path().to_string()).collect()
    }

    #[test]
    fn test_all_selector_depth_first_children_before_parent() {
        let fs = populated_fs();
        let base = fs.resolve("/a").unwrap();
        let found = base.find_files(&AllSelector, true).unwrap();
        let found = paths(&found);

        // Children precede their parents; the base comes last.
        assert_eq!(found.last().map(String::as_str), Some("/a"));
        let sub = found.iter().position(|p| p == "/a/sub").unwrap();
        let three = found.iter().position(|p| p == "/a/sub/three.txt").unwrap();
        assert!(three < sub);
    }

    #[test]
    fn test_all_selector_breadth_first_parent_before_children() {
        let fs = populated_fs();
        let base = fs.resolve("/a").unwrap();
        let found = base.find_files(&AllSelector, false).unwrap();
        let found = paths(&found);

        assert_eq!(found.first().map(String::as_str), Some("/a"));
        let sub = found.iter().position(|p| p == "/a/sub").unwrap();
        let three = found.iter().position(|p| p == "/a/sub/three.txt").unwrap();
        assert!(sub < three);
    }

    #[test]
    fn test_depth_range_selector() {
        let fs = populated_fs();
        let base = fs.resolve("/a").unwrap();

        let only_self = base
            .find_files(&DepthRangeSelector::self_only(), true)
            .unwrap();
        assert_eq!(paths(&only_self), vec!["/a"]);

        let children = base
            .find_files(&DepthRangeSelector::children(), true)
            .unwrap();
        let mut children = paths(&children);
        children.sort();
        assert_eq!(children, vec!["/a/one.txt", "/a/sub", "/a/two.rs"]);

        let exclude_self = base
            .find_files(&DepthRangeSelector::exclude_self(), true)
            .unwrap();
        assert_eq!(exclude_self.len(), 4);
    }

    #[test]
    fn test_type_selector() {
        let fs = populated_fs();
        let base = fs.resolve("/a").unwrap();
        let folders = base.find_files(&TypeSelector::folders(), true).unwrap();
        let mut folders = paths(&folders);
        folders.sort();
        assert_eq!(folders, vec!["/a", "/a/sub"]);

        let files = base.find_files(&TypeSelector::files(), true).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_pattern_selector() {
        let fs = populated_fs();
        let base = fs.resolve("/a").unwrap();
        let selector = PatternSelector::compile(r".*\.txt$").unwrap();
        let mut found = paths(&base.find_files(&selector, true).unwrap());
        found.sort();
        assert_eq!(found, vec!["/a/one.txt", "/a/sub/three.txt"]);
    }

    #[test]
    fn test_extension_selector_is_case_insensitive() {
        let fs = populated_fs();
        let base = fs.resolve("/a").unwrap();
        let selector = ExtensionSelector::new(["TXT"]);
        let found = base.find_files(&selector, true).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_not_selector() {
        let fs = populated_fs();
        let base = fs.resolve("/a").unwrap();
        let selector = NotSelector::new(Box::new(TypeSelector::folders()));
        let found = base.find_files(&selector, true).unwrap();
        // Everything that is not a folder: the three files.
        assert_eq!(found.len(), 3);
    }
}
