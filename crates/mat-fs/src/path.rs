//! Normalized path handling for cross-platform compatibility

use std::path::{Path, PathBuf};

/// A path normalized to use forward slashes internally.
///
/// Paths are cleaned lexically on construction: repeated separators and `.`
/// segments are dropped, `..` is resolved against preceding segments where
/// possible and trailing separators are removed. A leading `//` is kept so
/// network paths stay recognizable.
///
/// The empty path denotes the root that a relative path is resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        Self {
            inner: clean(&raw),
        }
    }

    /// The empty (root-relative) path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// True for the empty root-relative path.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a segment.
    pub fn join(&self, segment: &str) -> Self {
        if segment.is_empty() {
            return self.clone();
        }
        if self.inner.is_empty() {
            return Self::new(segment);
        }
        Self::new(format!("{}/{}", self.inner, segment))
    }

    /// The `/` or `//` prefix of an absolute or network path, empty otherwise.
    pub fn root_prefix(&self) -> &str {
        if self.is_network_path() {
            "//"
        } else if self.inner.starts_with('/') {
            "/"
        } else {
            ""
        }
    }

    /// Iterate over the path segments, excluding any root prefix.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments in the path.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Get the parent directory.
    ///
    /// A single relative segment has the empty root as parent; the root
    /// itself has none.
    pub fn parent(&self) -> Option<Self> {
        let segments: Vec<&str> = self.segments().collect();
        if segments.is_empty() {
            return None;
        }
        Some(Self::from_parts(
            self.root_prefix(),
            &segments[..segments.len() - 1],
        ))
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// File name without its extension.
    pub fn file_stem(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(idx) if idx > 0 => Some(&name[..idx]),
            _ => Some(name),
        }
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }

    /// Remove `base` from the front of this path, segment-wise.
    pub fn strip_prefix(&self, base: &NormalizedPath) -> Option<Self> {
        if self.root_prefix() != base.root_prefix() {
            return None;
        }
        let mut own = self.segments();
        for segment in base.segments() {
            if own.next() != Some(segment) {
                return None;
            }
        }
        let rest: Vec<&str> = own.collect();
        Some(Self::from_parts("", &rest))
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Check if this appears to be a network path (`//server/share`).
    pub fn is_network_path(&self) -> bool {
        self.inner.starts_with("//") && !self.inner.starts_with("///")
    }

    /// True if this is a non-empty relative path that, joined onto any
    /// directory, names something inside that directory.
    ///
    /// Absolute, network and drive-qualified paths are not confined, nor is
    /// a path whose cleaned form still starts with `..`.
    pub fn is_confined(&self) -> bool {
        if !self.root_prefix().is_empty() {
            return false;
        }
        match self.segments().next() {
            Some(first) => first != ".." && !first.contains(':'),
            None => false,
        }
    }

    pub(crate) fn from_parts(prefix: &str, segments: &[&str]) -> Self {
        Self {
            inner: format!("{}{}", prefix, segments.join("/")),
        }
    }
}

/// Lexically clean a forward-slash path string.
fn clean(raw: &str) -> String {
    let network = raw.starts_with("//") && !raw.starts_with("///");
    let absolute = raw.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let body = parts.join("/");
    if network {
        format!("//{}", body)
    } else if absolute {
        format!("/{}", body)
    } else {
        body
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}
