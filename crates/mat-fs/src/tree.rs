//! Pure path/tree helpers.
//!
//! All relations are computed segment-wise on [`NormalizedPath`], so `a` is
//! never considered a parent of `ab/c`. Nothing here touches the filesystem.

use crate::NormalizedPath;

/// Result of comparing two paths against their longest common ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDiff {
    /// Deepest directory both paths live under (empty for unrelated
    /// relative paths).
    pub common: NormalizedPath,
    /// Segments of the left path below `common`.
    pub left: Vec<String>,
    /// Segments of the right path below `common`.
    pub right: Vec<String>,
}

impl PathDiff {
    /// True when the left path is the common ancestor itself, i.e. it is
    /// equal to or a parent of the right path.
    pub fn left_contains_right(&self) -> bool {
        self.left.is_empty()
    }
}

/// Returns true if `parent` is a strict ancestor of `child`.
pub fn is_parent_of(parent: &NormalizedPath, child: &NormalizedPath) -> bool {
    if parent.root_prefix() != child.root_prefix() {
        return false;
    }
    let mut child_segments = child.segments();
    for segment in parent.segments() {
        if child_segments.next() != Some(segment) {
            return false;
        }
    }
    child_segments.next().is_some()
}

/// Returns true if `parent` equals `child` or is one of its ancestors.
pub fn is_same_or_parent_of(parent: &NormalizedPath, child: &NormalizedPath) -> bool {
    parent == child || is_parent_of(parent, child)
}

/// Split two paths at their longest common ancestor.
pub fn diff(left: &NormalizedPath, right: &NormalizedPath) -> PathDiff {
    let prefix = if left.root_prefix() == right.root_prefix() {
        left.root_prefix()
    } else {
        ""
    };

    let left_segments: Vec<&str> = left.segments().collect();
    let right_segments: Vec<&str> = right.segments().collect();

    let shared = if left.root_prefix() == right.root_prefix() {
        left_segments
            .iter()
            .zip(right_segments.iter())
            .take_while(|(a, b)| a == b)
            .count()
    } else {
        0
    };

    PathDiff {
        common: NormalizedPath::from_parts(prefix, &left_segments[..shared]),
        left: left_segments[shared..].iter().map(|s| s.to_string()).collect(),
        right: right_segments[shared..].iter().map(|s| s.to_string()).collect(),
    }
}

/// Collapse a set of paths to its minimal set of maximal paths.
///
/// Duplicates are removed and any path that is an ancestor of another member
/// is dropped. The result is sorted segment-wise.
pub fn merge_paths<I>(paths: I) -> Vec<NormalizedPath>
where
    I: IntoIterator<Item = NormalizedPath>,
{
    let mut sorted: Vec<NormalizedPath> = paths.into_iter().collect();
    sorted.sort_by(|a, b| {
        a.root_prefix()
            .cmp(b.root_prefix())
            .then_with(|| a.segments().cmp(b.segments()))
    });
    sorted.dedup();

    // Descendants of a path sort directly after it, so only the next
    // element needs checking.
    let mut merged = Vec::with_capacity(sorted.len());
    for (idx, path) in sorted.iter().enumerate() {
        let shadowed = sorted
            .get(idx + 1)
            .is_some_and(|next| is_parent_of(path, next));
        if !shadowed {
            merged.push(path.clone());
        }
    }
    merged
}

/// Strict ancestors of `path` that have at least one segment, deepest first.
pub fn ancestors(path: &NormalizedPath) -> Vec<NormalizedPath> {
    let segments: Vec<&str> = path.segments().collect();
    (1..segments.len())
        .rev()
        .map(|len| NormalizedPath::from_parts(path.root_prefix(), &segments[..len]))
        .collect()
}
