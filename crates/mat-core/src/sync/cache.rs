//! Record of the last materialized destination state.

use std::collections::HashMap;

use mat_fs::NormalizedPath;

/// What the last commit did to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryStatus {
    /// Content matched the previous cycle, or the commit was a dry run.
    #[default]
    Unchanged,
    /// The file did not exist in the previous cache and was written.
    New,
    /// The file's content changed and was merged or rewritten.
    Updated,
}

impl EntryStatus {
    /// Annotation shown by [`SyncEngine::ls`](super::SyncEngine::ls).
    pub fn tag(self) -> Option<&'static str> {
        match self {
            EntryStatus::Unchanged => None,
            EntryStatus::New => Some("[new]"),
            EntryStatus::Updated => Some("[updated]"),
        }
    }
}

/// One materialized file: root-relative path and its entry checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: NormalizedPath,
    pub hash: String,
    pub status: EntryStatus,
}

impl CacheEntry {
    pub fn new(path: NormalizedPath, hash: impl Into<String>) -> Self {
        Self {
            path,
            hash: hash.into(),
            status: EntryStatus::Unchanged,
        }
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }
}

/// Insertion-ordered set of cache entries, unique per path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cache {
    entries: Vec<CacheEntry>,
    index: HashMap<NormalizedPath, usize>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &NormalizedPath) -> Option<&CacheEntry> {
        self.index.get(path).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.index.contains_key(path)
    }

    /// Insert `entry`, replacing any entry for the same path in place.
    pub fn upsert(&mut self, entry: CacheEntry) {
        match self.index.get(&entry.path) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.index.insert(entry.path.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn paths(&self) -> impl Iterator<Item = &NormalizedPath> {
        self.entries.iter().map(|entry| &entry.path)
    }
}

impl FromIterator<CacheEntry> for Cache {
    fn from_iter<I: IntoIterator<Item = CacheEntry>>(iter: I) -> Self {
        let mut cache = Cache::new();
        for entry in iter {
            cache.upsert(entry);
        }
        cache
    }
}
