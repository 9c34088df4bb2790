//! SyncEngine implementation
//!
//! The SyncEngine owns the cache of what was last materialized under the
//! destination root and the queue of write intents for the current cycle.
//! A commit diffs the queue against the cache, writes or merges what
//! changed, deletes what disappeared and prunes directories left empty.

use std::collections::{BTreeSet, HashMap};

use mat_fs::io;
use mat_fs::{NormalizedPath, compute_entry_checksum, is_same_or_parent_of, merge_paths};
use mat_pragma::{MergeOptions, Pragma};

use super::cache::{Cache, CacheEntry, EntryStatus};
use super::tree_view;
use crate::Result;
use crate::matcher::{IgnoreMatcher, NoIgnore};

/// A scheduled write, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    /// Path relative to the engine root.
    pub path: NormalizedPath,
    pub content: Vec<u8>,
    /// Entry checksum of `path` and `content` together.
    pub hash: String,
}

impl PendingAction {
    pub fn new(path: NormalizedPath, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        let hash = compute_entry_checksum(path.as_str(), &content);
        Self {
            path,
            content,
            hash,
        }
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Force every commit to be a dry run.
    pub dry_run: bool,
    /// Files and directories starting with this prefix are skipped by mount.
    pub private_prefix: String,
    pub pragma: Pragma,
    pub merge: MergeOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            private_prefix: "_".to_string(),
            pragma: Pragma::default(),
            merge: MergeOptions::default(),
        }
    }
}

/// Options for a single commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    /// Update bookkeeping without touching the filesystem.
    pub dry_run: bool,
    /// Rewrite changed files outright instead of merging protected regions.
    pub force_clean: bool,
}

impl CommitOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

/// What a commit did, paths relative to the engine root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Files that did not exist in the previous cache.
    pub created: Vec<NormalizedPath>,
    /// Files whose content changed.
    pub updated: Vec<NormalizedPath>,
    /// Files whose content matched the previous cache; not written.
    pub unchanged: Vec<NormalizedPath>,
    /// Files dropped from the cache and removed from disk.
    pub deleted: Vec<NormalizedPath>,
    /// Directories removed because they were left empty.
    pub pruned: Vec<NormalizedPath>,
    /// Scheduled paths that resolve outside the root; never written or cached.
    pub rejected: Vec<NormalizedPath>,
    pub dry_run: bool,
}

impl CommitReport {
    /// Number of files written (or that would be written in a dry run).
    pub fn writes(&self) -> usize {
        self.created.len() + self.updated.len()
    }

    /// True if the commit changed nothing.
    pub fn is_noop(&self) -> bool {
        self.writes() == 0 && self.deleted.is_empty() && self.pruned.is_empty()
    }
}

/// Virtual file-sync engine for one destination tree.
pub struct SyncEngine {
    /// Directory all cache paths are relative to
    root: NormalizedPath,
    cache: Cache,
    pending: Vec<PendingAction>,
    /// Paths whose cache entries survive the next commit unscheduled
    retained: Vec<NormalizedPath>,
    options: EngineOptions,
    matcher: Box<dyn IgnoreMatcher>,
}

impl SyncEngine {
    /// Create an engine with an empty cache.
    pub fn new(root: NormalizedPath, options: EngineOptions) -> Self {
        Self {
            root,
            cache: Cache::new(),
            pending: Vec::new(),
            retained: Vec::new(),
            options,
            matcher: Box::new(NoIgnore),
        }
    }

    /// Skip paths the matcher rejects when mounting.
    pub fn with_matcher(mut self, matcher: impl IgnoreMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn pending(&self) -> &[PendingAction] {
        &self.pending
    }

    /// Queue a write of `content` to `path` (relative to the root).
    ///
    /// A path that is absolute or climbs out of the root is still queued but
    /// the commit rejects it; see [`CommitReport::rejected`].
    pub fn schedule(&mut self, path: impl Into<NormalizedPath>, content: impl Into<Vec<u8>>) {
        let action = PendingAction::new(path.into(), content);
        tracing::debug!(path = %action.path, hash = %action.hash, "Scheduled write");
        self.pending.push(action);
    }

    /// Keep the cached entry for `path` through the next commit even if it
    /// is not scheduled, so its file is neither rewritten nor deleted.
    ///
    /// Used when the producer of `path` failed this cycle. Has no effect on a
    /// path that is scheduled anyway or not in the cache.
    pub fn retain(&mut self, path: impl Into<NormalizedPath>) {
        self.retained.push(path.into());
    }

    /// Seed an empty cache from the files already under `dest`.
    ///
    /// Files and directories carrying the private prefix, leftover temp
    /// files and ignored paths are skipped. Nothing is written. Returns the
    /// number of files mounted; a non-empty cache is left alone and yields 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be listed or a file cannot be read.
    pub fn mount(&mut self, dest: &NormalizedPath) -> Result<usize> {
        if !self.cache.is_empty() {
            return Ok(0);
        }

        let dest_root = self.root.join(dest.as_str());
        let prefix = self.options.private_prefix.as_str();
        let matcher = &self.matcher;
        let files = io::list_files(&dest_root, |rel, is_dir| {
            let Some(name) = rel.file_name() else {
                return false;
            };
            if name.starts_with(prefix) || matcher.is_ignored(&dest.join(rel.as_str())) {
                return false;
            }
            is_dir || !is_temp_file(name)
        })?;

        let mut mounted = Vec::with_capacity(files.len());
        for rel in &files {
            let path = dest.join(rel.as_str());
            let content = io::read_bytes(&self.root.join(path.as_str()))?;
            mounted.push(PendingAction::new(path, content));
        }

        let queued = std::mem::replace(&mut self.pending, mounted);
        let result = self.commit(CommitOptions::dry_run());
        self.pending = queued;
        result?;

        tracing::info!(dest = %dest, files = files.len(), "Mounted destination");
        Ok(files.len())
    }

    /// Apply every pending action and make the result the new cache.
    ///
    /// Actions run one at a time in schedule order; for a path scheduled
    /// more than once the last content wins. Unchanged files are not
    /// touched, changed files are merged so protected regions survive, new
    /// files are written outright. Files missing from this cycle are
    /// deleted afterwards and directories left empty are pruned. Actions
    /// whose path is not confined to the root are dropped and reported as
    /// rejected.
    ///
    /// # Errors
    ///
    /// The first failing write, merge or delete aborts the commit. The
    /// pending queue is consumed and the cache is left empty so the next
    /// cycle re-diffs from scratch.
    pub fn commit(&mut self, options: CommitOptions) -> Result<CommitReport> {
        let dry_run = options.dry_run || self.options.dry_run;
        let (pending, rejected): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|action| action.path.is_confined());
        let retained = std::mem::take(&mut self.retained);
        let old_cache = std::mem::take(&mut self.cache);

        for action in &rejected {
            tracing::warn!(path = %action.path, root = %self.root, "Rejected write outside the root");
        }

        match self.apply(pending, retained, &old_cache, dry_run, options.force_clean) {
            Ok((new_cache, mut report)) => {
                report.rejected = rejected.into_iter().map(|action| action.path).collect();
                tracing::debug!(
                    created = report.created.len(),
                    updated = report.updated.len(),
                    deleted = report.deleted.len(),
                    pruned = report.pruned.len(),
                    dry_run,
                    "Commit finished"
                );
                self.cache = new_cache;
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "Commit aborted; cache cleared");
                Err(e)
            }
        }
    }

    /// Render the cache as a tree, optionally with each entry's hash.
    pub fn ls(&self, show_hash: bool) -> String {
        tree_view::render(&self.cache, show_hash)
    }

    /// Forget everything materialized so far.
    pub fn clear_cache(&mut self) {
        tracing::debug!(entries = self.cache.len(), "Clearing cache");
        self.cache = Cache::new();
    }

    fn apply(
        &self,
        pending: Vec<PendingAction>,
        retained: Vec<NormalizedPath>,
        old_cache: &Cache,
        dry_run: bool,
        force_clean: bool,
    ) -> Result<(Cache, CommitReport)> {
        let mut new_cache = Cache::new();
        let mut report = CommitReport {
            dry_run,
            ..CommitReport::default()
        };

        for action in last_write_wins(pending) {
            let status = match old_cache.get(&action.path) {
                Some(old) if old.hash == action.hash => {
                    tracing::debug!(path = %action.path, "Unchanged; skipping write");
                    report.unchanged.push(action.path.clone());
                    EntryStatus::Unchanged
                }
                Some(_) => {
                    if !dry_run {
                        self.update_file(&action, force_clean)?;
                    }
                    report.updated.push(action.path.clone());
                    EntryStatus::Updated
                }
                None => {
                    if !dry_run {
                        self.write_file(&action)?;
                    }
                    report.created.push(action.path.clone());
                    EntryStatus::New
                }
            };

            let status = if dry_run { EntryStatus::Unchanged } else { status };
            new_cache.upsert(CacheEntry::new(action.path, action.hash).with_status(status));
        }

        for path in retained {
            if new_cache.contains(&path) {
                continue;
            }
            if let Some(old) = old_cache.get(&path) {
                tracing::debug!(path = %path, "Retained without regeneration");
                new_cache.upsert(CacheEntry::new(path.clone(), old.hash.clone()));
                report.unchanged.push(path);
            }
        }

        for entry in old_cache.iter() {
            if new_cache.contains(&entry.path) {
                continue;
            }
            if !dry_run {
                io::remove_file(&self.root.join(entry.path.as_str()))?;
            }
            tracing::debug!(path = %entry.path, dry_run, "Deleted stale file");
            report.deleted.push(entry.path.clone());
        }

        if !dry_run {
            report.pruned = self.prune_empty_dirs(&report.deleted, &new_cache)?;
        }

        Ok((new_cache, report))
    }

    fn write_file(&self, action: &PendingAction) -> Result<()> {
        let target = self.root.join(action.path.as_str());
        io::write_atomic(&target, &action.content, self.options.merge.robustness)?;
        tracing::debug!(path = %action.path, bytes = action.content.len(), "Wrote new file");
        Ok(())
    }

    fn update_file(&self, action: &PendingAction, force_clean: bool) -> Result<()> {
        let target = self.root.join(action.path.as_str());
        let text = match std::str::from_utf8(&action.content) {
            Ok(text) if !force_clean => text,
            _ => {
                io::write_atomic(&target, &action.content, self.options.merge.robustness)?;
                tracing::debug!(path = %action.path, "Rewrote file");
                return Ok(());
            }
        };

        let outcome = mat_pragma::merge_file(&target, text, &self.options.pragma, &self.options.merge)?;
        tracing::debug!(
            path = %action.path,
            preserved = outcome.preserved.len(),
            "Merged file"
        );
        Ok(())
    }

    /// Remove directories emptied by `deleted`, deepest first.
    ///
    /// A directory is a candidate if it held a deleted file or is an
    /// ancestor of one. Candidates that are the same as or above a directory
    /// still holding a live entry are kept, as is the engine root. Only
    /// directories that are actually empty on disk are removed.
    fn prune_empty_dirs(
        &self,
        deleted: &[NormalizedPath],
        live: &Cache,
    ) -> Result<Vec<NormalizedPath>> {
        if deleted.is_empty() {
            return Ok(Vec::new());
        }

        let live_dirs = merge_paths(live.paths().filter_map(NormalizedPath::parent));

        let mut candidates: BTreeSet<NormalizedPath> = BTreeSet::new();
        for path in deleted {
            candidates.extend(mat_fs::ancestors(path));
        }

        let mut candidates: Vec<NormalizedPath> = candidates
            .into_iter()
            .filter(|dir| !live_dirs.iter().any(|live| is_same_or_parent_of(dir, live)))
            .collect();
        candidates.sort_by_key(|dir| std::cmp::Reverse(dir.depth()));

        let mut pruned = Vec::new();
        for dir in candidates {
            if io::remove_empty_dir(&self.root.join(dir.as_str()))? {
                tracing::debug!(dir = %dir, "Pruned empty directory");
                pruned.push(dir);
            }
        }
        Ok(pruned)
    }
}

/// Collapse repeated paths: first-seen order, last-seen content.
fn last_write_wins(pending: Vec<PendingAction>) -> Vec<PendingAction> {
    let mut slots: HashMap<NormalizedPath, usize> = HashMap::new();
    let mut actions: Vec<PendingAction> = Vec::with_capacity(pending.len());
    for action in pending {
        match slots.get(&action.path) {
            Some(&idx) => actions[idx] = action,
            None => {
                slots.insert(action.path.clone(), actions.len());
                actions.push(action);
            }
        }
    }
    actions
}

/// Leftover temp sibling from an interrupted atomic write.
fn is_temp_file(name: &str) -> bool {
    name.strip_prefix('.')
        .and_then(|rest| rest.strip_suffix(".tmp"))
        .is_some_and(|base| !base.is_empty())
}
