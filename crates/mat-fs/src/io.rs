//! Atomic I/O operations with file locking

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;
use walkdir::WalkDir;

use crate::{Error, NormalizedPath, Result};

/// Tuning knobs for atomic writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// How long to keep retrying a contended temp-file lock.
    pub lock_timeout: Duration,
    /// Whether to fsync the temp file before renaming it into place.
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            enable_fsync: true,
        }
    }
}

/// Name of the temporary sibling used while writing `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    );
    path.with_file_name(temp_name)
}

/// A file written to a temporary sibling and renamed into place on commit.
///
/// Dropping an `AtomicFile` without calling [`AtomicFile::commit`] removes
/// the temporary file and leaves the destination untouched.
pub struct AtomicFile {
    target: PathBuf,
    temp_path: PathBuf,
    writer: Option<BufWriter<File>>,
    robustness: RobustnessConfig,
}

impl AtomicFile {
    /// Open the temporary sibling for `path`, creating parent directories.
    pub fn create(path: &NormalizedPath, robustness: RobustnessConfig) -> Result<Self> {
        let target = path.to_native();

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let temp_path = temp_path_for(&target);
        let temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::io(&temp_path, e))?;

        // Registered before locking so a lock failure still removes the temp file.
        let mut atomic = Self {
            target,
            temp_path,
            writer: None,
            robustness,
        };
        lock_with_retry(&temp_file, &atomic.target, robustness.lock_timeout)?;
        atomic.writer = Some(BufWriter::new(temp_file));
        Ok(atomic)
    }

    /// Destination path this file will be renamed to.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Append bytes to the temporary file.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            Error::io(
                &self.temp_path,
                std::io::Error::other("atomic file already finished"),
            )
        })?;
        writer
            .write_all(bytes)
            .map_err(|e| Error::io(&self.temp_path, e))
    }

    /// Flush, optionally fsync, unlock and rename over the destination.
    pub fn commit(mut self) -> Result<()> {
        let writer = self.writer.take().ok_or_else(|| {
            Error::io(
                &self.temp_path,
                std::io::Error::other("atomic file already finished"),
            )
        })?;
        let file = writer
            .into_inner()
            .map_err(|e| Error::io(&self.temp_path, e.into_error()))?;

        if self.robustness.enable_fsync {
            file.sync_all().map_err(|e| Error::io(&self.temp_path, e))?;
        }

        FileExt::unlock(&file).map_err(|_| Error::LockFailed {
            path: self.target.clone(),
        })?;
        drop(file);

        fs::rename(&self.temp_path, &self.target).map_err(|e| Error::io(&self.target, e))?;
        self.temp_path = PathBuf::new();
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(std::io::Error::other("atomic file already finished")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.temp_path.as_os_str().is_empty() {
            return;
        }
        self.writer = None;
        if let Err(e) = fs::remove_file(&self.temp_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.temp_path.display(), error = %e, "Failed to discard temp file");
        }
    }
}

/// Acquire an exclusive advisory lock, retrying while it is contended.
fn lock_with_retry(file: &File, target: &Path, timeout: Duration) -> Result<()> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(10))
        .with_max_elapsed_time(Some(timeout))
        .build();

    backoff::retry(policy, || {
        FileExt::try_lock_exclusive(file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .map_err(|_| Error::LockFailed {
        path: target.to_path_buf(),
    })
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], robustness: RobustnessConfig) -> Result<()> {
    let mut file = AtomicFile::create(path, robustness)?;
    file.write_all(content)?;
    file.commit()
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read raw bytes from a file.
pub fn read_bytes(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    fs::read(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically with default robustness.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes(), RobustnessConfig::default())
}

/// Remove a file. A file that is already gone is not an error.
pub fn remove_file(path: &NormalizedPath) -> Result<()> {
    let native_path = path.to_native();
    match fs::remove_file(&native_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(&native_path, e)),
    }
}

/// Remove a directory only if it is empty.
///
/// Returns `Ok(false)` when the directory is missing or still has entries.
pub fn remove_empty_dir(path: &NormalizedPath) -> Result<bool> {
    let native_path = path.to_native();
    let mut entries = match fs::read_dir(&native_path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(&native_path, e)),
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(&native_path).map_err(|e| Error::io(&native_path, e))?;
    Ok(true)
}

/// Recursively list files under `root` as root-relative paths, sorted.
///
/// `keep` is consulted for every entry below the root with its relative
/// path and whether it is a directory; rejected directories are not
/// descended into. A missing root yields an empty listing.
pub fn list_files<F>(root: &NormalizedPath, keep: F) -> Result<Vec<NormalizedPath>>
where
    F: Fn(&NormalizedPath, bool) -> bool,
{
    let native_root = root.to_native();
    if !native_root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(&native_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            match entry.path().strip_prefix(&native_root) {
                Ok(rel) => keep(&NormalizedPath::new(rel), entry.file_type().is_dir()),
                Err(_) => false,
            }
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| native_root.clone());
            Error::io(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&native_root)
            .map_err(|e| Error::InvalidPath {
                path: entry.path().to_path_buf(),
                reason: e.to_string(),
            })?;
        files.push(NormalizedPath::new(rel));
    }

    files.sort();
    Ok(files)
}
