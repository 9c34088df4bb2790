//! Region-preserving merge of newly generated text with the file on disk.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use mat_fs::{AtomicFile, NormalizedPath, RobustnessConfig};

use crate::region::{Region, parse_regions};
use crate::scanner::{DEFAULT_CHUNK_SIZE, RegionScanner};
use crate::{Error, Pragma, Result};

/// Tuning for [`merge_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Read size used when scanning the old file for region bodies.
    pub chunk_size: usize,
    pub robustness: RobustnessConfig,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            robustness: RobustnessConfig::default(),
        }
    }
}

/// What a merge did with each region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// True when the destination did not exist and was written verbatim.
    pub created: bool,
    /// Regions whose on-disk body replaced the generator's proposal.
    pub preserved: Vec<String>,
    /// Regions not found on disk; the generator's body was kept.
    pub passed_through: Vec<String>,
}

#[derive(Clone, Copy)]
enum State<'r> {
    /// Pass generated lines through unchanged.
    Copy,
    /// A start marker was just written; look up its old body.
    Fetching(&'r Region),
    /// Discard generated lines of the open region until its end marker.
    Skipping { end_index: usize },
}

/// Merge `new_content` into the file at `path`, preserving region bodies.
///
/// If `path` does not exist the content is written verbatim. Otherwise the
/// output is streamed to a temporary sibling and renamed over `path` only
/// after the whole stream succeeded; on any error the destination is left
/// untouched.
///
/// # Errors
/// Returns [`Error::DuplicateRegion`] if a region name appears twice in
/// `new_content`, and I/O errors from reading the old file or writing the
/// new one.
pub fn merge_file(
    path: &NormalizedPath,
    new_content: &str,
    pragma: &Pragma,
    options: &MergeOptions,
) -> Result<MergeOutcome> {
    let native = path.to_native();
    let regions = index_regions(new_content, pragma, &native)?;

    let Some(mut scanner) = RegionScanner::open(&native, pragma, options.chunk_size)? else {
        tracing::debug!(%path, "No existing file; writing generated content verbatim");
        mat_fs::io::write_atomic(path, new_content.as_bytes(), options.robustness)?;
        return Ok(MergeOutcome {
            created: true,
            ..MergeOutcome::default()
        });
    };

    let mut out = AtomicFile::create(path, options.robustness)?;
    let outcome = stream_merge(new_content, &regions, &mut scanner, &mut out)
        .map_err(|e| with_path(e, &native))?;
    drop(scanner);
    out.commit()?;

    tracing::debug!(
        %path,
        preserved = outcome.preserved.len(),
        passed_through = outcome.passed_through.len(),
        "Merged generated file"
    );
    Ok(outcome)
}

/// In-memory variant of [`merge_file`] against `old_content`.
pub fn merge_text(old_content: &str, new_content: &str, pragma: &Pragma) -> Result<String> {
    let label = Path::new("<content>");
    let regions = index_regions(new_content, pragma, label)?;
    let mut scanner = RegionScanner::new(
        Cursor::new(old_content.as_bytes()),
        label,
        pragma,
        DEFAULT_CHUNK_SIZE,
    );

    let mut out = Vec::with_capacity(new_content.len());
    stream_merge(new_content, &regions, &mut scanner, &mut out).map_err(|e| with_path(e, label))?;
    // Output is assembled from whole lines of the two inputs.
    String::from_utf8(out).map_err(|e| {
        Error::io(
            label,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

/// Map start-marker line index to its region, rejecting duplicate names.
fn index_regions(
    content: &str,
    pragma: &Pragma,
    path: &Path,
) -> Result<HashMap<usize, Region>> {
    let mut seen = HashSet::new();
    let mut by_start = HashMap::new();
    for region in parse_regions(content, pragma) {
        if !seen.insert(region.name.clone()) {
            return Err(Error::DuplicateRegion {
                name: region.name,
                path: path.to_path_buf(),
            });
        }
        by_start.insert(region.start_index, region);
    }
    Ok(by_start)
}

fn stream_merge<R, W>(
    new_content: &str,
    regions: &HashMap<usize, Region>,
    scanner: &mut RegionScanner<'_, R>,
    out: &mut W,
) -> std::result::Result<MergeOutcome, StreamError>
where
    R: Read + Seek,
    W: Write,
{
    let mut outcome = MergeOutcome::default();
    let mut state = State::Copy;

    for (index, line) in new_content.split_inclusive('\n').enumerate() {
        if let State::Fetching(region) = state {
            state = match scanner.find(&region.name).map_err(StreamError::Scan)? {
                Some(found) => {
                    out.write_all(&found.body).map_err(StreamError::Write)?;
                    outcome.preserved.push(region.name.clone());
                    State::Skipping {
                        end_index: region.end_index,
                    }
                }
                None => {
                    tracing::debug!(region = %region.name, "Region not on disk; keeping generated body");
                    outcome.passed_through.push(region.name.clone());
                    State::Copy
                }
            };
        }

        if let State::Skipping { end_index } = state {
            if index < end_index {
                continue;
            }
            state = State::Copy;
        }

        out.write_all(line.as_bytes()).map_err(StreamError::Write)?;
        if let Some(region) = regions.get(&index) {
            state = State::Fetching(region);
        }
    }

    out.flush().map_err(StreamError::Write)?;
    Ok(outcome)
}

enum StreamError {
    Scan(Error),
    Write(std::io::Error),
}

fn with_path(error: StreamError, path: &Path) -> Error {
    match error {
        StreamError::Scan(e) => e,
        StreamError::Write(e) => Error::io(PathBuf::from(path), e),
    }
}
