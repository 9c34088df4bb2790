//! Filesystem layer for matryoshka
//!
//! Provides normalized path handling, pure path/tree utilities, the entry
//! checksum used by the sync cache, and atomic I/O for the destination tree.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;
pub mod tree;

pub use checksum::{compute_content_checksum, compute_entry_checksum};
pub use config::{ConfigFormat, ConfigStore};
pub use error::{Error, Result};
pub use io::{AtomicFile, RobustnessConfig};
pub use path::NormalizedPath;
pub use tree::{PathDiff, ancestors, diff, is_parent_of, is_same_or_parent_of, merge_paths};
