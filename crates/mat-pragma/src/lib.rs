//! Protected-region merging for generated files.
//!
//! A generated file may carry named regions whose content belongs to the
//! developer rather than the generator:
//!
//! ```text
//! /* mat Before create [start] */
//! hand-written code
//! /* mat Before create [end] */
//! ```
//!
//! When the generator runs again, [`merge_file`] streams the new output to a
//! temporary sibling, splicing in the body each region had on disk, and
//! renames it over the destination once the stream completes. Regions are
//! looked up with a chunked forward scan of the old file ([`RegionScanner`])
//! so large files are never loaded whole.

pub mod error;
pub mod marker;
pub mod merge;
pub mod region;
pub mod scanner;

pub use error::{Error, Result};
pub use marker::{Marker, MarkerKind, Pragma, PragmaSyntax};
pub use merge::{MergeOptions, MergeOutcome, merge_file, merge_text};
pub use region::{Region, find_region, parse_regions};
pub use scanner::{DEFAULT_CHUNK_SIZE, RegionMatch, RegionScanner};
