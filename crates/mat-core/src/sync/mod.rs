//! Virtual file sync
//!
//! The [`SyncEngine`] keeps an in-memory [`Cache`] of the destination tree
//! and commits scheduled writes against it.

mod cache;
mod engine;
mod tree_view;

pub use cache::{Cache, CacheEntry, EntryStatus};
pub use engine::{CommitOptions, CommitReport, EngineOptions, PendingAction, SyncEngine};
pub use tree_view::render as render_tree;
