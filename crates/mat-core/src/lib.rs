//! Core orchestration layer for matryoshka
//!
//! Generated source trees are produced by generator modules and written
//! into a destination directory through a virtual file-sync layer:
//!
//! - **SyncEngine**: queues writes, commits only real changes, merges
//!   protected regions on update and deletes files that stopped being
//!   generated (pruning directories left empty)
//! - **Runner**: runs every generator module once per cycle, isolating
//!   failures per module
//! - **WatchLoop**: coalesces change events, invalidates stale modules
//!   through the dependency graph and re-runs the cycle
//!
//! # Architecture
//!
//! ```text
//!              WatchLoop
//!                  |
//!               Runner ---- deps (invalidation)
//!                  |
//!             SyncEngine
//!              /       \
//!          mat-fs    mat-pragma
//! ```

pub mod config;
pub mod deps;
pub mod error;
pub mod matcher;
pub mod runner;
pub mod sync;

pub use config::{CONFIG_FILES, EngineConfig, RobustnessSettings};
pub use deps::{DependencyGraph, DependencyResolver, Invalidation, ModuleCache, dependents, invalidate};
pub use error::{Error, Result};
pub use matcher::{DEFAULT_ALLOWED_PACKAGES, DefaultIgnore, IgnoreMatcher, NoIgnore};
pub use runner::{
    CycleReport, FnGenerator, Generator, GeneratorContext, GeneratorFailure, GeneratorSet,
    GeneratorSource, Literal, Runner, WatchEvent, WatchKind, WatchLoop,
};
pub use sync::{
    Cache, CacheEntry, CommitOptions, CommitReport, EngineOptions, EntryStatus, PendingAction,
    SyncEngine, render_tree,
};
