//! Generation runner
//!
//! - [`Generator`] / [`GeneratorSet`]: what produces each generated file
//! - [`Runner`]: one produce / schedule / commit cycle
//! - [`WatchLoop`]: re-run cycles as generator sources change

mod cycle;
mod generator;
mod watch;

pub use cycle::{CycleReport, GeneratorFailure, Runner};
pub use generator::{FnGenerator, Generator, GeneratorContext, GeneratorSet, Literal, is_private};
pub use watch::{GeneratorSource, WatchEvent, WatchKind, WatchLoop};
