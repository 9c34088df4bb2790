//! Watch loop: turn generator-directory change events into cycles.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::mpsc;

use mat_fs::NormalizedPath;

use super::cycle::Runner;
use super::generator::GeneratorSet;
use crate::Result;
use crate::deps::{DependencyResolver, ModuleCache, invalidate};
use crate::matcher::IgnoreMatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    Change,
    Add,
    Delete,
}

/// A change to a file under the generator directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchEvent {
    pub kind: WatchKind,
    /// Path relative to the generator directory.
    pub path: NormalizedPath,
}

impl WatchEvent {
    pub fn new(kind: WatchKind, path: impl Into<NormalizedPath>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Loads the current generator modules, honoring evictions made through
/// [`ModuleCache`].
#[async_trait]
pub trait GeneratorSource: Send {
    async fn load(&mut self) -> Result<GeneratorSet>;
}

/// Re-runs generation whenever the generator directory changes.
///
/// Events arriving while a cycle runs are coalesced into the next cycle, so
/// cycles never overlap and a burst of saves costs one cycle.
pub struct WatchLoop<S> {
    runner: Runner,
    source: S,
    resolver: Box<dyn DependencyResolver>,
    matcher: Box<dyn IgnoreMatcher>,
}

impl<S> WatchLoop<S>
where
    S: GeneratorSource + ModuleCache,
{
    pub fn new(runner: Runner, source: S, resolver: impl DependencyResolver + 'static) -> Self {
        Self {
            runner,
            source,
            resolver: Box::new(resolver),
            matcher: Box::new(crate::matcher::NoIgnore),
        }
    }

    pub fn with_matcher(mut self, matcher: impl IgnoreMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_parts(self) -> (Runner, S) {
        (self.runner, self.source)
    }

    /// Run an initial cycle, then one cycle per batch of events until the
    /// channel closes. Returns the number of cycles run.
    ///
    /// A failed cycle is logged and the loop keeps watching.
    ///
    /// # Errors
    ///
    /// Returns an error only if the initial generator load fails.
    pub async fn run(&mut self, mut events: mpsc::Receiver<WatchEvent>) -> Result<usize> {
        let generators = self.source.load().await?;
        self.runner.set_generators(generators);
        let mut cycles = 0;
        self.cycle().await;
        cycles += 1;

        while let Some(first) = events.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = events.try_recv() {
                batch.push(next);
            }

            let changed = self.changed_modules(batch);
            if changed.is_empty() {
                continue;
            }
            tracing::info!(modules = ?changed, "Generator sources changed");

            invalidate(self.resolver.as_ref(), &mut self.source, &changed);
            match self.source.load().await {
                Ok(generators) => self.runner.set_generators(generators),
                Err(e) => tracing::warn!(error = %e, "Reloading generators failed; keeping previous set"),
            }

            self.cycle().await;
            cycles += 1;
        }

        tracing::debug!(cycles, "Watch channel closed");
        Ok(cycles)
    }

    async fn cycle(&mut self) {
        match self.runner.run_cycle().await {
            Ok(report) if !report.is_success() => {
                tracing::warn!(cycle = report.cycle, failures = report.failures.len(), "Cycle finished with failures");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Cycle failed"),
        }
    }

    /// Distinct, non-ignored module paths in arrival order.
    fn changed_modules(&self, batch: Vec<WatchEvent>) -> Vec<String> {
        let mut seen = HashSet::new();
        batch
            .into_iter()
            .filter(|event| !self.matcher.is_ignored(&event.path))
            .map(|event| event.path.as_str().to_string())
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }
}
