//! One generation cycle: produce, schedule, commit.

use std::collections::HashMap;

use mat_fs::{NormalizedPath, is_parent_of};

use super::generator::{GeneratorContext, GeneratorSet};
use crate::config::EngineConfig;
use crate::sync::{CommitOptions, CommitReport, SyncEngine};
use crate::{Error, Result};

/// A generator module that failed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorFailure {
    pub module: NormalizedPath,
    pub message: String,
}

/// Outcome of [`Runner::run_cycle`].
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// 1-based cycle counter.
    pub cycle: usize,
    /// Files seeded into the cache by the mount at the start of the cycle.
    pub mounted: usize,
    /// Number of write intents scheduled.
    pub scheduled: usize,
    pub failures: Vec<GeneratorFailure>,
    pub commit: CommitReport,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives generation cycles against one [`SyncEngine`].
///
/// Cycles take `&mut self`, so two cycles on one runner can never overlap.
pub struct Runner {
    engine: SyncEngine,
    dest: NormalizedPath,
    generators: GeneratorSet,
    /// Rewrite existing files instead of merging on the first cycle
    clean: bool,
    cycles: usize,
    /// Files each module produced in its last successful run
    outputs: HashMap<NormalizedPath, Vec<NormalizedPath>>,
}

impl Runner {
    pub fn new(engine: SyncEngine, dest: impl Into<NormalizedPath>) -> Self {
        Self {
            engine,
            dest: dest.into(),
            generators: GeneratorSet::new(),
            clean: false,
            cycles: 0,
            outputs: HashMap::new(),
        }
    }

    /// Build a runner for the project at `root` from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker syntax or ignore patterns are invalid.
    pub fn from_config(root: NormalizedPath, config: &EngineConfig) -> Result<Self> {
        let engine = SyncEngine::new(root, config.engine_options()?).with_matcher(config.ignore_matcher()?);
        Ok(Self::new(engine, config.dest_path()).with_clean(config.clean))
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn with_generators(mut self, generators: GeneratorSet) -> Self {
        self.generators = generators;
        self
    }

    pub fn set_generators(&mut self, generators: GeneratorSet) {
        self.generators = generators;
    }

    pub fn generators(&self) -> &GeneratorSet {
        &self.generators
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SyncEngine {
        &mut self.engine
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Render the engine's cache as a tree.
    pub fn ls(&self, show_hash: bool) -> String {
        self.engine.ls(show_hash)
    }

    /// Run every generator once and commit the result.
    ///
    /// Generators run concurrently; their outputs are scheduled in module
    /// order. A failing generator is reported and its files from the last
    /// successful run are kept as they are. A failing mount or commit clears
    /// the cache so the next cycle starts from a fresh mount.
    ///
    /// # Errors
    ///
    /// Returns the mount or commit error; generator failures are reported in
    /// the [`CycleReport`] instead.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycles += 1;
        let cycle = self.cycles;
        tracing::info!(cycle, generators = self.generators.len(), "Cycle started");

        let mounted = match self.engine.mount(&self.dest) {
            Ok(mounted) => mounted,
            Err(e) => {
                self.engine.clear_cache();
                tracing::error!(cycle, error = %e, "Mount failed");
                return Err(e);
            }
        };

        let mut report = CycleReport {
            cycle,
            mounted,
            ..CycleReport::default()
        };

        for (module, produced) in self.produce_all().await {
            match produced {
                Ok(files) => {
                    let paths: Vec<NormalizedPath> = files.iter().map(|(path, _)| path.clone()).collect();
                    for (path, content) in files {
                        self.engine.schedule(path, content);
                        report.scheduled += 1;
                    }
                    self.outputs.insert(module, paths);
                }
                Err(e) => {
                    tracing::warn!(module = %module, error = %e, "Generator failed; keeping its previous output");
                    for path in self.outputs.get(&module).into_iter().flatten() {
                        self.engine.retain(path.clone());
                    }
                    report.failures.push(GeneratorFailure {
                        module,
                        message: e.to_string(),
                    });
                }
            }
        }

        let options = CommitOptions {
            dry_run: false,
            force_clean: self.clean && cycle == 1,
        };
        report.commit = match self.engine.commit(options) {
            Ok(commit) => commit,
            Err(e) => {
                self.engine.clear_cache();
                tracing::error!(cycle, error = %e, "Commit failed");
                return Err(e);
            }
        };

        self.outputs.retain(|module, _| self.generators.modules().any(|m| m == module));
        tracing::info!(cycle, tree = %format!("\n{}", self.engine.ls(true)), "Destination tree");
        tracing::info!(
            cycle,
            scheduled = report.scheduled,
            written = report.commit.writes(),
            deleted = report.commit.deleted.len(),
            failures = report.failures.len(),
            "Cycle finished"
        );
        Ok(report)
    }

    /// Produce every runnable module concurrently; results in module order.
    async fn produce_all(&self) -> Vec<(NormalizedPath, Result<Vec<(NormalizedPath, String)>>)> {
        let prefix = self.engine.options().private_prefix.clone();
        let mut tasks = Vec::new();

        for (module, generator) in self.generators.runnable(&prefix) {
            let module = module.clone();
            let generator = generator.clone();
            let ctx = GeneratorContext::for_module(&self.dest, &module);
            let dest = self.dest.clone();
            let label = module.clone();
            let handle = tokio::spawn(async move {
                tracing::debug!(path = %ctx.path(), "Generation started");
                let produced = generator.produce(&ctx).await?;
                let own = produced.map(|text| (ctx.path(), text));
                let mut files: Vec<(NormalizedPath, String)> = own.into_iter().collect();
                files.extend(ctx.into_writes());
                if let Some((path, _)) = files.iter().find(|(path, _)| !is_inside(&dest, path)) {
                    return Err(Error::generator(
                        label.as_str(),
                        format!("write to '{path}' is outside the destination '{dest}'"),
                    ));
                }
                Ok::<_, Error>(files)
            });
            tasks.push((module, handle));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (module, handle) in tasks {
            let result = match handle.await {
                Ok(result) => result,
                Err(join) => Err(Error::generator(module.as_str(), join)),
            };
            let result = result.map_err(|e| match e {
                Error::Generator { .. } => e,
                other => Error::generator(module.as_str(), other),
            });
            results.push((module, result));
        }
        results
    }
}

/// True if `path` names a file strictly below `dest`.
fn is_inside(dest: &NormalizedPath, path: &NormalizedPath) -> bool {
    path.is_confined() && (dest.is_empty() || is_parent_of(dest, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{FnGenerator, Literal};
    use crate::sync::EngineOptions;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn runner(temp: &TempDir) -> Runner {
        let engine = SyncEngine::new(NormalizedPath::new(temp.path()), EngineOptions::default());
        Runner::new(engine, "test/src")
    }

    #[tokio::test]
    async fn writes_generator_output_under_dest() {
        let temp = TempDir::new().unwrap();
        let mut runner = runner(&temp).with_generators(
            GeneratorSet::new().with("index.js", Literal::new("const hoge = 'fuga'")),
        );

        let report = runner.run_cycle().await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.scheduled, 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("test/src/index.js")).unwrap(),
            "const hoge = 'fuga'"
        );
        assert!(runner.ls(false).contains("index.js [new]"));
    }

    #[tokio::test]
    async fn failing_generator_keeps_previous_output() {
        let temp = TempDir::new().unwrap();
        let mut runner = runner(&temp).with_generators(
            GeneratorSet::new()
                .with("a.js", Literal::new("a"))
                .with("b.js", Literal::new("b")),
        );
        runner.run_cycle().await.unwrap();

        runner.set_generators(
            GeneratorSet::new()
                .with("a.js", Literal::new("a2"))
                .with(
                    "b.js",
                    FnGenerator::new(|_: &GeneratorContext| Err(Error::generator("b.js", "boom"))),
                ),
        );
        let report = runner.run_cycle().await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].module.as_str(), "b.js");
        assert!(report.commit.deleted.is_empty());
        assert_eq!(fs::read_to_string(temp.path().join("test/src/a.js")).unwrap(), "a2");
        assert_eq!(fs::read_to_string(temp.path().join("test/src/b.js")).unwrap(), "b");
    }

    #[tokio::test]
    async fn extra_files_from_context() {
        let temp = TempDir::new().unwrap();
        let mut runner = runner(&temp).with_generators(GeneratorSet::new().with(
            "models/index.js",
            FnGenerator::new(|ctx: &GeneratorContext| {
                ctx.write_file(ctx.dir_path.join("user.js"), "export const user = {}");
                Ok(None)
            }),
        ));

        runner.run_cycle().await.unwrap();

        assert!(temp.path().join("test/src/models/user.js").exists());
        assert!(!temp.path().join("test/src/models/index.js").exists());
    }
}
