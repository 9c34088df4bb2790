//! Generator capability and the context handed to each generator.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mat_fs::NormalizedPath;

use crate::Result;

/// Where a generator's output lands, plus a way to emit extra files.
#[derive(Debug)]
pub struct GeneratorContext {
    /// Destination directory of the module's own output, root-relative.
    pub dir_path: NormalizedPath,
    /// File name of the module's own output.
    pub file_name: String,
    /// `file_name` without its extension.
    pub module_name: String,
    writes: Mutex<Vec<(NormalizedPath, String)>>,
}

impl GeneratorContext {
    /// Context for the generator module at `module` (relative to the
    /// generator directory), writing under `dest`.
    pub fn for_module(dest: &NormalizedPath, module: &NormalizedPath) -> Self {
        let target = dest.join(module.as_str());
        let file_name = target.file_name().unwrap_or_default().to_string();
        let module_name = target.file_stem().unwrap_or_default().to_string();
        Self {
            dir_path: target.parent().unwrap_or_default(),
            file_name,
            module_name,
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Root-relative path of the module's own output.
    pub fn path(&self) -> NormalizedPath {
        self.dir_path.join(&self.file_name)
    }

    /// Emit an additional file at a root-relative `path`.
    pub fn write_file(&self, path: impl Into<NormalizedPath>, content: impl Into<String>) {
        let mut writes = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        writes.push((path.into(), content.into()));
    }

    /// Files emitted through [`GeneratorContext::write_file`], in call order.
    pub fn into_writes(self) -> Vec<(NormalizedPath, String)> {
        self.writes.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// Produces the content of one generated file.
///
/// Returning `Some(text)` writes `text` to [`GeneratorContext::path`];
/// `None` means the generator emitted everything through
/// [`GeneratorContext::write_file`] (or nothing at all).
#[async_trait]
pub trait Generator: Send + Sync {
    async fn produce(&self, ctx: &GeneratorContext) -> Result<Option<String>>;
}

/// Fixed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal(pub String);

impl Literal {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

#[async_trait]
impl Generator for Literal {
    async fn produce(&self, _ctx: &GeneratorContext) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

/// A synchronous closure as a generator.
pub struct FnGenerator<F>(F);

impl<F> FnGenerator<F>
where
    F: Fn(&GeneratorContext) -> Result<Option<String>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Generator for FnGenerator<F>
where
    F: Fn(&GeneratorContext) -> Result<Option<String>> + Send + Sync,
{
    async fn produce(&self, ctx: &GeneratorContext) -> Result<Option<String>> {
        (self.0)(ctx)
    }
}

/// Generator modules keyed by path relative to the generator directory.
#[derive(Clone, Default)]
pub struct GeneratorSet {
    modules: BTreeMap<NormalizedPath, Arc<dyn Generator>>,
}

impl GeneratorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: impl Into<NormalizedPath>, generator: impl Generator + 'static) {
        self.modules.insert(module.into(), Arc::new(generator));
    }

    pub fn with(mut self, module: impl Into<NormalizedPath>, generator: impl Generator + 'static) -> Self {
        self.insert(module, generator);
        self
    }

    pub fn remove(&mut self, module: &NormalizedPath) -> bool {
        self.modules.remove(module).is_some()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn modules(&self) -> impl Iterator<Item = &NormalizedPath> {
        self.modules.keys()
    }

    /// Modules that run, in path order: any module with a segment starting
    /// with `private_prefix` is a helper and is skipped.
    pub fn runnable<'s>(
        &'s self,
        private_prefix: &'s str,
    ) -> impl Iterator<Item = (&'s NormalizedPath, &'s Arc<dyn Generator>)> {
        self.modules
            .iter()
            .filter(move |(module, _)| !is_private(module, private_prefix))
    }
}

impl std::fmt::Debug for GeneratorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}

/// True if any segment of `path` starts with `prefix`.
pub fn is_private(path: &NormalizedPath, prefix: &str) -> bool {
    !prefix.is_empty() && path.segments().any(|segment| segment.starts_with(prefix))
}
