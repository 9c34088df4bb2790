//! Dependency invalidation.
//!
//! When a generator module or one of its helpers changes, every module that
//! imports it (directly or transitively) has stale cached output. This
//! module computes that set from a dependency graph; evicting the stale
//! modules is left to a [`ModuleCache`] implementation.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Deserialize;

use crate::Result;

/// Module path to the set of module paths it directly imports.
///
/// Module order is the key order of the map, which keeps traversal
/// deterministic. Cycles are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `module` imports each of `imports`.
    pub fn add<I, S>(&mut self, module: impl Into<String>, imports: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edges
            .entry(module.into())
            .or_default()
            .extend(imports.into_iter().map(Into::into));
    }

    pub fn imports_of(&self, module: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Modules that directly import `module`, in graph order.
    fn importers_of<'g>(&'g self, module: &str) -> impl Iterator<Item = &'g str> {
        self.edges
            .iter()
            .filter(move |(_, imports)| imports.contains(module))
            .map(|(importer, _)| importer.as_str())
    }
}

impl<M, I, S> FromIterator<(M, I)> for DependencyGraph
where
    M: Into<String>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (M, I)>>(iter: T) -> Self {
        let mut graph = DependencyGraph::new();
        for (module, imports) in iter {
            graph.add(module, imports);
        }
        graph
    }
}

/// The dependents closure of `changed`: `changed` itself followed by every
/// module that transitively imports it.
///
/// Traversal is depth-first; each newly discovered importer is emitted and
/// then expanded before its siblings. A module already emitted is never
/// expanded again, so cyclic graphs terminate.
pub fn dependents(graph: &DependencyGraph, changed: &str) -> Vec<String> {
    let mut order = vec![changed.to_string()];
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(changed);
    collect_dependents(graph, changed, &mut seen, &mut order);
    order
}

fn collect_dependents<'g>(
    graph: &'g DependencyGraph,
    module: &str,
    seen: &mut HashSet<&'g str>,
    order: &mut Vec<String>,
) {
    let importers: Vec<&'g str> = graph.importers_of(module).collect();
    for importer in importers {
        if seen.insert(importer) {
            order.push(importer.to_string());
            collect_dependents(graph, importer, seen, order);
        }
    }
}

/// Whatever holds loaded generator modules between cycles.
pub trait ModuleCache: Send {
    /// Drop the cached copy of `module` so the next load reads it afresh.
    fn evict(&mut self, module: &str);

    /// Drop every cached module.
    fn clear(&mut self);
}

/// Source of the module dependency graph (static import analysis).
pub trait DependencyResolver: Send + Sync {
    fn resolve(&self) -> Result<DependencyGraph>;
}

/// A fixed graph, for callers that already know the imports.
impl DependencyResolver for DependencyGraph {
    fn resolve(&self) -> Result<DependencyGraph> {
        Ok(self.clone())
    }
}

/// What [`invalidate`] did for a batch of changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// These modules were evicted, in eviction order.
    Evicted(Vec<String>),
    /// The graph could not be resolved; the whole module cache was cleared.
    Cleared,
}

/// Evict the dependents closure of every changed module from `cache`.
///
/// A resolution failure falls back to clearing the cache entirely rather
/// than skipping invalidation.
pub fn invalidate<C>(resolver: &dyn DependencyResolver, cache: &mut C, changed: &[String]) -> Invalidation
where
    C: ModuleCache + ?Sized,
{
    let graph = match resolver.resolve() {
        Ok(graph) => graph,
        Err(e) => {
            tracing::warn!(error = %e, "Dependency resolution failed; clearing module cache");
            cache.clear();
            return Invalidation::Cleared;
        }
    };

    let mut evicted = Vec::new();
    let mut seen = HashSet::new();
    for path in changed {
        for module in dependents(&graph, path) {
            if seen.insert(module.clone()) {
                tracing::debug!(module = %module, "Evicting module");
                cache.evict(&module);
                evicted.push(module);
            }
        }
    }
    Invalidation::Evicted(evicted)
}
