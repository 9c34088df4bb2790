//! Watch loop driven from a separate task, the way a file watcher feeds it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mat_core::runner::{GeneratorSet, GeneratorSource, Literal, Runner, WatchEvent, WatchKind, WatchLoop};
use mat_core::{DefaultIgnore, DependencyGraph, EngineConfig, IgnoreMatcher, ModuleCache, Result};
use mat_test_utils::TestTree;
use tokio::sync::mpsc;

/// Module sources shared with the test body, so it can "edit" them while the
/// loop runs. Loaded copies are kept until evicted.
#[derive(Clone, Default)]
struct SharedModules {
    sources: Arc<Mutex<BTreeMap<String, String>>>,
    loaded: BTreeMap<String, String>,
}

impl SharedModules {
    fn edit(&self, module: &str, text: Option<&str>) {
        let mut sources = self.sources.lock().unwrap();
        match text {
            Some(text) => sources.insert(module.to_string(), text.to_string()),
            None => sources.remove(module),
        };
    }
}

#[async_trait]
impl GeneratorSource for SharedModules {
    async fn load(&mut self) -> Result<GeneratorSet> {
        let sources = self.sources.lock().unwrap().clone();
        self.loaded.retain(|module, _| sources.contains_key(module));
        let mut set = GeneratorSet::new();
        for (module, text) in sources {
            let text = self.loaded.entry(module.clone()).or_insert(text).clone();
            set.insert(module, Literal::new(text));
        }
        Ok(set)
    }
}

impl ModuleCache for SharedModules {
    fn evict(&mut self, module: &str) {
        self.loaded.remove(module);
    }

    fn clear(&mut self) {
        self.loaded.clear();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_loop_follows_edits() {
    mat_test_utils::init_tracing();
    let tree = TestTree::new();
    let config = EngineConfig::load(&tree.root()).unwrap();
    let runner = Runner::from_config(tree.root(), &config).unwrap();

    let modules = SharedModules::default();
    modules.edit("index.js", Some("import v1"));
    modules.edit("pages/home.js", Some("home v1"));
    modules.edit("pages/about.js", Some("about v1"));
    modules.edit("_layout.js", Some("layout"));

    let graph: DependencyGraph = serde_json::from_str(
        r#"{
  "index.js": [],
  "pages/home.js": ["_layout.js"],
  "pages/about.js": ["_layout.js"],
  "_layout.js": []
}"#,
    )
    .unwrap();

    // Loaded copies are private to each clone; warm this one before editing
    let mut source = modules.clone();
    source.load().await.unwrap();

    let (tx, rx) = mpsc::channel(64);
    let mut watch = WatchLoop::new(runner, source, graph)
        .with_matcher(config.ignore_matcher().unwrap());
    let handle = tokio::spawn(async move {
        let cycles = watch.run(rx).await.unwrap();
        (cycles, watch)
    });

    // Layout edit invalidates both pages; index.js stays cached
    modules.edit("_layout.js", Some("layout v2"));
    modules.edit("pages/home.js", Some("home v2"));
    modules.edit("pages/about.js", Some("about v2"));
    modules.edit("index.js", Some("import v2"));
    tx.send(WatchEvent::new(WatchKind::Change, "_layout.js")).await.unwrap();

    // Removing a page deletes its output
    modules.edit("pages/about.js", None);
    tx.send(WatchEvent::new(WatchKind::Delete, "pages/about.js")).await.unwrap();

    // Noise from dependencies never reaches the runner
    tx.send(WatchEvent::new(WatchKind::Add, "node_modules/left-pad/index.js"))
        .await
        .unwrap();
    drop(tx);

    let (cycles, watch) = handle.await.unwrap();
    assert!(cycles >= 2, "expected at least one cycle after the initial one, got {cycles}");

    assert_eq!(tree.files("src"), vec!["src/index.js", "src/pages/home.js"]);
    tree.assert_file_contains("src/pages/home.js", "home v2");
    tree.assert_file_contains("src/index.js", "import v1");

    let (runner, _) = watch.into_parts();
    assert_eq!(runner.cycles(), cycles);
    assert!(!runner.ls(false).contains("about.js"));
}

#[test]
fn test_default_ignore_keeps_allowed_packages() {
    let matcher = DefaultIgnore::default();
    assert!(!matcher.is_ignored(&"node_modules/snippet-core/index.js".into()));
    assert!(matcher.is_ignored(&"node_modules/left-pad/index.js".into()));
    assert!(matcher.is_ignored(&"node_modules/snippet-core/node_modules/x/index.js".into()));
}
