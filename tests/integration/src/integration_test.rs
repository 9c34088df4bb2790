//! End-to-end integration test for a generated project
//!
//! Exercises the complete flow: config loading -> generation cycles ->
//! region merging -> deletion and pruning -> restart with a fresh engine.

use mat_core::runner::{FnGenerator, GeneratorContext, GeneratorSet, Literal, Runner};
use mat_core::{EngineConfig, EntryStatus};
use mat_fs::NormalizedPath;
use mat_pragma::Pragma;
use mat_test_utils::TestTree;

/// Set up a project with a JSON config and a hand-maintained file.
fn setup_project() -> TestTree {
    mat_test_utils::init_tracing();
    let tree = TestTree::new();
    tree.write(
        "mat.json",
        r#"{
  "dest": "app/src",
  "generator": "app/generators",
  "ignore": ["dist"],
  "pragma": { "open": "// mat", "close": "" }
}"#,
    );
    tree.write("app/src/dist/bundle.js", "built elsewhere");
    tree
}

fn service(pragma: &Pragma, version: u32) -> String {
    format!(
        "export const version = {version};\n{}\nexport default service;\n",
        pragma.wrap("Before create", "  // generated hook\n")
    )
}

fn generators(pragma: &Pragma, version: u32, with_models: bool) -> GeneratorSet {
    let mut set = GeneratorSet::new()
        .with("index.js", Literal::new(format!("// v{version}\n")))
        .with("services/user.js", Literal::new(service(pragma, version)))
        .with("_shared.js", Literal::new("helper"));
    if with_models {
        set.insert(
            "models/index.js",
            FnGenerator::new(|ctx: &GeneratorContext| {
                for name in ["user", "post"] {
                    ctx.write_file(
                        ctx.dir_path.join(&format!("{name}.js")),
                        format!("export const {name} = {{}};\n"),
                    );
                }
                Ok(Some("export * from './user';\nexport * from './post';\n".to_string()))
            }),
        );
    }
    set
}

#[tokio::test]
async fn test_project_lifecycle() {
    let tree = setup_project();
    let root = tree.root();
    let config = EngineConfig::load(&root).unwrap();
    assert_eq!(config.dest, "app/src");
    let pragma = config.pragma().unwrap();

    let mut runner = Runner::from_config(root.clone(), &config).unwrap();

    // Cycle 1: everything is new
    runner.set_generators(generators(&pragma, 1, true));
    let report = runner.run_cycle().await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.commit.created.len(), 5);
    assert_eq!(
        tree.files("app/src"),
        vec![
            "app/src/dist/bundle.js",
            "app/src/index.js",
            "app/src/models/index.js",
            "app/src/models/post.js",
            "app/src/models/user.js",
            "app/src/services/user.js",
        ]
    );
    tree.assert_file_not_exists("app/src/_shared.js");

    // Developer fills in the protected region
    let edited = tree
        .read("app/src/services/user.js")
        .replace("  // generated hook\n", "  validate(user);\n");
    tree.write("app/src/services/user.js", &edited);

    // Cycle 2: new generator version, models dropped
    runner.set_generators(generators(&pragma, 2, false));
    let report = runner.run_cycle().await.unwrap();
    assert_eq!(report.commit.updated.len(), 2);
    assert_eq!(report.commit.deleted.len(), 3);
    assert_eq!(report.commit.pruned, vec![NormalizedPath::from("app/src/models")]);

    let service_file = tree.read("app/src/services/user.js");
    assert!(service_file.starts_with("export const version = 2;"));
    assert!(service_file.contains("  validate(user);\n"));
    assert!(!service_file.contains("generated hook"));
    tree.assert_file_not_exists("app/src/models");
    tree.assert_file_contains("app/src/dist/bundle.js", "built elsewhere");

    let entry = runner
        .engine()
        .cache()
        .get(&"app/src/index.js".into())
        .unwrap();
    assert_eq!(entry.status, EntryStatus::Updated);

    // Restart: a fresh runner mounts the tree and has nothing to write
    let mut restarted = Runner::from_config(root, &config).unwrap();
    restarted.set_generators(generators(&pragma, 2, false));
    let report = restarted.run_cycle().await.unwrap();
    assert_eq!(report.mounted, 2);
    assert_eq!(report.commit.writes(), 1, "services/user.js differs from its generated form");
    assert!(report.commit.deleted.is_empty());
    assert!(tree.read("app/src/services/user.js").contains("  validate(user);\n"));
}

#[tokio::test]
async fn test_dry_run_config_reports_without_writing() {
    let tree = TestTree::new();
    tree.write("mat.toml", "dry_run = true\n");
    tree.write("src/stale.js", "old");
    let config = EngineConfig::load(&tree.root()).unwrap();

    let mut runner = Runner::from_config(tree.root(), &config)
        .unwrap()
        .with_generators(GeneratorSet::new().with("index.js", Literal::new("new")));
    let report = runner.run_cycle().await.unwrap();

    assert!(report.commit.dry_run);
    assert_eq!(report.commit.created, vec![NormalizedPath::from("src/index.js")]);
    assert_eq!(report.commit.deleted, vec![NormalizedPath::from("src/stale.js")]);
    assert_eq!(tree.files("src"), vec!["src/stale.js"]);
}
