use mat_fs::{ConfigStore, Error, NormalizedPath};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestConfig {
    dest: String,
    clean: bool,
}

#[rstest]
#[case("mat.toml", "dest = \"out\"\nclean = true")]
#[case("mat.json", r#"{"dest": "out", "clean": true}"#)]
#[case("mat.yaml", "dest: out\nclean: true")]
#[case("mat.yml", "dest: out\nclean: true")]
fn test_load_by_extension(#[case] file_name: &str, #[case] content: &str) {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join(file_name);
    fs::write(&file_path, content).unwrap();

    let config: TestConfig = ConfigStore::new()
        .load(&NormalizedPath::new(&file_path))
        .unwrap();

    assert_eq!(
        config,
        TestConfig {
            dest: "out".into(),
            clean: true
        }
    );
}

#[test]
fn test_load_unsupported_extension() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("mat.ini");
    fs::write(&file_path, "dest=out").unwrap();

    let result: Result<TestConfig, _> = ConfigStore::new().load(&NormalizedPath::new(&file_path));
    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
}

#[test]
fn test_load_invalid_content_reports_format() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("mat.toml");
    fs::write(&file_path, "dest = ").unwrap();

    let result: Result<TestConfig, _> = ConfigStore::new().load(&NormalizedPath::new(&file_path));
    match result {
        Err(Error::ConfigParse { format, .. }) => assert_eq!(format, "TOML"),
        other => panic!("expected ConfigParse, got {:?}", other),
    }
}

#[test]
fn test_load_first_picks_first_existing_candidate() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("mat.json"), r#"{"dest": "json", "clean": false}"#).unwrap();
    fs::write(temp.path().join("mat.yaml"), "dest: yaml\nclean: false").unwrap();

    let root = NormalizedPath::new(temp.path());
    let candidates = vec![root.join("mat.toml"), root.join("mat.json"), root.join("mat.yaml")];

    let (path, config): (NormalizedPath, TestConfig) =
        ConfigStore::new().load_first(&candidates).unwrap().unwrap();

    assert_eq!(path, root.join("mat.json"));
    assert_eq!(config.dest, "json");
}

#[test]
fn test_load_first_none_found() {
    let temp = TempDir::new().unwrap();
    let root = NormalizedPath::new(temp.path());

    let loaded: Option<(NormalizedPath, TestConfig)> = ConfigStore::new()
        .load_first(&[root.join("mat.toml")])
        .unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_save_then_load_toml() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("nested/mat.toml"));
    let store = ConfigStore::new();
    let config = TestConfig {
        dest: "src".into(),
        clean: false,
    };

    store.save(&path, &config).unwrap();
    let loaded: TestConfig = store.load(&path).unwrap();

    assert_eq!(loaded, config);
}
