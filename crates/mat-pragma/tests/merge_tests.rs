//! Integration tests for region-preserving merges.

use mat_fs::NormalizedPath;
use mat_pragma::{Error, MergeOptions, Pragma, merge_file, merge_text};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn with_region(name: &str, body: &str, outside: &str) -> String {
    format!(
        "// {outside} header\n{}\n// {outside} footer\n",
        Pragma::default().wrap(name, body)
    )
}

fn setup() -> (TempDir, NormalizedPath) {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("src/index.js"));
    (temp, path)
}

#[test]
fn test_missing_file_is_written_verbatim() {
    let (_temp, path) = setup();
    let content = with_region("A", "X", "v1");

    let outcome = merge_file(&path, &content, &Pragma::default(), &MergeOptions::default()).unwrap();

    assert!(outcome.created);
    assert_eq!(fs::read_to_string(path.to_native()).unwrap(), content);
}

#[test]
fn test_keeps_hand_edited_region_body() {
    let (_temp, path) = setup();
    let pragma = Pragma::default();
    fs::create_dir_all(path.to_native().parent().unwrap()).unwrap();
    fs::write(
        path.to_native(),
        "/* mat custom [start] */\nconsole.log('keep')\n/* mat custom [end] */\n",
    )
    .unwrap();

    let generated = "const a = 1\n/* mat custom [start] */\nconsole.log('new')\n/* mat custom [end] */\nconst b = 2\n";
    let outcome = merge_file(&path, generated, &pragma, &MergeOptions::default()).unwrap();

    assert_eq!(outcome.preserved, vec!["custom".to_string()]);
    assert_eq!(
        fs::read_to_string(path.to_native()).unwrap(),
        "const a = 1\n/* mat custom [start] */\nconsole.log('keep')\n/* mat custom [end] */\nconst b = 2\n"
    );
}

#[test]
fn test_first_seeded_body_survives_later_proposals() {
    let (_temp, path) = setup();
    let pragma = Pragma::default();
    let options = MergeOptions::default();

    merge_file(&path, &with_region("A", "X", "v1"), &pragma, &options).unwrap();
    merge_file(&path, &with_region("A", "Y", "v2"), &pragma, &options).unwrap();
    merge_file(&path, &with_region("A", "Z", "v3"), &pragma, &options).unwrap();

    assert_eq!(
        fs::read_to_string(path.to_native()).unwrap(),
        with_region("A", "X", "v3")
    );
}

#[test]
fn test_value_on_disk_before_last_merge_wins() {
    let (_temp, path) = setup();
    let pragma = Pragma::default();
    let options = MergeOptions::default();

    merge_file(&path, &with_region("A", "X", "v1"), &pragma, &options).unwrap();
    // Developer edits the region by hand.
    fs::write(path.to_native(), with_region("A", "Y", "v1")).unwrap();
    merge_file(&path, &with_region("A", "Z", "v2"), &pragma, &options).unwrap();

    assert_eq!(
        fs::read_to_string(path.to_native()).unwrap(),
        with_region("A", "Y", "v2")
    );
}

#[test]
fn test_new_region_passes_through() {
    let (_temp, path) = setup();
    let pragma = Pragma::default();
    fs::create_dir_all(path.to_native().parent().unwrap()).unwrap();
    fs::write(path.to_native(), with_region("A", "kept", "v1")).unwrap();

    let generated = format!(
        "{}\n{}\n",
        pragma.wrap("A", "proposed a"),
        pragma.wrap("B", "proposed b")
    );
    let outcome = merge_file(&path, &generated, &pragma, &MergeOptions::default()).unwrap();

    assert_eq!(outcome.preserved, vec!["A".to_string()]);
    assert_eq!(outcome.passed_through, vec!["B".to_string()]);
    let merged = fs::read_to_string(path.to_native()).unwrap();
    assert!(merged.contains("kept\n"));
    assert!(!merged.contains("proposed a"));
    assert!(merged.contains("proposed b"));
}

#[test]
fn test_unchanged_regions_round_trip_byte_identically() {
    let (_temp, path) = setup();
    let pragma = Pragma::default();
    let content = "a\r\n/* mat win [start] */\r\n  indented\t\r\n\r\n/* mat win [end] */\r\nz";
    fs::create_dir_all(path.to_native().parent().unwrap()).unwrap();
    fs::write(path.to_native(), content).unwrap();

    merge_file(&path, content, &pragma, &MergeOptions::default()).unwrap();

    assert_eq!(fs::read(path.to_native()).unwrap(), content.as_bytes());
}

#[test]
fn test_duplicate_region_rejected_and_file_untouched() {
    let (_temp, path) = setup();
    let pragma = Pragma::default();
    let original = with_region("A", "X", "v1");
    fs::create_dir_all(path.to_native().parent().unwrap()).unwrap();
    fs::write(path.to_native(), &original).unwrap();

    let generated = format!("{}\n{}\n", pragma.wrap("A", "1"), pragma.wrap("A", "2"));
    let result = merge_file(&path, &generated, &pragma, &MergeOptions::default());

    assert!(matches!(result, Err(Error::DuplicateRegion { ref name, .. }) if name == "A"));
    assert_eq!(fs::read_to_string(path.to_native()).unwrap(), original);
}

#[test]
fn test_large_file_with_small_chunks() {
    let (_temp, path) = setup();
    let pragma = Pragma::default();
    let filler = "const hoge = 'fuga'\n".repeat(5_000);
    let old = format!(
        "{filler}{}\n{filler}{}\n",
        pragma.wrap("first", "old first"),
        pragma.wrap("second", "old second")
    );
    fs::create_dir_all(path.to_native().parent().unwrap()).unwrap();
    fs::write(path.to_native(), &old).unwrap();

    let generated = format!(
        "{}\n{}\n",
        pragma.wrap("first", "new first"),
        pragma.wrap("second", "new second")
    );
    let options = MergeOptions {
        chunk_size: 257,
        ..MergeOptions::default()
    };
    merge_file(&path, &generated, &pragma, &options).unwrap();

    assert_eq!(
        fs::read_to_string(path.to_native()).unwrap(),
        format!(
            "{}\n{}\n",
            pragma.wrap("first", "old first"),
            pragma.wrap("second", "old second")
        )
    );
}

#[test]
fn test_merge_leaves_no_temp_file() {
    let (temp, path) = setup();
    let pragma = Pragma::default();
    merge_file(&path, &with_region("A", "X", "v1"), &pragma, &MergeOptions::default()).unwrap();
    merge_file(&path, &with_region("A", "Y", "v2"), &pragma, &MergeOptions::default()).unwrap();

    let leftovers: Vec<_> = fs::read_dir(temp.path().join("src"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_merge_text_in_memory() {
    let pragma = Pragma::default();
    let old = "x\n/* mat r [start] */\nmine\n/* mat r [end] */\n";
    let new = "y\n/* mat r [start] */\ntheirs\n/* mat r [end] */\n";

    assert_eq!(
        merge_text(old, new, &pragma).unwrap(),
        "y\n/* mat r [start] */\nmine\n/* mat r [end] */\n"
    );
}

#[test]
fn test_duplicate_name_on_disk_uses_first_occurrence() {
    let pragma = Pragma::default();
    let old = format!(
        "{}\n{}\n{}\n",
        pragma.wrap("A", "one"),
        pragma.wrap("B", "b"),
        pragma.wrap("A", "two")
    );
    let new = format!("{}\n{}\n", pragma.wrap("B", "new b"), pragma.wrap("A", "new a"));

    assert_eq!(
        merge_text(&old, &new, &pragma).unwrap(),
        format!("{}\n{}\n", pragma.wrap("B", "b"), pragma.wrap("A", "one"))
    );
}
