use deploy_fs::{ConfigStore, Error, NormalizedPath};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Deserialize, PartialEq)]
struct TestConfig {
    name: String,
    count: i32,
}

#[test]
fn test_load_each_format() {
    let temp = TempDir::new().unwrap();
    let cases = [
        ("config.toml", "name = \"test\"\ncount = 42"),
        ("config.json", r#"{"name": "test", "count": 42}"#),
        ("config.yaml", "name: test\ncount: 42"),
    ];

    for (file, content) in cases {
        let file_path = temp.path().join(file);
        fs::write(&file_path, content).unwrap();
        let config: TestConfig = ConfigStore::new()
            .load(&NormalizedPath::new(&file_path))
            .unwrap();
        assert_eq!(
            config,
            TestConfig {
                name: "test".into(),
                count: 42
            }
        );
    }
}

#[test]
fn test_unknown_extension_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.ini");
    fs::write(&file_path, "name=test").unwrap();

    let result: Result<TestConfig, _> = ConfigStore::new().load(&NormalizedPath::new(&file_path));
    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
}

#[test]
fn test_parse_error_names_format() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.json");
    fs::write(&file_path, "{ not json").unwrap();

    let result: Result<TestConfig, _> = ConfigStore::new().load(&NormalizedPath::new(&file_path));
    match result {
        Err(Error::ConfigParse { format, .. }) => assert_eq!(format, "JSON"),
        other => panic!("expected ConfigParse, got {other:?}"),
    }
}
