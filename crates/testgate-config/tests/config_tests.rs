//! Configuration loading and precedence tests

use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use testgate_config::{ConfigError, ConfigLoader, ProjectConfig, CONFIG_FILE_NAME};

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, content).unwrap();
    config_path
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
fn test_load_from_subdirectory_finds_parent() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[sources]
cases = ["tests/*.toml"]
"#,
    );

    let sub2 = temp_dir.path().join("sub1").join("sub2");
    fs::create_dir_all(&sub2).unwrap();

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(&sub2)
        .unwrap();

    assert_eq!(config.project_root(), Some(temp_dir.path()));
    assert_eq!(config.project.sources.cases, vec!["tests/*.toml".to_string()]);
}

#[test]
fn test_load_with_empty_config() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "");

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert!(config.is_project());
    assert_eq!(config.project, ProjectConfig::default());
}

#[test]
fn test_load_from_specific_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(
        temp_dir.path(),
        r#"
[coverage]
program = "tools/dtoc/dtoc"
required = ["fdt"]
"#,
    );

    let config = ConfigLoader::new().without_env().load_from_file(&path).unwrap();
    let coverage = config.project.coverage.unwrap();
    assert_eq!(coverage.program, Some(PathBuf::from("tools/dtoc/dtoc")));
    assert_eq!(coverage.required, vec!["fdt".to_string()]);
}

#[test]
fn test_missing_specific_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = ConfigLoader::new()
        .without_env()
        .load_from_file(&temp_dir.path().join(CONFIG_FILE_NAME));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

// ============================================================================
// Error Tests
// ============================================================================

#[rstest]
#[case::bad_toml("[run\nprocesses = 2")]
#[case::unknown_section("[runner]\nprocesses = 2")]
#[case::wrong_type("[run]\nprocesses = \"many\"")]
fn test_invalid_config_reports_file(#[case] content: &str) {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), content);

    let err = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path())
        .unwrap_err();

    match err {
        ConfigError::TomlParseError { file, .. } => {
            assert_eq!(file, temp_dir.path().join(CONFIG_FILE_NAME))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_invalid_verbosity_message() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[run]\nverbosity = 7");

    let err = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path())
        .unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @"Invalid value for 'run.verbosity': must be between 0 and 4, got 7"
    );
}

// ============================================================================
// Environment Override Tests
// ============================================================================

#[test]
#[serial]
fn test_env_toolpath_appends() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[run]\ntoolpath = [\"/opt/a\"]");

    let joined = env::join_paths(["/opt/b", "/opt/c"]).unwrap();
    env::set_var("TESTGATE_TOOLPATH", &joined);
    let config = ConfigLoader::new().load_from_directory(temp_dir.path());
    env::remove_var("TESTGATE_TOOLPATH");

    assert_eq!(
        config.unwrap().project.run.toolpath,
        vec![
            PathBuf::from("/opt/a"),
            PathBuf::from("/opt/b"),
            PathBuf::from("/opt/c")
        ]
    );
}

#[test]
#[serial]
fn test_env_debug_and_coverage_tool() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("TESTGATE_DEBUG", "yes");
    env::set_var("TESTGATE_COVERAGE_TOOL", "coverage3");
    let config = ConfigLoader::new().load_from_directory(temp_dir.path());
    env::remove_var("TESTGATE_DEBUG");
    env::remove_var("TESTGATE_COVERAGE_TOOL");

    let config = config.unwrap();
    assert_eq!(config.project.run.debug, Some(true));
    assert_eq!(config.project.coverage_tool(), "coverage3");
}

#[test]
#[serial]
fn test_without_env_ignores_overrides() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("TESTGATE_PROCESSES", "3");
    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path());
    env::remove_var("TESTGATE_PROCESSES");

    assert_eq!(config.unwrap().project.run.processes, None);
}
