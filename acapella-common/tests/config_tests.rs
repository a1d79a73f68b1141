//! Configuration resolution tests
//!
//! Priority order is CLI → ENV → TOML → default for every setting.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate ACAPELLA_* or GOOGLE_* variables are marked with
//! #[serial] so they run sequentially.

use acapella_common::config::{
    ConfigOverrides, IngestConfig, TomlConfig, CONFIG_FILE_ENV, DATABASE_ENV, OUTPUT_DIR_ENV,
    SEARCH_API_KEY_ENV, SEARCH_ENGINE_ID_ENV, USER_AGENT_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    for name in [
        CONFIG_FILE_ENV,
        OUTPUT_DIR_ENV,
        DATABASE_ENV,
        USER_AGENT_ENV,
        SEARCH_API_KEY_ENV,
        SEARCH_ENGINE_ID_ENV,
    ] {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_defaults_when_nothing_configured() {
    clear_env();

    let config = IngestConfig::resolve(&ConfigOverrides::default(), &TomlConfig::default());

    assert_eq!(config.output_dir, PathBuf::from("./fetched"));
    assert!(config.database_path.ends_with("acapella.db"));
    assert!(config.user_agent.starts_with("Acapella/"));
    assert!(config.search_api_key.is_none());
    assert!(!config.enrich_track_links);
    assert_eq!(config.import_concurrency, 4);
}

#[test]
#[serial]
fn test_toml_used_when_no_env_or_cli() {
    clear_env();

    let toml = TomlConfig {
        output_dir: Some(PathBuf::from("/toml/out")),
        search_api_key: Some("toml-key".to_string()),
        import_concurrency: Some(2),
        ..Default::default()
    };

    let config = IngestConfig::resolve(&ConfigOverrides::default(), &toml);

    assert_eq!(config.output_dir, PathBuf::from("/toml/out"));
    assert_eq!(config.search_api_key.as_deref(), Some("toml-key"));
    assert_eq!(config.import_concurrency, 2);
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    env::set_var(OUTPUT_DIR_ENV, "/env/out");
    env::set_var(SEARCH_API_KEY_ENV, "env-key");

    let toml = TomlConfig {
        output_dir: Some(PathBuf::from("/toml/out")),
        search_api_key: Some("toml-key".to_string()),
        ..Default::default()
    };

    let config = IngestConfig::resolve(&ConfigOverrides::default(), &toml);

    assert_eq!(config.output_dir, PathBuf::from("/env/out"));
    assert_eq!(config.search_api_key.as_deref(), Some("env-key"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var(DATABASE_ENV, "/env/acapella.db");

    let cli = ConfigOverrides {
        database_path: Some(PathBuf::from("/cli/acapella.db")),
        import_concurrency: Some(0),
        ..Default::default()
    };

    let config = IngestConfig::resolve(&cli, &TomlConfig::default());

    assert_eq!(config.database_path, PathBuf::from("/cli/acapella.db"));
    // Concurrency is clamped to at least one worker
    assert_eq!(config.import_concurrency, 1);

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_value_is_ignored() {
    clear_env();
    env::set_var(SEARCH_ENGINE_ID_ENV, "   ");

    let toml = TomlConfig {
        search_engine_id: Some("toml-cx".to_string()),
        ..Default::default()
    };

    let config = IngestConfig::resolve(&ConfigOverrides::default(), &toml);
    assert_eq!(config.search_engine_id.as_deref(), Some("toml-cx"));

    clear_env();
}

#[test]
#[serial]
fn test_missing_config_file_does_not_error() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    let config = TomlConfig::load_or_default(Some(&temp_dir.path().join("absent.toml")));
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_malformed_config_file_degrades_to_default() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "output_dir = [").unwrap();

    let config = TomlConfig::load_or_default(Some(&path));
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_config_file_from_env_location() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    std::fs::write(&path, "enrich_track_links = true\n").unwrap();
    env::set_var(CONFIG_FILE_ENV, &path);

    let config = TomlConfig::load_or_default(None);
    assert_eq!(config.enrich_track_links, Some(true));

    clear_env();
}
