//! Config file load/save, error-message, and atomic-write tests.
//! Layout: ~/.courier/config.yaml

use assert_fs::prelude::*;
use courier_core::{
    config::{self, CourierConfig},
    ConfigError,
};
use predicates::prelude::predicate;
use std::fs;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_returns_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = config::load_at(home.path()).expect("load");
    assert_eq!(config, CourierConfig::default());
}

#[test]
fn load_empty_file_returns_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".courier/config.yaml").write_str("\n").expect("write");
    let config = config::load_at(home.path()).expect("load");
    assert_eq!(config, CourierConfig::default());
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".courier/config.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("config.yaml"), "must contain file path, got: {msg}");
}

#[test]
fn partial_config_fills_remaining_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".courier/config.yaml")
        .write_str("database: /data/chat.db\nlistener:\n  debounce_ms: 250\noutgoing:\n  text_timeout_ms: 5000\n")
        .expect("write");

    let config = config::load_at(home.path()).expect("load");
    assert_eq!(config.database, Some(PathBuf::from("/data/chat.db")));
    assert_eq!(config.listener.debounce_ms, 250);
    assert_eq!(config.listener.max_interval_ms, 5_000, "unset fields keep defaults");
    assert_eq!(config.outgoing.text_timeout_ms, 5_000);
    assert_eq!(config.outgoing.attachment_timeout_ms, 180_000);
}

#[test]
fn wrong_type_yaml_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".courier/config.yaml")
        .write_str("- this is a list, not a mapping\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Save
// ---------------------------------------------------------------------------

#[test]
fn save_writes_file_and_cleans_up_tmp() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut config = CourierConfig::default();
    config.listener.max_retries = 5;

    let path = config::save_at(home.path(), &config).expect("save");

    home.child(".courier/config.yaml").assert(predicate::path::exists());
    home.child(".courier/config.yaml.tmp").assert(predicate::path::missing());
    assert_eq!(config::load_at(home.path()).expect("reload"), config);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = config::save_at(home.path(), &CourierConfig::default()).expect("save");
    let original_bytes = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = path.with_file_name("config.yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    assert_eq!(original_bytes, fs::read(&path).expect("read after crash"));
    assert!(config::load_at(home.path()).is_ok(), "stale .tmp must not affect load");
}
