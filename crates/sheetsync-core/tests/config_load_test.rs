#![allow(clippy::expect_used, clippy::unwrap_used)]

//! File-based configuration loading.

use std::io::Write;
use std::path::Path;

use sheetsync_core::config::{load_config, ConfigError};

#[test]
fn explicit_config_file_is_applied() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "sheet:\n  spreadsheet_id: sheet-42\n  sheet_name: Events\nbounds:\n  max_x: 1000\n  max_y: 500\nretry:\n  max_attempts: 5"
    )
    .unwrap();

    let (cfg, used) = load_config(Some(file.path())).unwrap();
    assert_eq!(used.as_deref(), Some(file.path()));
    assert_eq!(cfg.sheet.spreadsheet_id, "sheet-42");
    assert_eq!(cfg.sheet.sheet_name, "Events");
    assert_eq!(cfg.bounds.max_x, 1000.0);
    assert_eq!(cfg.bounds.max_y, 500.0);
    assert_eq!(cfg.retry.max_attempts, 5);
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let err = load_config(Some(Path::new("/nonexistent/sheetsync/config.yaml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }), "err={err}");
}

#[test]
fn invalid_values_in_file_fail_validation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "logging:\n  format: xml").unwrap();

    let err = load_config(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("logging.format"), "err={err}");
}
