//! Tests for config functionality.

use crate::config::Config;
use crate::error::WardenError;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.lock_stale_timeout_ms, 30_000);
    assert!(config.lock_auto_cleanup);
    assert_eq!(config.lock_acquire_timeout_ms, 10_000);
    assert_eq!(config.lock_retry_interval_ms, 50);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
lock_stale_timeout_ms: 5000
lock_auto_cleanup: false
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.lock_stale_timeout_ms, 5000);
    assert!(!config.lock_auto_cleanup);

    // Unspecified values should use defaults
    assert_eq!(config.lock_acquire_timeout_ms, 10_000);
    assert_eq!(config.lock_retry_interval_ms, 50);
}

#[test]
fn test_parse_yaml_with_unknown_fields() {
    let yaml = r#"
lock_retry_interval_ms: 20
unknown_field: "some value"
another_unknown:
  nested: true
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.lock_retry_interval_ms, 20);
}

#[test]
fn test_validate_zero_durations() {
    for field in [
        "lock_stale_timeout_ms",
        "lock_acquire_timeout_ms",
        "lock_retry_interval_ms",
    ] {
        let err = Config::from_yaml(&format!("{}: 0", field)).unwrap_err();
        assert!(matches!(err, WardenError::UserError(_)));
        assert!(err.to_string().contains(field), "{}", err);
    }
}

#[test]
fn test_validate_retry_interval_exceeds_timeout() {
    let yaml = r#"
lock_acquire_timeout_ms: 100
lock_retry_interval_ms: 500
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("must not exceed"));
}

#[test]
fn test_invalid_yaml_is_user_error() {
    let err = Config::from_yaml("lock_auto_cleanup: [not, a, bool]").unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));
}

#[test]
fn test_lock_options_conversion() {
    let config = Config {
        lock_stale_timeout_ms: 5000,
        lock_auto_cleanup: true,
        lock_acquire_timeout_ms: 200,
        lock_retry_interval_ms: 10,
    };

    let options = config.lock_options();
    assert_eq!(options.stale_timeout, Duration::from_secs(5));
    assert_eq!(options.acquire.timeout, Duration::from_millis(200));
    assert_eq!(options.acquire.retry_interval, Duration::from_millis(10));
    assert!(options.acquire.auto_cleanup);
}

#[test]
fn test_to_yaml() {
    let config = Config {
        lock_stale_timeout_ms: 1234,
        ..Config::default()
    };
    let yaml = config.to_yaml().unwrap();

    let parsed = Config::from_yaml(&yaml).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_load_from_file() {
    use std::io::Write;
    use tempfile::NamedTempFile;

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "lock_acquire_timeout_ms: 700").unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.lock_acquire_timeout_ms, 700);
}

#[test]
fn test_config_load_missing_file() {
    let result = Config::load("/nonexistent/path/config.yaml");
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_load_or_default_without_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = Config::load_or_default(temp_dir.path().join("config.yaml")).unwrap();
    assert_eq!(config, Config::default());
}
