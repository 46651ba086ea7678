use super::*;
use crate::error::{CliError, ConfigError};
use figment::providers::Env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// Prefix no real environment uses, so these tests see no TESSEL_* values.
fn isolated_env() -> Env {
    Env::prefixed("TESSEL_CONFIG_TESTS_UNSET_")
}

#[test]
fn test_defaults() {
    let config = TesselConfig::default();
    assert_eq!(config.port, 3000);
    assert_eq!(config.default_browser, "chrome80");
    assert!(config.watch);
    assert!(config.bundler.minify);
    assert_eq!(config.addr(), "127.0.0.1:3000");
}

#[test]
fn test_file_then_flags() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tessel.config.json");
    fs::write(
        &path,
        r#"{
            "port": 4000,
            "default_browser": "firefox100",
            "bundler": { "minify": false },
            "headless": { "load_timeout_ms": 5000 }
        }"#,
    )
    .unwrap();

    let overrides = ConfigOverrides {
        port: Some(4500),
        headless: Some(HeadlessOverrides {
            chrome_path: Some("/opt/chrome".into()),
        }),
        ..Default::default()
    };
    let config = TesselConfig::load_with_env(&overrides, Some(&path), isolated_env()).unwrap();

    assert_eq!(config.port, 4500);
    assert_eq!(config.default_browser, "firefox100");
    assert!(!config.bundler.minify);
    assert!(config.bundler.sourcemap);
    assert_eq!(config.headless.load_timeout_ms, 5000);
    assert_eq!(config.headless.chrome_path, Some(PathBuf::from("/opt/chrome")));
}

#[test]
fn test_env_between_file_and_flags() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    fs::write(&path, r#"{ "port": 4000, "host": "0.0.0.0" }"#).unwrap();

    unsafe {
        std::env::set_var("TESSEL_CONFIG_TESTS_ENV_PORT", "4100");
        std::env::set_var("TESSEL_CONFIG_TESTS_ENV_HEADLESS__LOAD_TIMEOUT_MS", "250");
    }
    let env = Env::prefixed("TESSEL_CONFIG_TESTS_ENV_");
    let config = TesselConfig::load_with_env(&ConfigOverrides::default(), Some(&path), env).unwrap();
    unsafe {
        std::env::remove_var("TESSEL_CONFIG_TESTS_ENV_PORT");
        std::env::remove_var("TESSEL_CONFIG_TESTS_ENV_HEADLESS__LOAD_TIMEOUT_MS");
    }

    assert_eq!(config.port, 4100);
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.headless.load_timeout_ms, 250);
}

#[test]
fn test_missing_explicit_file() {
    let err = TesselConfig::load(&ConfigOverrides::default(), Some(Path::new("/nonexistent/tessel.json")))
        .unwrap_err();
    assert!(matches!(err, CliError::Config(ConfigError::NotFound(_))));
}

#[test]
fn test_wrong_type_is_invalid() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tessel.config.json");
    fs::write(&path, r#"{ "port": "not a number" }"#).unwrap();

    let err = TesselConfig::load_with_env(&ConfigOverrides::default(), Some(&path), isolated_env())
        .unwrap_err();
    assert!(matches!(err, CliError::Config(ConfigError::Invalid(_))));
}

#[test]
fn test_validate() {
    let temp = TempDir::new().unwrap();
    let config = TesselConfig {
        root: temp.path().to_path_buf(),
        ..Default::default()
    };
    config.validate().unwrap();

    let missing_root = TesselConfig {
        root: temp.path().join("missing"),
        ..config.clone()
    };
    assert!(missing_root.validate().is_err());

    let zero_port = TesselConfig {
        port: 0,
        ..config.clone()
    };
    assert!(zero_port.validate().is_err());

    let bad_browser = TesselConfig {
        default_browser: "Chrome".into(),
        ..config
    };
    assert!(bad_browser.validate().is_err());
}

#[test]
fn test_browser_targets() {
    assert!(validate_browser_target("chrome80").is_ok());
    assert!(validate_browser_target("safari13").is_ok());
    assert!(validate_browser_target("default").is_err());
    assert!(validate_browser_target("chrome").is_err());
    assert!(validate_browser_target("80").is_err());
}

#[test]
fn test_conversions() {
    let config = TesselConfig {
        headless: HeadlessSettings {
            chrome_path: Some("/usr/bin/chromium".into()),
            load_timeout_ms: 1500,
        },
        watch: false,
        ..Default::default()
    };

    let headless = config.headless_config();
    assert_eq!(headless.load_timeout, Duration::from_millis(1500));
    assert_eq!(headless.launch.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));

    let build = config.build_configuration("safari13");
    assert_eq!(build.target_browser(), "safari13");
    assert!(!build.watch());

    assert_eq!(config.bundler_options(), BundlerOptions::default());
}
