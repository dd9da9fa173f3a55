use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use bearer_dispatch::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REFRESH_STALE_SECS};
use bearer_dispatch::{Config, ConfigLocation, Error};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_allow_two_attempts_and_no_timeouts() {
    let config = Config::default();
    assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    assert_eq!(config.max_attempts, 2);
    assert_eq!(config.refresh_timeout(), None);
    assert_eq!(config.request_timeout(), None);
    assert_eq!(
        config.refresh_stale_after(),
        Some(Duration::from_secs(DEFAULT_REFRESH_STALE_SECS))
    );
}

#[test]
fn env_overrides_defaults() {
    let config = Config::from_env_with(lookup(&[
        ("BEARER_DISPATCH_MAX_ATTEMPTS", "5"),
        ("BEARER_DISPATCH_REFRESH_TIMEOUT_SECS", " 30 "),
        ("BEARER_DISPATCH_REFRESH_STALE_SECS", "45"),
        ("BEARER_DISPATCH_USER_AGENT", "demo/1.0"),
    ]))
    .expect("valid env");
    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.refresh_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.refresh_stale_after(), Some(Duration::from_secs(45)));
    assert_eq!(config.request_timeout(), None);
    assert_eq!(config.user_agent.as_deref(), Some("demo/1.0"));
}

#[test]
fn empty_env_yields_defaults() {
    let config = Config::from_env_with(lookup(&[])).expect("defaults");
    assert_eq!(config, Config::default());
}

#[test]
fn unparsable_env_value_is_rejected() {
    let err = Config::from_env_with(lookup(&[("BEARER_DISPATCH_MAX_ATTEMPTS", "many")]))
        .expect_err("non-numeric attempts");
    match err {
        Error::Config(msg) => assert!(msg.contains("BEARER_DISPATCH_MAX_ATTEMPTS")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn zero_timeout_is_rejected() {
    let err = Config::from_env_with(lookup(&[("BEARER_DISPATCH_REQUEST_TIMEOUT_SECS", "0")]))
        .expect_err("zero timeout");
    assert!(matches!(err, Error::Config(_)));

    let err = Config::from_env_with(lookup(&[("BEARER_DISPATCH_REFRESH_STALE_SECS", "0")]))
        .expect_err("zero staleness bound");
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn file_config_fills_missing_fields_with_defaults() {
    let mut cfg_path = PathBuf::from("target");
    cfg_path.push("test-config-bearer-dispatch.json");
    fs::create_dir_all("target").ok();
    let cfg = serde_json::json!({ "max_attempts": 3, "request_timeout_secs": 10 });
    fs::write(&cfg_path, serde_json::to_string(&cfg).unwrap()).unwrap();

    let config = Config::load(ConfigLocation::File(cfg_path.to_string_lossy().to_string()))
        .expect("config file");
    assert_eq!(
        config,
        Config::from_values(3, None, Some(10), None),
        "unspecified fields keep defaults"
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let err = Config::from_file("target/does-not-exist.json").expect_err("missing file");
    assert!(matches!(err, Error::Io(_)));
}
