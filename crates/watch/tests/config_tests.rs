use std::collections::HashMap;
use std::time::Duration;

use assert_matches::assert_matches;
use opsdeck_watch::config::{ConfigError, WatchConfig};

fn load(vars: &[(&str, &str)]) -> Result<WatchConfig, ConfigError> {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    WatchConfig::from_lookup(|key| env.get(key).cloned())
}

const REQUIRED: [(&str, &str); 2] = [
    ("CONSOLE_API_URL", "http://localhost:8080/api/v1"),
    ("PROJECT_ID", "proj-1"),
];

#[test]
fn defaults_apply_when_only_required_vars_set() {
    let config = load(&REQUIRED).unwrap();

    assert_eq!(config.api_url, "http://localhost:8080/api/v1");
    assert_eq!(config.project_id, "proj-1");
    assert_eq!(config.api_token, None);
    assert_eq!(config.poll_interval, Duration::from_secs(10));
    assert_eq!(config.page_size, 20);
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.batch_concurrency, None);
}

#[test]
fn overrides_are_parsed() {
    let mut vars = REQUIRED.to_vec();
    vars.extend([
        ("CONSOLE_API_TOKEN", "secret"),
        ("POLL_INTERVAL_SECS", "3"),
        ("PAGE_SIZE", " 50 "),
        ("REQUEST_TIMEOUT_SECS", "5"),
        ("BATCH_CONCURRENCY", "4"),
    ]);
    let config = load(&vars).unwrap();

    assert_eq!(config.api_token.as_deref(), Some("secret"));
    assert_eq!(config.poll_interval, Duration::from_secs(3));
    assert_eq!(config.page_size, 50);
    assert_eq!(config.batch_concurrency, Some(4));

    let manager = config.manager_config();
    assert_eq!(manager.project_id, "proj-1");
    assert_eq!(manager.page_size, 50);
    assert_eq!(manager.batch_concurrency, Some(4));
    assert!(manager.validate().is_ok());

    let client = config.client_config();
    assert_eq!(client.token.as_deref(), Some("secret"));
    assert_eq!(client.request_timeout, Duration::from_secs(5));
}

#[test]
fn missing_project_is_reported() {
    let result = load(&[("CONSOLE_API_URL", "http://localhost")]);
    assert_matches!(result, Err(ConfigError::Missing("PROJECT_ID")));
}

#[test]
fn blank_values_count_as_unset() {
    let result = load(&[("CONSOLE_API_URL", "  "), ("PROJECT_ID", "proj-1")]);
    assert_matches!(result, Err(ConfigError::Missing("CONSOLE_API_URL")));

    let mut vars = REQUIRED.to_vec();
    vars.push(("CONSOLE_API_TOKEN", ""));
    assert_eq!(load(&vars).unwrap().api_token, None);
}

#[test]
fn out_of_range_page_size_rejected() {
    let mut vars = REQUIRED.to_vec();
    vars.push(("PAGE_SIZE", "500"));
    assert_matches!(load(&vars), Err(ConfigError::Invalid { var: "PAGE_SIZE", .. }));
}

#[test]
fn zero_poll_interval_rejected() {
    let mut vars = REQUIRED.to_vec();
    vars.push(("POLL_INTERVAL_SECS", "0"));
    assert_matches!(
        load(&vars),
        Err(ConfigError::Invalid { var: "POLL_INTERVAL_SECS", .. })
    );
}

#[test]
fn non_numeric_values_rejected() {
    let mut vars = REQUIRED.to_vec();
    vars.push(("REQUEST_TIMEOUT_SECS", "soon"));
    assert_matches!(
        load(&vars),
        Err(ConfigError::Invalid { var: "REQUEST_TIMEOUT_SECS", .. })
    );

    let mut vars = REQUIRED.to_vec();
    vars.push(("BATCH_CONCURRENCY", "0"));
    assert_matches!(
        load(&vars),
        Err(ConfigError::Invalid { var: "BATCH_CONCURRENCY", .. })
    );
}
