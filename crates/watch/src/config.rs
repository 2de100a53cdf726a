//! Watcher configuration loaded from environment variables.
//!
//! | Variable               | Required | Default     | Description                              |
//! |------------------------|----------|-------------|------------------------------------------|
//! | `CONSOLE_API_URL`      | yes      | --          | Base API URL, e.g. `https://host/api/v1` |
//! | `CONSOLE_API_TOKEN`    | no       | --          | Bearer token attached to every request   |
//! | `PROJECT_ID`           | yes      | --          | Project whose instances are watched      |
//! | `POLL_INTERVAL_SECS`   | no       | `10`        | Seconds between list refreshes           |
//! | `PAGE_SIZE`            | no       | `20`        | Instances per page (1-100)               |
//! | `REQUEST_TIMEOUT_SECS` | no       | `30`        | Per-request HTTP timeout                 |
//! | `BATCH_CONCURRENCY`    | no       | unbounded   | Max concurrent deletes in a batch        |

use std::time::Duration;

use opsdeck_client::ClientConfig;
use opsdeck_core::pagination::{validate_page_size, DEFAULT_PAGE_SIZE};
use opsdeck_workflow::ManagerConfig;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors raised while reading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub project_id: String,
    pub poll_interval: Duration,
    pub page_size: u32,
    pub request_timeout: Duration,
    pub batch_concurrency: Option<usize>,
}

impl WatchConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = get("CONSOLE_API_URL").ok_or(ConfigError::Missing("CONSOLE_API_URL"))?;
        let project_id = get("PROJECT_ID").ok_or(ConfigError::Missing("PROJECT_ID"))?;
        let api_token = get("CONSOLE_API_TOKEN");

        let poll_secs: u64 = parse_or("POLL_INTERVAL_SECS", get("POLL_INTERVAL_SECS"), DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_SECS",
                reason: "must be at least 1".to_string(),
            });
        }

        let page_size: u32 = parse_or("PAGE_SIZE", get("PAGE_SIZE"), DEFAULT_PAGE_SIZE)?;
        validate_page_size(page_size).map_err(|e| ConfigError::Invalid {
            var: "PAGE_SIZE",
            reason: e.to_string(),
        })?;

        let timeout_secs: u64 = parse_or(
            "REQUEST_TIMEOUT_SECS",
            get("REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        let batch_concurrency = match get("BATCH_CONCURRENCY") {
            None => None,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "BATCH_CONCURRENCY",
                        reason: format!("expected a positive integer, got \"{raw}\""),
                    })
                }
            },
        };

        Ok(Self {
            api_url,
            api_token,
            project_id,
            poll_interval: Duration::from_secs(poll_secs),
            page_size,
            request_timeout: Duration::from_secs(timeout_secs),
            batch_concurrency,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_url.clone(),
            token: self.api_token.clone(),
            request_timeout: self.request_timeout,
        }
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            project_id: self.project_id.clone(),
            page_size: self.page_size,
            poll_interval: self.poll_interval,
            batch_concurrency: self.batch_concurrency,
        }
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("\"{raw}\": {e}"),
        }),
    }
}
