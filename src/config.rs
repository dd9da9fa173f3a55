//! read manager configuration from a file, the environment or explicit values

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::Error;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_REFRESH_STALE_SECS: u64 = 120;

const ENV_MAX_ATTEMPTS: &str = "BEARER_DISPATCH_MAX_ATTEMPTS";
const ENV_REFRESH_TIMEOUT: &str = "BEARER_DISPATCH_REFRESH_TIMEOUT_SECS";
const ENV_REFRESH_STALE: &str = "BEARER_DISPATCH_REFRESH_STALE_SECS";
const ENV_REQUEST_TIMEOUT: &str = "BEARER_DISPATCH_REQUEST_TIMEOUT_SECS";
const ENV_USER_AGENT: &str = "BEARER_DISPATCH_USER_AGENT";

pub enum ConfigLocation {
    File(String),
    Env,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Refresh rounds permitted before callers get `AttemptsExhausted`.
    pub max_attempts: u32,
    /// Settle a refresh round as failed when it has not called back in time.
    pub refresh_timeout_secs: Option<u64>,
    /// A later 401 may start a new round once the running one is this old.
    /// `None` never reclaims the latch.
    pub refresh_stale_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            refresh_timeout_secs: None,
            refresh_stale_secs: Some(DEFAULT_REFRESH_STALE_SECS),
            request_timeout_secs: None,
            user_agent: None,
        }
    }
}

impl Config {
    pub fn from_values(
        max_attempts: u32,
        refresh_timeout_secs: Option<u64>,
        request_timeout_secs: Option<u64>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            max_attempts,
            refresh_timeout_secs,
            request_timeout_secs,
            user_agent,
            ..Self::default()
        }
    }

    pub fn load(loc: ConfigLocation) -> Result<Self, Error> {
        match loc {
            ConfigLocation::File(path) => Self::from_file(path),
            ConfigLocation::Env => Self::from_env(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()
    }

    /// Unset variables keep their defaults; unparsable ones are rejected.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let config = Config {
            max_attempts: parse_var(&lookup, ENV_MAX_ATTEMPTS)?.unwrap_or(defaults.max_attempts),
            refresh_timeout_secs: parse_var(&lookup, ENV_REFRESH_TIMEOUT)?,
            refresh_stale_secs: parse_var(&lookup, ENV_REFRESH_STALE)?
                .or(defaults.refresh_stale_secs),
            request_timeout_secs: parse_var(&lookup, ENV_REQUEST_TIMEOUT)?,
            user_agent: lookup(ENV_USER_AGENT).filter(|ua| !ua.trim().is_empty()),
        };
        config.validate()
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        self.refresh_timeout_secs.map(Duration::from_secs)
    }

    pub fn refresh_stale_after(&self) -> Option<Duration> {
        self.refresh_stale_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn validate(self) -> Result<Self, Error> {
        if self.refresh_timeout_secs == Some(0) {
            return Err(Error::Config("refresh_timeout_secs must be > 0".into()));
        }
        if self.refresh_stale_secs == Some(0) {
            return Err(Error::Config("refresh_stale_secs must be > 0".into()));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(Error::Config("request_timeout_secs must be > 0".into()));
        }
        Ok(self)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {key} value '{raw}': {e}"))),
    }
}
