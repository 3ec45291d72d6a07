//! # Connection Configuration
//!
//! Per-instance connection settings, loadable through serde (any format the
//! embedding application uses) or from environment variables.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name used when a caller does not ask for a specific instance.
pub const DEFAULT_INSTANCE: &str = "default";

/// Named instance configurations, connected in name order.
pub type RedisConfigs = BTreeMap<String, RedisConfig>;

/// Redis connection configuration for one named instance.
///
/// Timeouts are whole seconds; `0` keeps the client library default, as does
/// `max_retries == 0`. Setting `master_name` switches the instance to
/// sentinel mode, where `server` is ignored and the master address is asked
/// from `sentinel_addrs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// `host:port`, `:port`, `host`, or a `redis://` / `rediss://` URL
    pub server: String,
    pub password: Option<String>,
    pub db: i64,
    pub max_retries: usize,
    pub dial_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,

    // sentinel
    pub master_name: Option<String>,
    pub sentinel_addrs: Vec<String>,
    pub sentinel_username: Option<String>,
    pub sentinel_password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
            max_retries: 0,
            dial_timeout: 0,
            read_timeout: 0,
            write_timeout: 0,
            master_name: None,
            sentinel_addrs: Vec::new(),
            sentinel_username: None,
            sentinel_password: None,
        }
    }
}

impl RedisConfig {
    /// Direct connection to `server` with default settings.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Sentinel-resolved connection to `master_name`.
    pub fn sentinel<I, S>(master_name: impl Into<String>, sentinel_addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            master_name: Some(master_name.into()),
            sentinel_addrs: sentinel_addrs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Whether this instance resolves its master through sentinels.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.master_name.as_deref().is_some_and(|name| !name.is_empty())
    }

    /// Address used in logs and failure reports.
    #[must_use]
    pub fn address(&self) -> String {
        match &self.master_name {
            Some(master) if self.is_sentinel() => {
                format!("{master}@{}", self.sentinel_addrs.join(","))
            }
            _ => self.server.clone(),
        }
    }

    #[must_use]
    pub const fn dial_timeout(&self) -> Option<Duration> {
        seconds(self.dial_timeout)
    }

    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> {
        seconds(self.read_timeout)
    }

    #[must_use]
    pub const fn write_timeout(&self) -> Option<Duration> {
        seconds(self.write_timeout)
    }

    /// Per-command response timeout: the larger of the read and write timeouts.
    #[must_use]
    pub fn response_timeout(&self) -> Option<Duration> {
        match (self.read_timeout(), self.write_timeout()) {
            (Some(read), Some(write)) => Some(read.max(write)),
            (read, write) => read.or(write),
        }
    }

    /// Load the `default` instance from `REDIS_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_prefix("REDIS_")
    }

    /// Load an instance from `{prefix}SERVER`, `{prefix}PASSWORD`, ...
    #[must_use]
    pub fn from_env_prefix(prefix: &str) -> Self {
        Self::from_lookup(prefix, |key| env::var(key).ok())
    }

    /// Load an instance through an arbitrary variable lookup.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{prefix}{name}")).filter(|value| !value.trim().is_empty())
        };
        let defaults = Self::default();

        Self {
            server: var("SERVER").unwrap_or(defaults.server),
            password: var("PASSWORD"),
            db: var("DB")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.db),
            max_retries: var("MAX_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_retries),
            dial_timeout: var("DIAL_TIMEOUT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.dial_timeout),
            read_timeout: var("READ_TIMEOUT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.read_timeout),
            write_timeout: var("WRITE_TIMEOUT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.write_timeout),
            master_name: var("MASTER_NAME"),
            sentinel_addrs: var("SENTINEL_ADDRS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            sentinel_username: var("SENTINEL_USERNAME"),
            sentinel_password: var("SENTINEL_PASSWORD"),
        }
    }
}

/// Load every instance named in `REDIS_INSTANCES` (default: `default`).
///
/// The `default` instance reads `REDIS_*`; any other instance `cache` reads
/// `REDIS_CACHE_*`.
#[must_use]
pub fn configs_from_env() -> RedisConfigs {
    configs_from_lookup(|key| env::var(key).ok())
}

/// [`configs_from_env`] through an arbitrary variable lookup.
pub fn configs_from_lookup<F>(lookup: F) -> RedisConfigs
where
    F: Fn(&str) -> Option<String>,
{
    let names = lookup("REDIS_INSTANCES")
        .map(|v| split_list(&v))
        .filter(|names| !names.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_INSTANCE.to_string()]);

    names
        .into_iter()
        .map(|name| {
            let prefix = env_prefix(&name);
            let config = RedisConfig::from_lookup(&prefix, &lookup);
            (name, config)
        })
        .collect()
}

fn env_prefix(name: &str) -> String {
    if name == DEFAULT_INSTANCE {
        "REDIS_".to_string()
    } else {
        let upper: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("REDIS_{upper}_")
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

const fn seconds(value: u64) -> Option<Duration> {
    if value == 0 {
        None
    } else {
        Some(Duration::from_secs(value))
    }
}
