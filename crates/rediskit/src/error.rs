//! Error types for the Redis layer

use std::fmt;

use rediskit_hash::HashError;
use thiserror::Error;

/// Errors surfaced by the registry, the client handle and the command wrappers
#[derive(Debug, Error)]
pub enum Error {
    /// One or more instances failed to connect at startup.
    #[error("{0}")]
    Connect(ConnectErrors),

    #[error("the redis client `{0}` is not configured")]
    NotConfigured(String),

    /// `HGETALL` returned no fields.
    #[error("data is empty")]
    NoData,

    #[error("Hash marshaling error: {0}")]
    Hash(HashError),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl Error {
    /// Startup failures the embedding application is expected to exit on.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Connect(_))
    }

    #[must_use]
    pub const fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

impl From<HashError> for Error {
    fn from(err: HashError) -> Self {
        match err {
            HashError::NoData => Self::NoData,
            other => Self::Hash(other),
        }
    }
}

/// A single instance that could not be brought up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFailure {
    pub name: String,
    pub address: String,
    pub reason: String,
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[redis] connect `{}` ({}) failed: {}",
            self.name, self.address, self.reason
        )
    }
}

/// Every failure from one connection pass, in attempt order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectErrors {
    pub failures: Vec<ConnectFailure>,
}

impl ConnectErrors {
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.name.as_str()).collect()
    }
}

impl fmt::Display for ConnectErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
        f.write_str(&lines.join("\n"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_errors_join_with_newlines() {
        let errors = ConnectErrors {
            failures: vec![
                ConnectFailure {
                    name: "cache".into(),
                    address: "10.0.0.1:6379".into(),
                    reason: "connection refused".into(),
                },
                ConnectFailure {
                    name: "queue".into(),
                    address: "10.0.0.2:6379".into(),
                    reason: "timed out".into(),
                },
            ],
        };

        let err = Error::Connect(errors);
        let message = err.to_string();

        assert!(err.is_fatal());
        assert_eq!(message.lines().count(), 2);
        assert!(message.contains("`cache` (10.0.0.1:6379) failed: connection refused"));
        assert!(message.contains("`queue` (10.0.0.2:6379) failed: timed out"));
    }

    #[test]
    fn test_hash_no_data_maps_to_no_data() {
        let err: Error = HashError::NoData.into();
        assert!(err.is_no_data());
        assert!(!err.is_fatal());

        let err: Error = HashError::NotAMap("number").into();
        assert!(matches!(err, Error::Hash(_)));
    }
}
