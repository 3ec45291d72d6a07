//! # rediskit
//!
//! Named Redis clients for services that talk to more than one Redis.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  RedisConfigs  (serde / REDIS_* environment)             │
//! └──────────────────────────────────────────────────────────┘
//!                              │ Registry::connect
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  Registry      name -> Arc<RedisClient>                  │
//! └──────────────────────────────────────────────────────────┘
//!                              │ client_named / Redis::with_name
//!                              ▼
//! ┌──────────────────────────┐   ┌───────────────────────────┐
//! │  Redis  (command calls)  │──▶│  rediskit_hash            │
//! │  get/set/hmset/hgetall.. │   │  struct <-> hash fields   │
//! └──────────────────────────┘   └───────────────────────────┘
//! ```
//!
//! Instances connect directly or through Redis Sentinel, chosen per
//! instance by `master_name`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rediskit::{configs_from_env, Redis, Registry};
//!
//! let registry = Registry::from_configs(&configs_from_env()).await?;
//! let redis = Redis::with_name(&registry, "default");
//!
//! redis.hmset("user:4", &user).await?;
//! let user: User = redis.hgetall("user:4").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod registry;

// Re-export commonly used types
pub use client::{ConnectionMode, RedisClient};
pub use commands::{Redis, Ttl, CACHE_DAY_TTL, CACHE_HOUR_TTL, CACHE_MIN_TTL, CACHE_WEEK_TTL};
pub use config::{configs_from_env, RedisConfig, RedisConfigs, DEFAULT_INSTANCE};
pub use error::{ConnectErrors, ConnectFailure, Error, Result};
pub use registry::{Connector, RedisConnector, Registry};

pub use rediskit_hash as hash;
pub use rediskit_hash::{from_hash, to_hash, HashScan, JsonObject};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Connect every instance configured in the environment.
///
/// # Errors
///
/// Returns [`Error::Connect`] if any instance fails to connect.
pub async fn connect_from_env() -> Result<Registry> {
    Registry::from_configs(&configs_from_env()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
