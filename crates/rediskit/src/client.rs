//! # Client Handle
//!
//! One live connection per named instance. Direct instances connect to
//! `server`; sentinel instances ask the sentinels for the current master of
//! `master_name` first. Both end up behind a `ConnectionManager`, which
//! multiplexes commands and reconnects on its own.
//!
//! A sentinel instance also follows failovers: when a command fails on the
//! connection or the server answers `READONLY`, the sentinels are asked
//! again and, if the master moved, later commands go to the new master.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::sentinel::{Sentinel, SentinelNodeConnectionInfo};
use redis::{
    Client, ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo, RedisError,
    RedisResult,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::RedisConfig;
use crate::error::{Error, Result};

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_SENTINEL_PORT: u16 = 26379;
const DEFAULT_HOST: &str = "127.0.0.1";

/// How an instance found its server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Direct,
    Sentinel,
}

/// Live handle for one named instance
#[derive(Clone)]
pub struct RedisClient {
    name: String,
    address: String,
    mode: ConnectionMode,
    conn: Arc<RwLock<ConnectionManager>>,
    failover: Option<Arc<Failover>>,
}

/// Sentinel state kept to re-resolve the master
struct Failover {
    config: RedisConfig,
    state: Mutex<FailoverState>,
}

struct FailoverState {
    sentinel: Sentinel,
    master: ConnectionAddr,
}

impl RedisClient {
    /// Build the client for `config` and open its connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unusable addresses, [`Error::Timeout`]
    /// when sentinel resolution exceeds the dial timeout, and the client
    /// library's error when the connection cannot be established.
    pub async fn open(name: &str, config: &RedisConfig) -> Result<Self> {
        let (conn, mode, failover) = if config.is_sentinel() {
            let mut sentinel = build_sentinel(config)?;
            let client = resolve_master(&mut sentinel, config).await?;
            let master = client.get_connection_info().addr.clone();
            info!(name, master = %master, "Resolved Redis master through sentinels");

            let conn = ConnectionManager::new_with_config(client, manager_config(config)).await?;
            let failover = Failover {
                config: config.clone(),
                state: Mutex::new(FailoverState { sentinel, master }),
            };
            (conn, ConnectionMode::Sentinel, Some(Arc::new(failover)))
        } else {
            let client = Client::open(direct_info(config)?)?;
            let conn = ConnectionManager::new_with_config(client, manager_config(config)).await?;
            (conn, ConnectionMode::Direct, None)
        };

        Ok(Self {
            name: name.to_string(),
            address: config.address(),
            mode,
            conn: Arc::new(RwLock::new(conn)),
            failover,
        })
    }

    // Liveness check.
    ///
    /// # Errors
    ///
    /// Returns the client library's error when the server does not answer.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection();
        let reply: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        self.settle(reply).await.map(|_| ())
    }

    /// Turn a command result into the crate's result.
    ///
    /// Sentinel instances re-resolve their master first when the error says
    /// the connection or the master role was lost.
    pub async fn settle<T>(&self, result: RedisResult<T>) -> Result<T> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if let Some(failover) = &self.failover {
            if master_lost(&err) {
                if let Err(resolve_err) = self.fail_over(failover).await {
                    warn!(name = %self.name, error = %resolve_err, "Redis master re-resolution failed");
                }
            }
        }

        Err(err.into())
    }

    async fn fail_over(&self, failover: &Failover) -> Result<()> {
        let mut state = failover.state.lock().await;
        let client = resolve_master(&mut state.sentinel, &failover.config).await?;
        let master = client.get_connection_info().addr.clone();
        if master == state.master {
            return Ok(());
        }

        let conn = ConnectionManager::new_with_config(client, manager_config(&failover.config)).await?;
        *self.conn.write().unwrap_or_else(PoisonError::into_inner) = conn;

        info!(
            name = %self.name,
            from = %state.master,
            to = %master,
            "Redis master changed"
        );
        state.master = master;
        Ok(())
    }

    /// Get raw connection for commands without a wrapper
    pub fn connection(&self) -> ConnectionManager {
        self.conn
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub const fn mode(&self) -> ConnectionMode {
        self.mode
    }
}

impl fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisClient")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn manager_config(config: &RedisConfig) -> ConnectionManagerConfig {
    let mut manager = ConnectionManagerConfig::new();

    if config.max_retries > 0 {
        manager = manager.set_number_of_retries(config.max_retries);
    }
    if let Some(timeout) = config.dial_timeout() {
        manager = manager.set_connection_timeout(timeout);
    }
    if let Some(timeout) = config.response_timeout() {
        manager = manager.set_response_timeout(timeout);
    }

    manager
}

fn redis_info(config: &RedisConfig) -> RedisConnectionInfo {
    RedisConnectionInfo {
        db: config.db,
        password: config.password.clone(),
        ..RedisConnectionInfo::default()
    }
}

fn direct_info(config: &RedisConfig) -> Result<ConnectionInfo> {
    let server = config.server.trim();

    if server.contains("://") {
        let mut info = server.into_connection_info()?;
        if config.db != 0 {
            info.redis.db = config.db;
        }
        if config.password.is_some() {
            info.redis.password.clone_from(&config.password);
        }
        return Ok(info);
    }

    let (host, port) = split_host_port(server, DEFAULT_PORT)?;
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis: redis_info(config),
    })
}

fn master_lost(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.code() == Some("READONLY")
}

fn build_sentinel(config: &RedisConfig) -> Result<Sentinel> {
    let master = config.master_name.as_deref().unwrap_or_default();
    if config.sentinel_addrs.is_empty() {
        return Err(Error::Config(format!(
            "sentinel master `{master}` has no sentinel_addrs"
        )));
    }

    let nodes = config
        .sentinel_addrs
        .iter()
        .map(|addr| {
            let (host, port) = split_host_port(addr, DEFAULT_SENTINEL_PORT)?;
            Ok(ConnectionInfo {
                addr: ConnectionAddr::Tcp(host, port),
                redis: RedisConnectionInfo {
                    username: config.sentinel_username.clone(),
                    password: config.sentinel_password.clone(),
                    ..RedisConnectionInfo::default()
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Sentinel::build(nodes)?)
}

async fn resolve_master(sentinel: &mut Sentinel, config: &RedisConfig) -> Result<Client> {
    let master = config.master_name.as_deref().unwrap_or_default();
    let node_info = SentinelNodeConnectionInfo {
        redis_connection_info: Some(redis_info(config)),
        ..SentinelNodeConnectionInfo::default()
    };

    tracing::debug!(master, sentinels = ?config.sentinel_addrs, "Resolving master through sentinels");

    let lookup = sentinel.async_master_for(master, Some(&node_info));
    let client = match config.dial_timeout() {
        Some(limit) => tokio::time::timeout(limit, lookup)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: config.dial_timeout,
            })??,
        None => lookup.await?,
    };

    Ok(client)
}

/// Split `host:port`, `:port`, `host` or `[v6]:port`.
fn split_host_port(addr: &str, default_port: u16) -> Result<(String, u16)> {
    let addr = addr.trim();
    let invalid = || Error::Config(format!("invalid redis address `{addr}`"));

    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        match tail.strip_prefix(':') {
            Some(port) => (host, Some(port)),
            None if tail.is_empty() => (host, None),
            None => return Err(invalid()),
        }
    } else {
        match addr.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => (addr, None),
            Some((host, port)) => (host, Some(port)),
            None => (addr, None),
        }
    };

    let port = match port {
        Some(port) => port.parse().map_err(|_| invalid())?,
        None => default_port,
    };
    let host = if host.is_empty() { DEFAULT_HOST } else { host };

    Ok((host.to_string(), port))
}
