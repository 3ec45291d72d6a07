//! # Client Registry
//!
//! Maps instance names to live handles. Built once at startup from
//! [`RedisConfigs`], then shared read-only (typically behind an `Arc`).
//!
//! A connection pass attempts every configured instance. Successes are
//! installed immediately, replacing any handle already held under that
//! name; failures leave the previous handle in place and are reported
//! together once the pass finishes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::client::RedisClient;
use crate::config::{RedisConfig, RedisConfigs, DEFAULT_INSTANCE};
use crate::error::{ConnectErrors, ConnectFailure, Error, Result};

// Opens and pings handles for the registry.
///
/// [`RedisConnector`] is the production implementation; tests and embedders
/// can supply their own.
#[async_trait]
pub trait Connector: Send + Sync {
    type Handle: Send + Sync;

    async fn open(&self, name: &str, config: &RedisConfig) -> Result<Self::Handle>;

    async fn ping(&self, handle: &Self::Handle) -> Result<()>;
}

/// Connects real Redis clients
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl Connector for RedisConnector {
    type Handle = RedisClient;

    async fn open(&self, name: &str, config: &RedisConfig) -> Result<RedisClient> {
        RedisClient::open(name, config).await
    }

    async fn ping(&self, handle: &RedisClient) -> Result<()> {
        handle.ping().await
    }
}

/// Named handles
#[derive(Debug)]
pub struct Registry<H = RedisClient> {
    clients: HashMap<String, Arc<H>>,
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }
}

impl Registry<RedisClient> {
    /// Connect every configured instance with [`RedisConnector`].
    ///
    /// All or nothing: see [`Registry::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] naming each instance that failed.
    pub async fn from_configs(configs: &RedisConfigs) -> Result<Self> {
        Self::connect(&RedisConnector, configs).await
    }
}

impl<H: Send + Sync> Registry<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from one connection pass.
    ///
    /// The registry is only returned when every instance connects. On any
    /// failure it is dropped together with the handles that did connect;
    /// use [`Registry::connect_all`] on an existing registry to keep them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] naming each instance that failed.
    pub async fn connect<C>(connector: &C, configs: &RedisConfigs) -> Result<Self>
    where
        C: Connector<Handle = H>,
    {
        let mut registry = Self::new();
        registry.connect_all(connector, configs).await?;
        Ok(registry)
    }

    /// Run a connection pass over `configs`.
    ///
    /// Every instance is attempted even after a failure. An instance counts
    /// as connected once it opens and answers a ping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] naming each instance that failed; the
    /// instances that succeeded are installed regardless.
    pub async fn connect_all<C>(&mut self, connector: &C, configs: &RedisConfigs) -> Result<()>
    where
        C: Connector<Handle = H>,
    {
        let mut errors = ConnectErrors::default();

        for (name, config) in configs {
            let address = config.address();
            info!(
                name = %name,
                address = %address,
                sentinel = config.is_sentinel(),
                "Connecting to Redis"
            );

            match open_checked(connector, name, config).await {
                Ok(handle) => {
                    if self.insert(name.clone(), handle).is_some() {
                        debug!(name = %name, "Replaced previous Redis client");
                    }
                    info!(name = %name, address = %address, "Redis connected");
                }
                Err(err) => {
                    warn!(name = %name, address = %address, error = %err, "Redis connect failed");
                    errors.failures.push(ConnectFailure {
                        name: name.clone(),
                        address,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if errors.failures.is_empty() {
            Ok(())
        } else {
            error!(
                failed = errors.failures.len(),
                total = configs.len(),
                names = ?errors.names(),
                "Redis connection pass failed"
            );
            Err(Error::Connect(errors))
        }
    }

    /// Install `handle` under `name`, returning the handle it replaced.
    pub fn insert(&mut self, name: impl Into<String>, handle: H) -> Option<Arc<H>> {
        self.clients.insert(name.into(), Arc::new(handle))
    }

    /// The `default` instance.
    ///
    /// # Panics
    ///
    /// Panics when no `default` instance is configured.
    #[must_use]
    pub fn client(&self) -> Arc<H> {
        self.client_named(DEFAULT_INSTANCE)
    }

    /// The instance registered as `name`.
    ///
    /// # Panics
    ///
    /// Panics when `name` is not configured. Use [`Registry::try_client`]
    /// when the name comes from outside the program.
    #[must_use]
    pub fn client_named(&self, name: &str) -> Arc<H> {
        match self.try_client(name) {
            Ok(client) => client,
            Err(err) => panic!("{err}"),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] when `name` is not configured.
    pub fn try_client(&self, name: &str) -> Result<Arc<H>> {
        self.clients
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotConfigured(name.to_string()))
    }

    /// Configured names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

async fn open_checked<C: Connector>(
    connector: &C,
    name: &str,
    config: &RedisConfig,
) -> Result<C::Handle> {
    let handle = connector.open(name, config).await?;
    connector.ping(&handle).await?;
    Ok(handle)
}
