//! # Command Wrappers
//!
//! Thin async wrappers over the commands the services use. Each call clones
//! the connection manager and forwards one command; server errors come back
//! unchanged as [`Error::Redis`](crate::Error::Redis) after
//! [`RedisClient::settle`] has seen them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ToRedisArgs};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::client::RedisClient;
use crate::error::{Error, Result};
use crate::registry::Registry;

pub const CACHE_WEEK_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const CACHE_DAY_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const CACHE_HOUR_TTL: Duration = Duration::from_secs(60 * 60);
pub const CACHE_MIN_TTL: Duration = Duration::from_secs(60);

/// Remaining lifetime of a key, as reported by `TTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Expires(Duration),
    /// Key exists without an expiry
    Persistent,
    Missing,
}

impl Ttl {
    fn from_reply(seconds: i64) -> Self {
        match seconds {
            -1 => Self::Persistent,
            s if s < 0 => Self::Missing,
            s => Self::Expires(Duration::from_secs(s.unsigned_abs())),
        }
    }
}

/// Command wrapper bound to one client
#[derive(Debug, Clone)]
pub struct Redis {
    client: Arc<RedisClient>,
}

impl Redis {
    pub const fn new(client: Arc<RedisClient>) -> Self {
        Self { client }
    }

    /// Wrapper for the instance registered as `name`.
    ///
    /// # Panics
    ///
    /// Panics when `name` is not configured, like [`Registry::client_named`].
    #[must_use]
    pub fn with_name(registry: &Registry, name: &str) -> Self {
        Self::new(registry.client_named(name))
    }

    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    fn conn(&self) -> ConnectionManager {
        self.client.connection()
    }

    // ---- strings ----

    /// `GET`; `None` when the key does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        self.client.settle(conn.get(key).await).await
    }

    /// `SET key value EX 86400`
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_ex(key, value, CACHE_DAY_TTL).await
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn();
        let reply = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await;
        self.client.settle::<()>(reply).await
    }

    /// `SET key value EX ttl NX`; `false` when the key already existed.
    pub async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn();
        let reply = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs())
            .arg("NX")
            .query_async(&mut conn)
            .await;
        let stored: Option<String> = self.client.settle(reply).await?;
        Ok(stored.is_some())
    }

    pub async fn incr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, 1).await
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn();
        self.client.settle(conn.incr(key, delta).await).await
    }

    pub async fn decr(&self, key: &str) -> Result<i64> {
        self.decr_by(key, 1).await
    }

    pub async fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn();
        self.client.settle(conn.decr(key, delta).await).await
    }

    // ---- keys ----

    /// `EXPIRE`; `false` when the key does not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn();
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self.client.settle(conn.expire(key, seconds).await).await
    }

    pub async fn ttl(&self, key: &str) -> Result<Ttl> {
        let mut conn = self.conn();
        let seconds: i64 = self.client.settle(conn.ttl(key).await).await?;
        Ok(Ttl::from_reply(seconds))
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn();
        self.client.settle(conn.exists(key).await).await
    }

    /// `DEL`; `true` when the key existed.
    pub async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn();
        let removed: i64 = self.client.settle(conn.del(key).await).await?;
        Ok(removed > 0)
    }

    // ---- hashes ----

    /// `HGET`; `None` when the key or the field does not exist.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        self.client.settle(conn.hget(key, field).await).await
    }

    pub async fn hset<V>(&self, key: &str, field: &str, value: V) -> Result<()>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut conn = self.conn();
        self.client.settle(conn.hset(key, field, value).await).await
    }

    pub async fn hdel(&self, key: &str, field: &str) -> Result<()> {
        let mut conn = self.conn();
        self.client.settle(conn.hdel(key, field).await).await
    }

    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.conn();
        self.client.settle(conn.hexists(key, field).await).await
    }

    pub async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn();
        self.client.settle(conn.hincr(key, field, delta).await).await
    }

    /// Store `value` as a hash and give the key a one-day expiry.
    ///
    /// Fields follow the serde field names; see [`rediskit_hash::to_hash`].
    pub async fn hmset<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let fields = rediskit_hash::to_hash(value)?;
        self.write_hash(key, &fields).await
    }

    /// [`Redis::hmset`] for an already built field map.
    pub async fn hmset_map<I, F, V>(&self, key: &str, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (F, V)>,
        F: ToRedisArgs + Send + Sync,
        V: ToRedisArgs + Send + Sync,
    {
        let fields: Vec<(F, V)> = fields.into_iter().collect();
        self.write_hash(key, &fields).await
    }

    async fn write_hash<F, V>(&self, key: &str, fields: &[(F, V)]) -> Result<()>
    where
        F: ToRedisArgs + Send + Sync,
        V: ToRedisArgs + Send + Sync,
    {
        let mut conn = self.conn();
        self.client
            .settle::<()>(conn.hset_multiple(key, fields).await)
            .await?;
        self.expire(key, CACHE_DAY_TTL).await?;
        Ok(())
    }

    /// `HGETALL` as a raw map.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] when the reply holds no fields, which is also what
    /// Redis answers for a key that does not exist.
    pub async fn hgetall_map(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn();
        let fields: HashMap<String, String> =
            self.client.settle(conn.hgetall(key).await).await?;
        if fields.is_empty() {
            return Err(Error::NoData);
        }
        Ok(fields)
    }

    /// `HGETALL` decoded into `T`; see [`rediskit_hash::from_hash`].
    pub async fn hgetall<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let fields = self.hgetall_map(key).await?;
        debug!(
            instance = %self.client.name(),
            key,
            fields = fields.len(),
            record = std::any::type_name::<T>(),
            "Decoding hash"
        );
        Ok(rediskit_hash::from_hash(&fields)?)
    }

    // ---- lists and sets ----

    pub async fn lpush<V>(&self, key: &str, values: &[V]) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut conn = self.conn();
        self.client.settle(conn.lpush(key, values).await).await
    }

    pub async fn rpush<V>(&self, key: &str, values: &[V]) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut conn = self.conn();
        self.client.settle(conn.rpush(key, values).await).await
    }

    pub async fn lpop(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        self.client.settle(conn.lpop(key, None).await).await
    }

    pub async fn rpop(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        self.client.settle(conn.rpop(key, None).await).await
    }

    pub async fn sadd<V>(&self, key: &str, members: &[V]) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut conn = self.conn();
        self.client.settle(conn.sadd(key, members).await).await
    }
}
