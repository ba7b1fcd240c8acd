// src/store/mod.rs

//! # Store capability
//!
//! [`Store`] is everything the facade needs from a key-value backend. Keys
//! passed in are already physical; a `Store` never namespaces anything.
//!
//! Implementations must be safe to call concurrently through `&self`:
//! - [`redis::RedisStore`] wraps a multiplexed `ConnectionManager`, which is
//!   `Clone` and pipelines concurrent requests over one connection;
//! - [`LocalStore`](crate::engine::LocalStore) serializes through an internal lock.

pub mod redis;

pub use self::redis::RedisStore;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Remaining time to live of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist.
    Missing,
    /// The key exists without an expiry.
    Persistent,
    Expires(Duration),
}

impl Ttl {
    /// Decodes the integer reply of `TTL`: `-2` missing, `-1` no expiry.
    pub fn from_reply(secs: i64) -> Self {
        match secs {
            -2 => Ttl::Missing,
            s if s < 0 => Ttl::Persistent,
            s => Ttl::Expires(Duration::from_secs(s as u64)),
        }
    }

    pub fn as_reply(&self) -> i64 {
        match self {
            Ttl::Missing => -2,
            Ttl::Persistent => -1,
            Ttl::Expires(d) => d.as_secs() as i64,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<String>;

    // --- key admin ---
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
    async fn ttl(&self, key: &str) -> Result<Ttl>;
    async fn exists(&self, key: &str) -> Result<bool>;
    /// Returns how many of `keys` existed and were removed.
    async fn del(&self, keys: &[String]) -> Result<u64>;
    /// `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    // --- string ---
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Overwrites any value; `ttl == None` leaves the key without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    // --- hash ---
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
    /// `true` if `field` was newly created.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool>;
    async fn hdel(&self, key: &str, field: &str) -> Result<bool>;
    async fn hexists(&self, key: &str, field: &str) -> Result<bool>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;
    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    // --- list ---
    /// Returns the new length.
    async fn lpush(&self, key: &str, value: &str) -> Result<u64>;
    async fn rpush(&self, key: &str, value: &str) -> Result<u64>;
    async fn lpop(&self, key: &str) -> Result<Option<String>>;
    async fn rpop(&self, key: &str) -> Result<Option<String>>;
    /// Inclusive on both ends; negative indices count from the tail.
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;
    async fn llen(&self, key: &str) -> Result<u64>;

    // --- set ---
    /// `true` if the member was not already present.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;
    /// `true` if the member was present.
    async fn srem(&self, key: &str, member: &str) -> Result<bool>;
    async fn sismember(&self, key: &str, member: &str) -> Result<bool>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_reply_codes() {
        assert_eq!(Ttl::from_reply(-2), Ttl::Missing);
        assert_eq!(Ttl::from_reply(-1), Ttl::Persistent);
        assert_eq!(Ttl::from_reply(30), Ttl::Expires(Duration::from_secs(30)));
        assert_eq!(Ttl::Expires(Duration::from_secs(7)).as_reply(), 7);
        assert_eq!(Ttl::Missing.as_reply(), -2);
    }
}
