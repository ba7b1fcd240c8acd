// src/facade.rs

//! # StoreFacade
//!
//! Typed operations over any [`Store`]. Every call:
//! 1. maps each logical key argument through the [`KeyNamespace`]
//!    (fields, values, members and counts are left alone);
//! 2. issues exactly one store command;
//! 3. returns the store's result or error unchanged, except that a "nil"
//!    reply from a read becomes [`StoreError::NotFound`].
//!
//! Nothing is retried. A call can be bounded by a deadline
//! ([`StoreFacade::with_timeout`]) or a [`CancelToken`]
//! ([`StoreFacade::with_cancel`]); when either fires first the in-flight
//! command is dropped and [`StoreError::Cancelled`] is returned, whether or
//! not the store already applied it.
//!
//! ```ignore
//! let store = StoreFacade::new(LocalStore::temporary()?, KeyNamespace::new("myapp"));
//! store.set("session:42", "alice").await?;          // writes "myapp:session:42"
//! let who = store.with_timeout(Duration::from_millis(50)).get("session:42").await?;
//! ```

use std::collections::HashMap;
use std::future::pending;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::Settings;
use crate::error::{CancelCause, Result, StoreError};
use crate::monitor::Monitor;
use crate::namespace::KeyNamespace;
use crate::store::{RedisStore, Store, Ttl};

pub struct StoreFacade<S: ?Sized> {
    store: Arc<S>,
    namespace: Arc<KeyNamespace>,
    monitor: Monitor,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

// 手写 Clone：S 本身不需要 Clone
impl<S: ?Sized> Clone for StoreFacade<S> {
    fn clone(&self) -> Self {
        StoreFacade {
            store: Arc::clone(&self.store),
            namespace: Arc::clone(&self.namespace),
            monitor: self.monitor.clone(),
            timeout: self.timeout,
            cancel: self.cancel.clone(),
        }
    }
}

impl StoreFacade<RedisStore> {
    /// Connects to Redis as described by `settings` and runs the liveness
    /// probe. Fails with [`StoreError::Connection`].
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let store = RedisStore::connect(settings).await?;
        Ok(StoreFacade::new(store, settings.namespace.clone())
            .with_monitor(Monitor::new(settings.slow_call))
            .with_default_timeout(settings.call_timeout))
    }
}

impl<S: Store> StoreFacade<S> {
    pub fn new(store: S, namespace: KeyNamespace) -> Self {
        Self::from_arc(Arc::new(store), namespace)
    }
}

impl<S: Store + ?Sized> StoreFacade<S> {
    pub fn from_arc(store: Arc<S>, namespace: KeyNamespace) -> Self {
        StoreFacade {
            store,
            namespace: Arc::new(namespace),
            monitor: Monitor::default(),
            timeout: None,
            cancel: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Monitor) -> Self {
        self.monitor = monitor;
        self
    }

    fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// A view whose calls give up after `timeout`. Shares connection and metrics.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut view = self.clone();
        view.timeout = Some(timeout);
        view
    }

    /// A view whose calls give up once `token` fires.
    pub fn with_cancel(&self, token: CancelToken) -> Self {
        let mut view = self.clone();
        view.cancel = Some(token);
        view
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Logical → physical, exactly as every operation does it.
    pub fn physical_key(&self, key: &str) -> String {
        self.namespace.apply(key).into_owned()
    }

    /// 统一的调用入口：超时 / 取消 / 统计 / 日志
    async fn call<T, F>(&self, op: &'static str, key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        debug!(op, key, "store call");

        let deadline = async {
            match self.timeout {
                Some(d) => {
                    tokio::time::sleep(d).await;
                    d
                }
                None => pending().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => pending().await,
            }
        };

        let res = tokio::select! {
            res = fut => res,
            d = deadline => Err(StoreError::Cancelled(CancelCause::Deadline(d))),
            _ = cancelled => Err(StoreError::Cancelled(CancelCause::Token)),
        };

        self.monitor.observe(op, key, started.elapsed(), res.is_err());
        res
    }

    fn found<T>(value: Option<T>, key: &str) -> Result<T> {
        value.ok_or_else(|| StoreError::not_found(key))
    }

    // --- connection ---

    pub async fn ping(&self) -> Result<String> {
        self.call("ping", "", self.store.ping()).await
    }

    // --- key admin ---

    /// Physical keys matching `pattern`; the namespace is applied to the pattern.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = self.namespace.apply(pattern);
        self.call("keys", &pattern, self.store.keys(&pattern)).await
    }

    pub async fn ttl(&self, key: &str) -> Result<Ttl> {
        let key = self.namespace.apply(key);
        self.call("ttl", &key, self.store.ttl(&key)).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let key = self.namespace.apply(key);
        self.call("exists", &key, self.store.exists(&key)).await
    }

    /// Deletes every key given; returns how many existed.
    pub async fn del<K: AsRef<str>>(&self, keys: &[K]) -> Result<u64> {
        let keys = self.namespace.apply_all(keys);
        let label = keys.join(" ");
        self.call("del", &label, self.store.del(&keys)).await
    }

    pub async fn expire(&self, key: &str, secs: u64) -> Result<bool> {
        let ttl = expiry("expire", secs)?;
        let key = self.namespace.apply(key);
        self.call("expire", &key, self.store.expire(&key, ttl)).await
    }

    // --- string ---

    pub async fn get(&self, key: &str) -> Result<String> {
        let key = self.namespace.apply(key);
        let value = self.call("get", &key, self.store.get(&key)).await?;
        Self::found(value, &key)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = self.namespace.apply(key);
        self.call("set", &key, self.store.set(&key, value, None)).await
    }

    /// `secs == 0` stores the value without expiry.
    pub async fn set_ex(&self, key: &str, value: &str, secs: u64) -> Result<()> {
        let ttl = match secs {
            0 => None,
            n => Some(expiry("set", n)?),
        };
        let key = self.namespace.apply(key);
        self.call("set_ex", &key, self.store.set(&key, value, ttl)).await
    }

    pub async fn incr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, 1).await
    }

    pub async fn incr_by(&self, key: &str, n: i64) -> Result<i64> {
        let key = self.namespace.apply(key);
        self.call("incr_by", &key, self.store.incr_by(&key, n)).await
    }

    pub async fn decr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, -1).await
    }

    pub async fn decr_by(&self, key: &str, n: i64) -> Result<i64> {
        self.incr_by(key, negate(n)?).await
    }

    // --- hash (field names are not namespaced) ---

    pub async fn hget(&self, key: &str, field: &str) -> Result<String> {
        let key = self.namespace.apply(key);
        let value = self.call("hget", &key, self.store.hget(&key, field)).await?;
        Self::found(value, &key)
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let key = self.namespace.apply(key);
        self.call("hset", &key, self.store.hset(&key, field, value)).await
    }

    pub async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let key = self.namespace.apply(key);
        self.call("hdel", &key, self.store.hdel(&key, field)).await
    }

    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        let key = self.namespace.apply(key);
        self.call("hexists", &key, self.store.hexists(&key, field)).await
    }

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let key = self.namespace.apply(key);
        self.call("hgetall", &key, self.store.hgetall(&key)).await
    }

    pub async fn hincr(&self, key: &str, field: &str) -> Result<i64> {
        self.hincr_by(key, field, 1).await
    }

    pub async fn hincr_by(&self, key: &str, field: &str, n: i64) -> Result<i64> {
        let key = self.namespace.apply(key);
        self.call("hincr_by", &key, self.store.hincr_by(&key, field, n))
            .await
    }

    pub async fn hdecr(&self, key: &str, field: &str) -> Result<i64> {
        self.hincr_by(key, field, -1).await
    }

    pub async fn hdecr_by(&self, key: &str, field: &str, n: i64) -> Result<i64> {
        self.hincr_by(key, field, negate(n)?).await
    }

    // --- list ---

    pub async fn lpush(&self, key: &str, value: &str) -> Result<u64> {
        let key = self.namespace.apply(key);
        self.call("lpush", &key, self.store.lpush(&key, value)).await
    }

    pub async fn rpush(&self, key: &str, value: &str) -> Result<u64> {
        let key = self.namespace.apply(key);
        self.call("rpush", &key, self.store.rpush(&key, value)).await
    }

    pub async fn lpop(&self, key: &str) -> Result<String> {
        let key = self.namespace.apply(key);
        let value = self.call("lpop", &key, self.store.lpop(&key)).await?;
        Self::found(value, &key)
    }

    pub async fn rpop(&self, key: &str) -> Result<String> {
        let key = self.namespace.apply(key);
        let value = self.call("rpop", &key, self.store.rpop(&key)).await?;
        Self::found(value, &key)
    }

    /// Inclusive on both ends; negative indices count from the tail.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let key = self.namespace.apply(key);
        self.call("lrange", &key, self.store.lrange(&key, start, stop))
            .await
    }

    pub async fn llen(&self, key: &str) -> Result<u64> {
        let key = self.namespace.apply(key);
        self.call("llen", &key, self.store.llen(&key)).await
    }

    // --- set (namespaced like everything else) ---

    pub async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let key = self.namespace.apply(key);
        self.call("sadd", &key, self.store.sadd(&key, member)).await
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let key = self.namespace.apply(key);
        self.call("srem", &key, self.store.srem(&key, member)).await
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let key = self.namespace.apply(key);
        self.call("sismember", &key, self.store.sismember(&key, member))
            .await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let key = self.namespace.apply(key);
        self.call("smembers", &key, self.store.smembers(&key)).await
    }
}

/// 过期时间换算成毫秒后必须放得进 i64，与服务端的限制一致
const MAX_EXPIRE_SECS: u64 = (i64::MAX / 1000) as u64;

fn expiry(cmd: &str, secs: u64) -> Result<Duration> {
    if secs > MAX_EXPIRE_SECS {
        return Err(StoreError::invalid_expire(cmd));
    }
    Ok(Duration::from_secs(secs))
}

fn negate(n: i64) -> Result<i64> {
    n.checked_neg()
        .ok_or_else(|| StoreError::Backend("ERR decrement would overflow".into()))
}
