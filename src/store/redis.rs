// src/store/redis.rs

//! Redis 后端：所有命令一对一转发给 redis-rs 客户端
//!
//! One `ConnectionManager` is created at connect time and cloned per call;
//! clones share the same multiplexed connection, so the store is safe to use
//! from many tasks without extra locking. The manager reconnects on its own
//! after a dropped connection; this module adds no retry of its own.

use std::collections::HashMap;
use std::time::Duration;

use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use ::redis::{
    AsyncCommands, Client, ConnectionAddr, ConnectionInfo, ErrorKind, RedisConnectionInfo,
    RedisError,
};
use async_trait::async_trait;
use tracing::info;

use super::{Store, Ttl};
use crate::config::Settings;
use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Opens the connection and runs the liveness probe, both bounded by
    /// `settings.connect_timeout`. Any failure is a [`StoreError::Connection`].
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(settings.host.clone(), settings.port),
            redis: RedisConnectionInfo {
                db: settings.db,
                password: settings.password.clone(),
                ..Default::default()
            },
        };
        let client = Client::open(info).map_err(connection_error)?;

        // 只尝试一次：失败原因原样交给调用方
        let config = ConnectionManagerConfig::new().set_number_of_retries(0);
        let probe = async {
            let conn = ConnectionManager::new_with_config(client, config)
                .await
                .map_err(connection_error)?;
            let store = RedisStore { conn };
            let pong = store.ping().await.map_err(|e| match e {
                c @ StoreError::Connection(_) => c,
                other => StoreError::Connection(other.to_string()),
            })?;
            Ok::<_, StoreError>((store, pong))
        };

        let (store, pong) = tokio::time::timeout(settings.connect_timeout, probe)
            .await
            .map_err(|_| {
                StoreError::Connection(format!(
                    "no reply from {} within {}ms",
                    settings.addr(),
                    settings.connect_timeout.as_millis()
                ))
            })??;

        info!(addr = %settings.addr(), db = settings.db, reply = %pong, "connected to redis");
        Ok(store)
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn connection_error(e: RedisError) -> StoreError {
    StoreError::Connection(e.to_string())
}

/// 按错误种类映射到 StoreError，消息原样保留
fn classify(e: RedisError) -> StoreError {
    if e.is_io_error()
        || e.is_connection_refusal()
        || e.is_connection_dropped()
        || e.is_timeout()
        || e.kind() == ErrorKind::AuthenticationFailed
    {
        return StoreError::Connection(e.to_string());
    }
    let msg = e.to_string();
    if e.code() == Some("WRONGTYPE")
        || e.kind() == ErrorKind::TypeError
        || msg.contains("not an integer")
    {
        return StoreError::TypeMismatch(msg);
    }
    StoreError::Backend(msg)
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> Result<String> {
        let mut conn = self.conn();
        let pong: String = ::redis::cmd("PING").query_async(&mut conn).await.map_err(classify)?;
        Ok(pong)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let keys: Vec<String> = conn.keys(pattern).await.map_err(classify)?;
        Ok(keys)
    }

    async fn ttl(&self, key: &str) -> Result<Ttl> {
        let mut conn = self.conn();
        let secs: i64 = conn.ttl(key).await.map_err(classify)?;
        Ok(Ttl::from_reply(secs))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn();
        let found: bool = conn.exists(key).await.map_err(classify)?;
        Ok(found)
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        // DEL 不接受零个参数
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let removed: u64 = conn.del(keys.to_vec()).await.map_err(classify)?;
        Ok(removed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let secs = i64::try_from(ttl.as_secs()).map_err(|_| StoreError::invalid_expire("expire"))?;
        let mut conn = self.conn();
        let set: bool = conn.expire(key, secs).await.map_err(classify)?;
        Ok(set)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await.map_err(classify)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn();
        match ttl {
            Some(d) => {
                let ms = u64::try_from(d.as_millis()).map_err(|_| StoreError::invalid_expire("set"))?;
                let _: () = conn
                    .pset_ex(key, value, ms)
                    .await
                    .map_err(classify)?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(classify)?;
            }
        }
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn();
        let value: i64 = conn.incr(key, delta).await.map_err(classify)?;
        Ok(value)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.hget(key, field).await.map_err(classify)?;
        Ok(value)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn();
        let created: i64 = conn.hset(key, field, value).await.map_err(classify)?;
        Ok(created > 0)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.hdel(key, field).await.map_err(classify)?;
        Ok(removed > 0)
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.conn();
        let found: bool = conn.hexists(key, field).await.map_err(classify)?;
        Ok(found)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn();
        let all: HashMap<String, String> = conn.hgetall(key).await.map_err(classify)?;
        Ok(all)
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn();
        let value: i64 = conn.hincr(key, field, delta).await.map_err(classify)?;
        Ok(value)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<u64> {
        let mut conn = self.conn();
        let len: u64 = conn.lpush(key, value).await.map_err(classify)?;
        Ok(len)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64> {
        let mut conn = self.conn();
        let len: u64 = conn.rpush(key, value).await.map_err(classify)?;
        Ok(len)
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.lpop(key, None).await.map_err(classify)?;
        Ok(value)
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.rpop(key, None).await.map_err(classify)?;
        Ok(value)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let items: Vec<String> = conn
            .lrange(key, start as isize, stop as isize)
            .await
            .map_err(classify)?;
        Ok(items)
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn();
        let len: u64 = conn.llen(key).await.map_err(classify)?;
        Ok(len)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn();
        let added: i64 = conn.sadd(key, member).await.map_err(classify)?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.srem(key, member).await.map_err(classify)?;
        Ok(removed > 0)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn();
        let found: bool = conn.sismember(key, member).await.map_err(classify)?;
        Ok(found)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let members: Vec<String> = conn.smembers(key).await.map_err(classify)?;
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_reply_errors() {
        let wrongtype = RedisError::from((
            ErrorKind::TypeError,
            "Operation against a key holding the wrong kind of value",
        ));
        assert!(matches!(classify(wrongtype), StoreError::TypeMismatch(_)));

        let not_int = RedisError::from((
            ErrorKind::ResponseError,
            "An error was signalled by the server",
            "value is not an integer or out of range".to_string(),
        ));
        assert!(matches!(classify(not_int), StoreError::TypeMismatch(_)));

        let auth = RedisError::from((ErrorKind::AuthenticationFailed, "invalid password"));
        assert!(matches!(classify(auth), StoreError::Connection(_)));

        let io = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(classify(io), StoreError::Connection(_)));

        let other = RedisError::from((ErrorKind::ResponseError, "ERR syntax error"));
        assert!(matches!(classify(other), StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails_fast() -> anyhow::Result<()> {
        // 绑定后立即释放，得到一个无人监听的端口
        let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
        let settings = crate::config::ConnectOptions {
            addr: Some(format!("127.0.0.1:{}", port)),
            connect_timeout_ms: Some(3000),
            ..Default::default()
        }
        .resolve_with(|_| None)?;

        let started = std::time::Instant::now();
        let err = match RedisStore::connect(&settings).await {
            Ok(_) => anyhow::bail!("nothing listens on port {}", port),
            Err(e) => e,
        };
        assert!(matches!(err, StoreError::Connection(_)), "got {:?}", err);
        let msg = err.to_string().to_lowercase();
        assert!(msg.contains("refused"), "cause lost: {}", msg);
        assert!(started.elapsed() < Duration::from_secs(2));
        Ok(())
    }
}
