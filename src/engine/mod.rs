// src/engine/mod.rs

//! # 嵌入式引擎
//!
//! `LocalStore` 在 `sled::Db` 上实现完整的 [`Store`] 能力集：
//! - 类型相关的逻辑委托给 `types` 下的 `string`、`hash`、`list`、`set` 子模块；
//! - 过期由 `expire` 模块负责（访问时惰性删除 + 可选后台清理）；
//! - 同一个 `LocalStore` 上的所有操作经内部锁串行执行，因此每个操作都是原子的。
//!
//! It stands in for Redis in tests and in offline use of the CLI.

pub mod keyspace;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sled::Db;

use crate::error::Result;
use crate::expire;
use crate::store::{Store, Ttl};
use crate::types::{hash, list, set, string};

#[derive(Clone)]
pub struct LocalStore {
    db: Db,
    lock: Arc<Mutex<()>>,
}

impl LocalStore {
    /// Opens (or creates) a persistent database under `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_db(sled::open(path)?))
    }

    /// An in-memory database, discarded on drop.
    pub fn temporary() -> Result<Self> {
        Ok(Self::from_db(sled::Config::new().temporary(true).open()?))
    }

    pub fn from_db(db: Db) -> Self {
        LocalStore { db, lock: Arc::new(Mutex::new(())) }
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Removes every key whose deadline has passed.
    pub fn purge_expired(&self) -> Result<usize> {
        self.exclusive(expire::purge)
    }

    /// Spawns the periodic expiry cleaner on the current tokio runtime.
    pub fn spawn_cleaner(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(expire::start_cleaner(self.clone(), every))
    }

    fn exclusive<T>(&self, f: impl FnOnce(&Db) -> Result<T>) -> Result<T> {
        // 锁内只做同步的 sled 操作；中毒的锁仍可安全复用
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        f(&self.db)
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn ping(&self) -> Result<String> {
        Ok("PONG".to_string())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.exclusive(|db| keyspace::keys(db, pattern))
    }

    async fn ttl(&self, key: &str) -> Result<Ttl> {
        self.exclusive(|db| expire::ttl(db, key))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.exclusive(|db| Ok(keyspace::kind_of(db, key)?.is_some()))
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        self.exclusive(|db| keyspace::delete_all(db, keys))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.exclusive(|db| expire::expire(db, key, ttl))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.exclusive(|db| string::get(db, key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.exclusive(|db| string::set(db, key, value, ttl))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.exclusive(|db| string::incr_by(db, key, delta))
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.exclusive(|db| hash::hget(db, key, field))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.exclusive(|db| hash::hset(db, key, field, value))
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        self.exclusive(|db| hash::hdel(db, key, field))
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        self.exclusive(|db| hash::hexists(db, key, field))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.exclusive(|db| hash::hgetall(db, key))
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.exclusive(|db| hash::hincr_by(db, key, field, delta))
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<u64> {
        self.exclusive(|db| list::lpush(db, key, value))
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64> {
        self.exclusive(|db| list::rpush(db, key, value))
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>> {
        self.exclusive(|db| list::lpop(db, key))
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>> {
        self.exclusive(|db| list::rpop(db, key))
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.exclusive(|db| list::lrange(db, key, start, stop))
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        self.exclusive(|db| list::llen(db, key))
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        self.exclusive(|db| set::sadd(db, key, member))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        self.exclusive(|db| set::srem(db, key, member))
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        self.exclusive(|db| set::sismember(db, key, member))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.exclusive(|db| set::smembers(db, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[tokio::test]
    async fn test_one_type_per_key() -> Result<()> {
        let store = LocalStore::temporary()?;
        store.sadd("k", "m").await?;
        assert!(matches!(store.get("k").await, Err(StoreError::TypeMismatch(_))));
        assert!(matches!(store.hset("k", "f", "v").await, Err(StoreError::TypeMismatch(_))));
        assert!(matches!(store.lpush("k", "v").await, Err(StoreError::TypeMismatch(_))));

        // SET 覆盖任意类型
        store.set("k", "v", None).await?;
        assert_eq!(store.get("k").await?.as_deref(), Some("v"));
        Ok(())
    }

    #[tokio::test]
    async fn test_del_counts_only_live_keys() -> Result<()> {
        let store = LocalStore::temporary()?;
        store.set("a", "1", None).await?;
        store.rpush("b", "x").await?;
        let n = store.del(&["a".into(), "b".into(), "c".into()]).await?;
        assert_eq!(n, 2);
        assert!(!store.exists("a").await?);
        assert!(!store.exists("b").await?);
        assert_eq!(store.del(&[]).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_atomic() -> Result<()> {
        let store = LocalStore::temporary()?;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    s.incr_by("counter", 1).await?;
                }
                Ok::<_, StoreError>(())
            }));
        }
        for h in handles {
            h.await.expect("task panicked")?;
        }
        assert_eq!(store.get("counter").await?.as_deref(), Some("200"));
        Ok(())
    }

    #[tokio::test]
    async fn test_cleaner_purges_in_background() -> Result<()> {
        let store = LocalStore::temporary()?;
        store.set("gone", "1", Some(Duration::from_millis(20))).await?;
        store.set("kept", "2", None).await?;

        let cleaner = store.spawn_cleaner(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        cleaner.abort();

        // 后台任务已清理过，再手动清理应无事可做
        assert_eq!(store.purge_expired()?, 0);
        assert_eq!(store.keys("*").await?, vec!["kept"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_on_disk() -> Result<()> {
        let dir = tempfile::tempdir().map_err(|e| StoreError::Backend(e.to_string()))?;
        let store = LocalStore::open(dir.path().join("db"))?;
        store.hset("user:1", "name", "Alice").await?;
        store.flush()?;
        assert_eq!(store.hget("user:1", "name").await?.as_deref(), Some("Alice"));
        Ok(())
    }
}
