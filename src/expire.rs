// src/expire.rs

//! 过期策略：expire 树中记录 key → 到期时间（UNIX 毫秒，大端序）
//!
//! 访问时惰性删除，另有可选的后台定时清理任务。

use sled::{Db, Tree};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::interval;
use tracing::{debug, warn};

use crate::engine::{keyspace, LocalStore};
use crate::error::Result;
use crate::store::Ttl;

const EXPIRE_TREE: &str = "expire";

/// 返回当前的 UNIX 毫秒
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 获取 或 创建 expire Tree
fn expire_tree(db: &Db) -> Result<Tree> {
    Ok(db.open_tree(EXPIRE_TREE)?)
}

fn deadline_of(tree: &Tree, key: &str) -> Result<Option<u64>> {
    Ok(tree.get(key.as_bytes())?.and_then(|ivec| {
        let bytes = <[u8; 8]>::try_from(&ivec[..]).ok()?;
        Some(u64::from_be_bytes(bytes))
    }))
}

/// 为 key 设置到期时间（不检查 key 是否存在）
pub fn set_deadline(db: &Db, key: &str, ttl: Duration) -> Result<()> {
    let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    let ts = now_ms().saturating_add(ttl_ms);
    expire_tree(db)?.insert(key.as_bytes(), ts.to_be_bytes().to_vec())?;
    Ok(())
}

/// 移除 key 的过期属性
pub fn clear(db: &Db, key: &str) -> Result<bool> {
    Ok(expire_tree(db)?.remove(key.as_bytes())?.is_some())
}

/// EXPIRE：key 不存在返回 false；ttl 为 0 时立即删除 key
pub fn expire(db: &Db, key: &str, ttl: Duration) -> Result<bool> {
    if keyspace::kind_of(db, key)?.is_none() {
        return Ok(false);
    }
    if ttl.is_zero() {
        keyspace::remove(db, key)?;
    } else {
        set_deadline(db, key, ttl)?;
    }
    Ok(true)
}

/// 查询 key 的剩余生存时间，向上取整到秒
pub fn ttl(db: &Db, key: &str) -> Result<Ttl> {
    if keyspace::kind_of(db, key)?.is_none() {
        return Ok(Ttl::Missing);
    }
    match deadline_of(&expire_tree(db)?, key)? {
        None => Ok(Ttl::Persistent),
        Some(exp_ts) => {
            let left_ms = exp_ts.saturating_sub(now_ms());
            let secs_left = left_ms.div_ceil(1000);
            Ok(Ttl::Expires(Duration::from_secs(secs_left)))
        }
    }
}

/// 检查 key 是否过期，是则删除所有相关记录；返回是否删除
pub fn remove_if_expired(db: &Db, key: &str) -> Result<bool> {
    match deadline_of(&expire_tree(db)?, key)? {
        Some(exp_ts) if exp_ts <= now_ms() => keyspace::remove(db, key),
        _ => Ok(false),
    }
}

/// 删除所有已到期的 key，返回删除数量
pub fn purge(db: &Db) -> Result<usize> {
    let now = now_ms();
    let mut due = Vec::new();
    for entry in expire_tree(db)?.iter() {
        let (k, v) = entry?;
        let ts = <[u8; 8]>::try_from(&v[..]).map(u64::from_be_bytes).unwrap_or(0);
        if ts <= now {
            due.push(std::str::from_utf8(&k)?.to_string());
        }
    }
    for key in &due {
        keyspace::remove(db, key)?;
    }
    Ok(due.len())
}

/// 后台定时清理任务
pub async fn start_cleaner(store: LocalStore, every: Duration) {
    let mut iv = interval(every);
    loop {
        iv.tick().await;
        match store.purge_expired() {
            Ok(0) => {}
            Ok(n) => debug!(removed = n, "purged expired keys"),
            Err(e) => warn!(error = %e, "expire cleaner pass failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{string, Kind};
    use std::thread::sleep;

    fn make_db() -> Db {
        sled::Config::new()
            .temporary(true)
            .open()
            .expect("打开临时 sled db 失败")
    }

    #[test]
    fn test_expire_and_ttl() -> Result<()> {
        let db = make_db();

        string::set(&db, "k", "v", None)?;
        assert_eq!(ttl(&db, "k")?, Ttl::Persistent);
        assert!(expire(&db, "k", Duration::from_secs(1))?);
        // 立即 TTL 应为 1
        assert_eq!(ttl(&db, "k")?, Ttl::Expires(Duration::from_secs(1)));
        // 睡眠 1.2s
        sleep(Duration::from_millis(1200));
        // TTL 返回 Missing，且 key 被删除
        assert_eq!(ttl(&db, "k")?, Ttl::Missing);
        assert_eq!(keyspace::kind_of(&db, "k")?, None);
        Ok(())
    }

    #[test]
    fn test_expire_missing_and_zero() -> Result<()> {
        let db = make_db();
        assert!(!expire(&db, "nope", Duration::from_secs(5))?);

        keyspace::claim(&db, "k", Kind::Set)?;
        assert!(expire(&db, "k", Duration::ZERO)?);
        assert_eq!(keyspace::kind_of(&db, "k")?, None);
        Ok(())
    }

    #[test]
    fn test_huge_ttl_saturates_instead_of_wrapping() -> Result<()> {
        let db = make_db();
        string::set(&db, "k", "v", None)?;
        assert!(expire(&db, "k", Duration::from_secs(u64::MAX))?);
        sleep(Duration::from_millis(20));
        assert!(matches!(ttl(&db, "k")?, Ttl::Expires(d) if d > Duration::from_secs(1 << 40)));
        assert_eq!(string::get(&db, "k")?.as_deref(), Some("v"));
        Ok(())
    }

    #[test]
    fn test_purge_removes_only_due_keys() -> Result<()> {
        let db = make_db();
        string::set(&db, "short", "1", Some(Duration::from_millis(20)))?;
        string::set(&db, "long", "2", Some(Duration::from_secs(60)))?;
        string::set(&db, "forever", "3", None)?;
        sleep(Duration::from_millis(50));

        assert_eq!(purge(&db)?, 1);
        assert_eq!(string::get(&db, "short")?, None);
        assert_eq!(string::get(&db, "long")?.as_deref(), Some("2"));
        assert_eq!(string::get(&db, "forever")?.as_deref(), Some("3"));
        Ok(())
    }
}
