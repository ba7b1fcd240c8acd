// src/types/hash.rs

//! 支持 Hash 类型：每个 hash 对应一个 sled::Tree
//! Tree 名称: "hash:<hashname>"；最后一个 field 被删除时 key 随之消失

use sled::{Db, Tree};
use std::collections::HashMap;
use std::str;

use super::Kind;
use crate::engine::keyspace;
use crate::error::{Result, StoreError};

fn open(db: &Db, key: &str) -> Result<Tree> {
    Ok(db.open_tree(Kind::Hash.storage_name(key))?)
}

/// HSET key field value
/// 返回 true 表示新建了 field，false 表示覆盖了旧值
pub fn hset(db: &Db, key: &str, field: &str, value: &str) -> Result<bool> {
    keyspace::claim(db, key, Kind::Hash)?;
    let prev = open(db, key)?.insert(field.as_bytes(), value.as_bytes())?;
    Ok(prev.is_none())
}

/// HGET key field，key 或 field 不存在时返回 None
pub fn hget(db: &Db, key: &str, field: &str) -> Result<Option<String>> {
    if !keyspace::check(db, key, Kind::Hash)? {
        return Ok(None);
    }
    match open(db, key)?.get(field.as_bytes())? {
        Some(ivec) => Ok(Some(str::from_utf8(&ivec)?.to_string())),
        None => Ok(None),
    }
}

/// HDEL key field
/// 返回 true 如果删除了一个存在的 field
pub fn hdel(db: &Db, key: &str, field: &str) -> Result<bool> {
    if !keyspace::check(db, key, Kind::Hash)? {
        return Ok(false);
    }
    let tree = open(db, key)?;
    let prev = tree.remove(field.as_bytes())?;
    let emptied = tree.is_empty();
    drop(tree);
    if emptied {
        keyspace::remove(db, key)?;
    }
    Ok(prev.is_some())
}

pub fn hexists(db: &Db, key: &str, field: &str) -> Result<bool> {
    if !keyspace::check(db, key, Kind::Hash)? {
        return Ok(false);
    }
    Ok(open(db, key)?.contains_key(field.as_bytes())?)
}

/// HGETALL key，不存在时返回空表
pub fn hgetall(db: &Db, key: &str) -> Result<HashMap<String, String>> {
    let mut all = HashMap::new();
    if !keyspace::check(db, key, Kind::Hash)? {
        return Ok(all);
    }
    for pair in open(db, key)?.iter() {
        let (k, v) = pair?;
        all.insert(str::from_utf8(&k)?.to_string(), str::from_utf8(&v)?.to_string());
    }
    Ok(all)
}

/// HINCRBY key field delta，field 不存在视为 0
pub fn hincr_by(db: &Db, key: &str, field: &str, delta: i64) -> Result<i64> {
    let old = match hget(db, key, field)? {
        Some(s) => s
            .parse::<i64>()
            .map_err(|_| StoreError::TypeMismatch("ERR hash value is not an integer".into()))?,
        None => 0,
    };
    let new = old
        .checked_add(delta)
        .ok_or_else(|| StoreError::Backend("ERR increment or decrement would overflow".into()))?;
    keyspace::claim(db, key, Kind::Hash)?;
    open(db, key)?.insert(field.as_bytes(), new.to_string().as_bytes())?;
    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_db() -> Db {
        sled::Config::new()
            .temporary(true)
            .open()
            .expect("打开临时 sled db 失败")
    }

    #[test]
    fn test_hash_basic() -> Result<()> {
        let db = make_db();

        // HSET 新 field
        assert!(hset(&db, "myhash", "f1", "v1")?);
        // HSET 覆盖 field
        assert!(!hset(&db, "myhash", "f1", "v1a")?);
        // HGET 存在
        assert_eq!(hget(&db, "myhash", "f1")?.as_deref(), Some("v1a"));
        // HGET 不存在
        assert_eq!(hget(&db, "myhash", "f2")?, None);
        assert_eq!(hget(&db, "nohash", "f1")?, None);

        hset(&db, "myhash", "f2", "v2")?;
        assert!(hexists(&db, "myhash", "f2")?);
        let all = hgetall(&db, "myhash")?;
        assert_eq!(all.len(), 2);
        assert_eq!(all["f1"], "v1a");
        assert_eq!(all["f2"], "v2");

        // HDEL 存在 / 不存在
        assert!(hdel(&db, "myhash", "f1")?);
        assert!(!hdel(&db, "myhash", "no")?);
        assert!(!hexists(&db, "myhash", "f1")?);
        Ok(())
    }

    #[test]
    fn test_last_field_removes_key() -> Result<()> {
        let db = make_db();
        hset(&db, "h", "only", "1")?;
        assert!(hdel(&db, "h", "only")?);
        assert_eq!(keyspace::kind_of(&db, "h")?, None);
        assert!(hgetall(&db, "h")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_hincr_by() -> Result<()> {
        let db = make_db();
        assert_eq!(hincr_by(&db, "stats", "hits", 1)?, 1);
        assert_eq!(hincr_by(&db, "stats", "hits", 10)?, 11);
        assert_eq!(hincr_by(&db, "stats", "hits", -12)?, -1);

        hset(&db, "stats", "name", "x")?;
        assert!(matches!(hincr_by(&db, "stats", "name", 1), Err(StoreError::TypeMismatch(_))));
        Ok(())
    }
}
