// src/types/string.rs

//! String 类型的存取与整数增减
//!
//! 值保存在默认树的 `"string:<key>"` 下：
//! - SET 覆盖任意类型的旧 key，并清除其过期时间
//! - GET 不存在时返回 `None`
//! - INCRBY 按 i64 解析当前值，不存在视为 0，保留原有过期时间

use sled::Db;
use std::str;
use std::time::Duration;

use super::Kind;
use crate::engine::keyspace;
use crate::error::{Result, StoreError};
use crate::expire;

fn slot(key: &str) -> String {
    Kind::String.storage_name(key)
}

/// 将一个字符串写入指定的键，已有值会被覆盖。
///
/// # 示例
///
/// ```ignore
/// set(&db, "foo", "bar", None)?;
/// assert_eq!(get(&db, "foo")?.as_deref(), Some("bar"));
/// ```
pub fn set(db: &Db, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
    keyspace::remove(db, key)?;
    keyspace::claim(db, key, Kind::String)?;
    db.insert(slot(key).as_bytes(), value.as_bytes())?;
    if let Some(ttl) = ttl {
        expire::set_deadline(db, key, ttl)?;
    }
    Ok(())
}

/// 从指定键读取一个字符串。
///
/// # 错误
/// - key 持有其他类型时返回 WRONGTYPE
/// - 存储的字节不是合法 UTF-8
pub fn get(db: &Db, key: &str) -> Result<Option<String>> {
    if !keyspace::check(db, key, Kind::String)? {
        return Ok(None);
    }
    match db.get(slot(key).as_bytes())? {
        Some(ivec) => Ok(Some(str::from_utf8(&ivec)?.to_string())),
        None => Ok(None),
    }
}

/// 原子地加上 `delta`（调用方持有 LocalStore 的写锁）
pub fn incr_by(db: &Db, key: &str, delta: i64) -> Result<i64> {
    let old = match get(db, key)? {
        Some(s) => s.parse::<i64>().map_err(|_| StoreError::not_integer())?,
        None => 0,
    };
    let new = old
        .checked_add(delta)
        .ok_or_else(|| StoreError::Backend("ERR increment or decrement would overflow".into()))?;
    keyspace::claim(db, key, Kind::String)?;
    db.insert(slot(key).as_bytes(), new.to_string().as_bytes())?;
    Ok(new)
}
