// src/types/set.rs

//! # Set Type Support
//!
//! Redis-like sets on top of `sled`. Each set is stored as a separate
//! `sled::Tree` named `"set:<key>"`; members are the tree's keys with empty
//! values, giving O(log n) insertion, removal and membership checks.
//! Adding an existing member or removing an absent one is not an error.

use sled::{Db, Tree};

use super::Kind;
use crate::engine::keyspace;
use crate::error::Result;

fn open(db: &Db, key: &str) -> Result<Tree> {
    Ok(db.open_tree(Kind::Set.storage_name(key))?)
}

/// SADD: `true` if `member` was newly added, `false` if it was already present.
pub fn sadd(db: &Db, key: &str, member: &str) -> Result<bool> {
    keyspace::claim(db, key, Kind::Set)?;
    let prev = open(db, key)?.insert(member.as_bytes(), Vec::<u8>::new())?;
    Ok(prev.is_none())
}

/// SREM: `true` if `member` existed and was removed. Removing the last member
/// removes the key.
pub fn srem(db: &Db, key: &str, member: &str) -> Result<bool> {
    if !keyspace::check(db, key, Kind::Set)? {
        return Ok(false);
    }
    let tree = open(db, key)?;
    let prev = tree.remove(member.as_bytes())?;
    let emptied = tree.is_empty();
    drop(tree);
    if emptied {
        keyspace::remove(db, key)?;
    }
    Ok(prev.is_some())
}

/// SISMEMBER
pub fn sismember(db: &Db, key: &str, member: &str) -> Result<bool> {
    if !keyspace::check(db, key, Kind::Set)? {
        return Ok(false);
    }
    Ok(open(db, key)?.contains_key(member.as_bytes())?)
}

/// SMEMBERS: every member, in byte order. Empty for a missing set.
pub fn smembers(db: &Db, key: &str) -> Result<Vec<String>> {
    if !keyspace::check(db, key, Kind::Set)? {
        return Ok(Vec::new());
    }
    let mut members = Vec::new();
    for item in open(db, key)?.iter() {
        let (k, _) = item?;
        members.push(std::str::from_utf8(&k)?.to_string());
    }
    Ok(members)
}
