// src/types/list.rs

//! # List Type Support
//!
//! Redis-like lists (deques) on top of `sled`. Each list is stored as a
//! separate `sled::Tree` named `"list:<key>"`. Elements are keyed by the
//! big-endian bytes of an `i64` sequence number with the sign bit flipped, so
//! tree order is list order and both ends can grow without renumbering.
//!
//! A list whose last element is popped no longer exists.

use sled::{Db, Tree};
use std::str;

use super::Kind;
use crate::engine::keyspace;
use crate::error::Result;

/// Map an `i64` sequence number to a `u64` by flipping the sign bit,
/// so that ordering by `u64` big-endian bytes matches the signed ordering of `i64`.
fn seq_to_u64(seq: i64) -> u64 {
    (seq as u64) ^ (1 << 63)
}

/// Reverse the bitwise flip and convert back to `i64`.
fn u64_to_seq(u: u64) -> i64 {
    (u ^ (1 << 63)) as i64
}

fn seq_to_key(seq: i64) -> [u8; 8] {
    seq_to_u64(seq).to_be_bytes()
}

fn key_to_seq(k: &[u8]) -> i64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&k[0..8]);
    u64_to_seq(u64::from_be_bytes(b))
}

fn open(db: &Db, key: &str) -> Result<Tree> {
    Ok(db.open_tree(Kind::List.storage_name(key))?)
}

/// Current head and tail sequence numbers, or `None` for an empty list.
fn get_bounds(tree: &Tree) -> Result<Option<(i64, i64)>> {
    let head = tree.first()?.map(|(k, _)| key_to_seq(&k));
    let tail = tree.last()?.map(|(k, _)| key_to_seq(&k));
    Ok(head.zip(tail))
}

#[derive(Clone, Copy)]
enum End {
    Head,
    Tail,
}

fn push(db: &Db, key: &str, value: &str, end: End) -> Result<u64> {
    keyspace::claim(db, key, Kind::List)?;
    let tree = open(db, key)?;
    // First element uses sequence 0
    let seq = match (get_bounds(&tree)?, end) {
        (Some((head, _)), End::Head) => head - 1,
        (Some((_, tail)), End::Tail) => tail + 1,
        (None, _) => 0,
    };
    tree.insert(seq_to_key(seq), value.as_bytes())?;
    Ok(tree.len() as u64)
}

fn pop(db: &Db, key: &str, end: End) -> Result<Option<String>> {
    if !keyspace::check(db, key, Kind::List)? {
        return Ok(None);
    }
    let tree = open(db, key)?;
    let popped = match end {
        End::Head => tree.pop_min()?,
        End::Tail => tree.pop_max()?,
    };
    let emptied = tree.is_empty();
    drop(tree);
    if emptied {
        keyspace::remove(db, key)?;
    }
    match popped {
        Some((_, iv)) => Ok(Some(str::from_utf8(&iv)?.to_string())),
        None => Ok(None),
    }
}

/// LPUSH: push `value` to the head, returning the new length.
pub fn lpush(db: &Db, key: &str, value: &str) -> Result<u64> {
    push(db, key, value, End::Head)
}

/// RPUSH: push `value` to the tail, returning the new length.
pub fn rpush(db: &Db, key: &str, value: &str) -> Result<u64> {
    push(db, key, value, End::Tail)
}

/// LPOP: remove and return the head element, `None` for an empty or missing list.
pub fn lpop(db: &Db, key: &str) -> Result<Option<String>> {
    pop(db, key, End::Head)
}

/// RPOP: remove and return the tail element.
pub fn rpop(db: &Db, key: &str) -> Result<Option<String>> {
    pop(db, key, End::Tail)
}

/// LLEN: length of the list, 0 when missing.
pub fn llen(db: &Db, key: &str) -> Result<u64> {
    if !keyspace::check(db, key, Kind::List)? {
        return Ok(0);
    }
    Ok(open(db, key)?.len() as u64)
}

/// Execute LRANGE:
/// Return elements in the inclusive range `[start, stop]`. Negative indices
/// count from the tail (`-1` is the last element). Out-of-range bounds are
/// clamped; an empty range yields an empty vector.
pub fn lrange(db: &Db, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
    if !keyspace::check(db, key, Kind::List)? {
        return Ok(Vec::new());
    }
    let tree = open(db, key)?;
    let total = tree.len() as i64;
    // Normalize negative indices
    let s = (if start < 0 { total + start } else { start }).max(0);
    let e = (if stop < 0 { total + stop } else { stop }).min(total - 1);
    if s > e || s >= total {
        return Ok(Vec::new());
    }
    let mut out = Vec::with_capacity((e - s + 1) as usize);
    for item in tree.iter().skip(s as usize).take((e - s + 1) as usize) {
        let (_, iv) = item?;
        out.push(str::from_utf8(&iv)?.to_string());
    }
    Ok(out)
}
