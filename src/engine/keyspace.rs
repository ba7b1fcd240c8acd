// src/engine/keyspace.rs

//! keyspace：记录每个 key 的类型，负责整 key 的删除与模式匹配

use sled::{Db, Tree};

use crate::error::{Result, StoreError};
use crate::expire;
use crate::types::Kind;

const KEYSPACE_TREE: &str = "keyspace";

fn keyspace(db: &Db) -> Result<Tree> {
    Ok(db.open_tree(KEYSPACE_TREE)?)
}

/// 当前 key 的类型；已过期的 key 会先被清除
pub fn kind_of(db: &Db, key: &str) -> Result<Option<Kind>> {
    expire::remove_if_expired(db, key)?;
    let tag = keyspace(db)?.get(key.as_bytes())?;
    Ok(tag.and_then(|t| Kind::from_tag(&t)))
}

/// `Ok(true)` if `key` holds `kind`, `Ok(false)` if absent, WRONGTYPE otherwise.
pub fn check(db: &Db, key: &str, kind: Kind) -> Result<bool> {
    match kind_of(db, key)? {
        None => Ok(false),
        Some(k) if k == kind => Ok(true),
        Some(_) => Err(StoreError::wrong_type()),
    }
}

/// 写操作前调用：key 不存在时登记为 `kind`
pub fn claim(db: &Db, key: &str, kind: Kind) -> Result<()> {
    if !check(db, key, kind)? {
        keyspace(db)?.insert(key.as_bytes(), kind.tag().as_bytes())?;
    }
    Ok(())
}

/// Removes the key with its data and expiry. Does not look at the expiry first.
pub fn remove(db: &Db, key: &str) -> Result<bool> {
    let prev = keyspace(db)?.remove(key.as_bytes())?;
    if let Some(kind) = prev.as_ref().and_then(|t| Kind::from_tag(t)) {
        let name = kind.storage_name(key);
        match kind {
            Kind::String => {
                db.remove(name.as_bytes())?;
            }
            _ => {
                db.drop_tree(name.as_bytes())?;
            }
        }
    }
    expire::clear(db, key)?;
    Ok(prev.is_some())
}

/// 删除仍然存活的 key，返回实际删除的数量
pub fn delete_all(db: &Db, keys: &[String]) -> Result<u64> {
    let mut removed = 0;
    for key in keys {
        if kind_of(db, key)?.is_some() && remove(db, key)? {
            removed += 1;
        }
    }
    Ok(removed)
}

pub fn keys(db: &Db, pattern: &str) -> Result<Vec<String>> {
    let mut all = Vec::new();
    for item in keyspace(db)?.iter() {
        let (k, _) = item?;
        all.push(std::str::from_utf8(&k)?.to_string());
    }
    let mut out = Vec::new();
    for key in all {
        if expire::remove_if_expired(db, &key)? {
            continue;
        }
        if glob_match(pattern, &key) {
            out.push(key);
        }
    }
    Ok(out)
}

/// Glob matching as the KEYS command understands it: `*`, `?`, `[abc]`,
/// `[a-z]`, `[^a]`, and `\` to escape the next character.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    // 最近一个 '*' 之后的 pattern 位置，以及它当前吞到的 text 位置
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi + 1, ti));
            pi += 1;
            continue;
        }
        if pi < p.len() {
            if let Some(next) = step(&p, pi, t[ti]) {
                pi = next;
                ti += 1;
                continue;
            }
        }
        match star {
            Some((sp, st)) => {
                pi = sp;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Matches the single-character pattern element at `pi` against `c`.
fn step(p: &[char], pi: usize, c: char) -> Option<usize> {
    match p[pi] {
        '?' => Some(pi + 1),
        '\\' if pi + 1 < p.len() => (p[pi + 1] == c).then_some(pi + 2),
        '[' => match class(p, pi, c) {
            Some((hit, next)) => hit.then_some(next),
            // 没有闭合的 ']'，按字面量处理
            None => (c == '[').then_some(pi + 1),
        },
        lit => (lit == c).then_some(pi + 1),
    }
}

fn class(p: &[char], open: usize, c: char) -> Option<(bool, usize)> {
    let mut i = open + 1;
    let negate = i < p.len() && p[i] == '^';
    if negate {
        i += 1;
    }
    let mut hit = false;
    while i < p.len() {
        match p[i] {
            ']' => return Some((hit != negate, i + 1)),
            '\\' if i + 1 < p.len() => {
                hit |= p[i + 1] == c;
                i += 2;
            }
            lo if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' => {
                let hi = p[i + 2];
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                hit |= lo <= c && c <= hi;
                i += 3;
            }
            lit => {
                hit |= lit == c;
                i += 1;
            }
        }
    }
    None
}
