// src/types/mod.rs

//! String / Hash / List / Set 在 sled 上的存储实现
//!
//! 每个 key 只属于一种类型，类型记录在 keyspace 中（见 `engine::keyspace`）。
//! - string: 默认树中的 `"string:<key>"`
//! - hash / list / set: 独立的 `sled::Tree`，名为 `"<type>:<key>"`

pub mod hash;
pub mod list;
pub mod set;
pub mod string;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Hash,
    List,
    Set,
}

impl Kind {
    pub fn tag(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Hash => "hash",
            Kind::List => "list",
            Kind::Set => "set",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Kind> {
        match tag {
            b"string" => Some(Kind::String),
            b"hash" => Some(Kind::Hash),
            b"list" => Some(Kind::List),
            b"set" => Some(Kind::Set),
            _ => None,
        }
    }

    /// Where the data of `key` lives: a key in the default tree for strings,
    /// a tree name for the aggregate types.
    pub fn storage_name(self, key: &str) -> String {
        format!("{}:{}", self.tag(), key)
    }
}
