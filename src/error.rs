// src/error.rs

//! 错误类型：调用方可以区分的几类失败
//!
//! The facade never retries and never substitutes defaults, so every variant
//! here is exactly what the caller sees for the single command it issued.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Why a call was abandoned before the store answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The per-call deadline elapsed.
    Deadline(Duration),
    /// A caller fired the [`CancelToken`](crate::cancel::CancelToken).
    Token,
}

impl std::fmt::Display for CancelCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelCause::Deadline(d) => write!(f, "deadline of {}ms elapsed", d.as_millis()),
            CancelCause::Token => f.write_str("cancelled by caller"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached: network, refused, dropped or auth failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Key or field absent where the store reports "nil". `key` is the physical key.
    #[error("not found: {key}")]
    NotFound { key: String },

    /// The stored value is not of the type the operation expects.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Abandoned before completion; the store-side effect may or may not have happened.
    #[error("cancelled: {0}")]
    Cancelled(CancelCause),

    /// Any other error reply from the store, message kept verbatim.
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        StoreError::NotFound { key: key.into() }
    }

    pub fn wrong_type() -> Self {
        StoreError::TypeMismatch(
            "WRONGTYPE Operation against a key holding the wrong kind of value".into(),
        )
    }

    pub fn not_integer() -> Self {
        StoreError::TypeMismatch("ERR value is not an integer or out of range".into())
    }

    pub fn invalid_expire(cmd: &str) -> Self {
        StoreError::Backend(format!("ERR invalid expire time in '{}' command", cmd))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled(_))
    }
}

// 嵌入式 sled 后端的底层错误统一归为 Backend
impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(format!("local store: {}", e))
    }
}

impl From<std::str::Utf8Error> for StoreError {
    fn from(e: std::str::Utf8Error) -> Self {
        StoreError::Backend(format!("non-utf8 data: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_store_message() {
        let e = StoreError::Backend("ERR increment or decrement would overflow".into());
        assert_eq!(e.to_string(), "ERR increment or decrement would overflow");

        let e = StoreError::Cancelled(CancelCause::Deadline(Duration::from_millis(50)));
        assert_eq!(e.to_string(), "cancelled: deadline of 50ms elapsed");
        assert!(e.is_cancelled());

        assert!(StoreError::not_found("myapp:x").is_not_found());
        assert!(!StoreError::wrong_type().is_not_found());
    }
}
