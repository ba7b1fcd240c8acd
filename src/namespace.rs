// src/namespace.rs

//! # Key namespacing
//!
//! Maps the logical keys used by application code onto the physical keys sent
//! to the store, so several applications (or environments) can share one
//! database without colliding.
//!
//! The rule, for a token `T` and a logical key `K`:
//! 1. empty `T` → `K` unchanged;
//! 2. `K` already starts with `T` → `K` unchanged (no double prefixing);
//! 3. otherwise → `T` followed by a single `:` and then `K`.
//!
//! Step 2 is governed by [`PrefixMatch`].

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

const SEPARATOR: char = ':';

/// How step 2 decides that a key is already namespaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixMatch {
    /// Raw, case-sensitive `starts_with(token)`. `"appnameXYZ"` counts as
    /// namespaced under `"appname"` even without a separator.
    #[default]
    Raw,
    /// The token must be followed by `:` or end-of-string.
    Delimited,
}

/// Namespace token plus the policy for applying it. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyNamespace {
    token: String,
    // token 规范化后以单个 ':' 结尾
    normalized: String,
    policy: PrefixMatch,
}

impl KeyNamespace {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_policy(token, PrefixMatch::Raw)
    }

    pub fn with_policy(token: impl Into<String>, policy: PrefixMatch) -> Self {
        let token = token.into();
        let normalized = if token.is_empty() || token.ends_with(SEPARATOR) {
            token.clone()
        } else {
            format!("{}{}", token, SEPARATOR)
        };
        KeyNamespace { token, normalized, policy }
    }

    /// No prefixing at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn policy(&self) -> PrefixMatch {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        !self.token.is_empty()
    }

    /// Logical key → physical key.
    pub fn apply<'a>(&self, key: &'a str) -> Cow<'a, str> {
        if !self.is_enabled() || self.is_namespaced(key) {
            return Cow::Borrowed(key);
        }
        Cow::Owned(format!("{}{}", self.normalized, key))
    }

    /// Applies [`apply`](Self::apply) to every key of a variadic call.
    pub fn apply_all<S: AsRef<str>>(&self, keys: &[S]) -> Vec<String> {
        keys.iter().map(|k| self.apply(k.as_ref()).into_owned()).collect()
    }

    /// Physical key → logical key. Keys outside the namespace come back unchanged.
    pub fn strip<'a>(&self, physical: &'a str) -> &'a str {
        if !self.is_enabled() {
            return physical;
        }
        physical.strip_prefix(self.normalized.as_str()).unwrap_or(physical)
    }

    fn is_namespaced(&self, key: &str) -> bool {
        let Some(rest) = key.strip_prefix(self.token.as_str()) else {
            return false;
        };
        match self.policy {
            PrefixMatch::Raw => true,
            PrefixMatch::Delimited => {
                self.token.ends_with(SEPARATOR) || rest.is_empty() || rest.starts_with(SEPARATOR)
            }
        }
    }
}
