// src/config.rs

//! 连接配置：显式参数 > 环境变量 > 默认值
//!
//! [`ConnectOptions`] holds what the caller said explicitly (flags or a JSON
//! file); [`ConnectOptions::resolve`] fills every gap from the environment and
//! then from defaults, producing plain [`Settings`]. Nothing here is global.

use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::namespace::{KeyNamespace, PrefixMatch};

pub const ENV_HOST: &str = "REDIS_HOST";
pub const ENV_PORT: &str = "REDIS_PORT";
pub const ENV_PASSWORD: &str = "REDIS_PASSWORD";
pub const ENV_DB: &str = "REDIS_DEFAULT_DB";
pub const ENV_NAMESPACE: &str = "APP_NAME";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SLOW_CALL_MS: u64 = 10;

/// 显式给出的连接参数，全部可选
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConnectOptions {
    /// "host:port"，优先于 host / port
    pub addr: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub db: Option<i64>,
    /// 命名空间 token，对应 APP_NAME
    pub namespace: Option<String>,
    pub prefix_match: Option<PrefixMatch>,
    /// 单次调用的超时（毫秒），不设则不限
    pub call_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    /// 超过该耗时的调用记入慢日志
    pub slow_call_ms: Option<u64>,
}

/// Fully resolved connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    pub namespace: KeyNamespace,
    pub call_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub slow_call: Duration,
}

impl Settings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ConnectOptions {
    /// Resolves against the process environment.
    pub fn resolve(&self) -> Result<Settings> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolves against an arbitrary variable lookup; empty values count as unset.
    ///
    /// An explicit `addr` is never skipped: a bare host takes the usual port
    /// chain, a malformed one is an error.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<Settings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let (addr_host, addr_port) = match self.addr.as_deref() {
            Some(addr) => split_addr(addr)?,
            None => (None, None),
        };
        let host = addr_host
            .or_else(|| self.host.clone())
            .or_else(|| env(ENV_HOST))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = addr_port
            .or(self.port)
            .or_else(|| parse_env(ENV_PORT, env(ENV_PORT)))
            .unwrap_or(DEFAULT_PORT);

        let password = self
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| env(ENV_PASSWORD));

        let db = self
            .db
            .or_else(|| parse_env(ENV_DB, env(ENV_DB)))
            .unwrap_or(0);

        let token = self
            .namespace
            .clone()
            .or_else(|| env(ENV_NAMESPACE))
            .unwrap_or_default();
        let namespace = KeyNamespace::with_policy(token, self.prefix_match.unwrap_or_default());

        Ok(Settings {
            host,
            port,
            password,
            db,
            namespace,
            call_timeout: self.call_timeout_ms.map(Duration::from_millis),
            connect_timeout: Duration::from_millis(
                self.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            ),
            slow_call: Duration::from_millis(self.slow_call_ms.unwrap_or(DEFAULT_SLOW_CALL_MS)),
        })
    }

    /// 字段级合并：`self` 中已设置的值优先
    pub fn or(self, fallback: ConnectOptions) -> ConnectOptions {
        ConnectOptions {
            addr: self.addr.or(fallback.addr),
            host: self.host.or(fallback.host),
            port: self.port.or(fallback.port),
            password: self.password.or(fallback.password),
            db: self.db.or(fallback.db),
            namespace: self.namespace.or(fallback.namespace),
            prefix_match: self.prefix_match.or(fallback.prefix_match),
            call_timeout_ms: self.call_timeout_ms.or(fallback.call_timeout_ms),
            connect_timeout_ms: self.connect_timeout_ms.or(fallback.connect_timeout_ms),
            slow_call_ms: self.slow_call_ms.or(fallback.slow_call_ms),
        }
    }
}

/// "host:port" 或单独的 "host"
fn split_addr(addr: &str) -> Result<(Option<String>, Option<u16>)> {
    let addr = addr.trim();
    let (host, port) = match addr.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .with_context(|| format!("invalid port in address {:?}", addr))?;
            (host, Some(port))
        }
        None => (addr, None),
    };
    if host.is_empty() {
        bail!("missing host in address {:?}", addr);
    }
    Ok((Some(host.to_string()), port))
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring malformed environment value");
            None
        }
    }
}

/// 从指定路径读取 JSON 配置；文件不存在时返回全空的选项
pub fn load<P: AsRef<Path>>(path: P) -> Result<ConnectOptions> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Ok(ConnectOptions::default());
    }

    let data = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read config file {:?}", path_ref))?;
    let opts: ConnectOptions = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse config file {:?}", path_ref))?;
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() -> Result<()> {
        let s = ConnectOptions::default().resolve_with(|_| None)?;
        assert_eq!(s.addr(), "localhost:6379");
        assert_eq!(s.db, 0);
        assert_eq!(s.password, None);
        assert!(!s.namespace.is_enabled());
        assert_eq!(s.call_timeout, None);
        assert_eq!(s.connect_timeout, Duration::from_millis(5000));
        assert_eq!(s.slow_call, Duration::from_millis(10));
        Ok(())
    }

    #[test]
    fn test_environment_fills_gaps() -> Result<()> {
        let env = env_of(&[
            (ENV_HOST, "cache.internal"),
            (ENV_PORT, "6380"),
            (ENV_PASSWORD, "s3cret"),
            (ENV_DB, "4"),
            (ENV_NAMESPACE, "myapp"),
        ]);
        let s = ConnectOptions::default().resolve_with(env)?;
        assert_eq!(s.addr(), "cache.internal:6380");
        assert_eq!(s.password.as_deref(), Some("s3cret"));
        assert_eq!(s.db, 4);
        assert_eq!(s.namespace.token(), "myapp");
        Ok(())
    }

    #[test]
    fn test_explicit_beats_environment() -> Result<()> {
        let env = env_of(&[(ENV_HOST, "env-host"), (ENV_DB, "4"), (ENV_NAMESPACE, "envapp")]);
        let opts = ConnectOptions {
            addr: Some("10.0.0.1:7000".into()),
            db: Some(2),
            namespace: Some("cliapp".into()),
            ..Default::default()
        };
        let s = opts.resolve_with(env)?;
        assert_eq!(s.addr(), "10.0.0.1:7000");
        assert_eq!(s.db, 2);
        assert_eq!(s.namespace.token(), "cliapp");
        Ok(())
    }

    #[test]
    fn test_explicit_addr_is_never_skipped() -> Result<()> {
        let env = env_of(&[(ENV_HOST, "env-host"), (ENV_PORT, "6390")]);

        // 只有 host：端口继续走 显式 > 环境 > 默认
        let opts = ConnectOptions { addr: Some("cache".into()), ..Default::default() };
        assert_eq!(opts.resolve_with(&env)?.addr(), "cache:6390");
        assert_eq!(opts.resolve_with(|_| None)?.addr(), "cache:6379");

        for bad in ["cache:", "cache:notaport", ":6379", "cache:70000", ""] {
            let opts = ConnectOptions { addr: Some(bad.into()), ..Default::default() };
            assert!(opts.resolve_with(&env).is_err(), "accepted {:?}", bad);
        }
        Ok(())
    }

    #[test]
    fn test_malformed_and_empty_env_values_fall_back() -> Result<()> {
        let env = env_of(&[(ENV_PORT, "not-a-port"), (ENV_DB, "x"), (ENV_PASSWORD, "")]);
        let s = ConnectOptions::default().resolve_with(env)?;
        assert_eq!(s.port, DEFAULT_PORT);
        assert_eq!(s.db, 0);
        assert_eq!(s.password, None);
        Ok(())
    }

    #[test]
    fn test_empty_explicit_password_falls_back_to_env() -> Result<()> {
        let env = env_of(&[(ENV_PASSWORD, "from-env")]);
        let opts = ConnectOptions { password: Some(String::new()), ..Default::default() };
        assert_eq!(opts.resolve_with(env)?.password.as_deref(), Some("from-env"));
        Ok(())
    }

    #[test]
    fn test_merge_prefers_self() {
        let flags = ConnectOptions { db: Some(1), ..Default::default() };
        let file = ConnectOptions { db: Some(9), host: Some("h".into()), ..Default::default() };
        let merged = flags.or(file);
        assert_eq!(merged.db, Some(1));
        assert_eq!(merged.host.as_deref(), Some("h"));
    }

    #[test]
    fn test_load_json_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nskv.json");

        // 文件不存在 → 全空
        assert_eq!(load(&path)?, ConnectOptions::default());

        fs::write(
            &path,
            r#"{ "host": "db.local", "namespace": "svc", "prefix_match": "delimited", "call_timeout_ms": 250 }"#,
        )?;
        let opts = load(&path)?;
        assert_eq!(opts.host.as_deref(), Some("db.local"));
        assert_eq!(opts.prefix_match, Some(PrefixMatch::Delimited));

        let s = opts.resolve_with(|_| None)?;
        assert_eq!(s.namespace.policy(), PrefixMatch::Delimited);
        assert_eq!(s.call_timeout, Some(Duration::from_millis(250)));

        fs::write(&path, "{ not json")?;
        assert!(load(&path).is_err());
        Ok(())
    }
}
