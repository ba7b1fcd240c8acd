// src/cli.rs

//! 命令行前端：每个 facade 操作对应一个子命令
//!
//! Output is plain text: scalars on one line, sequences one item per line,
//! hashes as `field=value` lines sorted by field, `(nil)` for a missing key.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, ConnectOptions, Settings};
use crate::engine::LocalStore;
use crate::error::StoreError;
use crate::facade::StoreFacade;
use crate::monitor::Monitor;
use crate::store::{RedisStore, Store};

/// Namespaced key-value client
#[derive(Parser, Debug)]
#[command(name = "nskv")]
#[command(about = "Run one namespaced command against Redis or a local store")]
#[command(version)]
pub struct Cli {
    /// Redis host (overrides REDIS_HOST)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Redis port (overrides REDIS_PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// "host:port", takes precedence over --host / --port
    #[arg(long, global = true)]
    pub addr: Option<String>,

    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Logical database index (overrides REDIS_DEFAULT_DB)
    #[arg(long, global = true)]
    pub db: Option<i64>,

    /// Key namespace (overrides APP_NAME)
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Per-call deadline in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// JSON file with connection options; flags win over it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use an embedded store in this directory instead of Redis
    #[arg(long, global = true)]
    pub local: Option<PathBuf>,

    /// Print call counters in Prometheus text format after the command
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Print calls slower than the slow-call threshold after the command
    #[arg(long, global = true)]
    pub slowlog: bool,

    /// Slow-call threshold in milliseconds
    #[arg(long, global = true)]
    pub slow_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Check that the store answers
    Ping,
    /// List keys matching a glob pattern (printed without the namespace)
    Keys {
        #[arg(default_value = "*")]
        pattern: String,
    },
    /// Remaining time to live in seconds (-1 no expiry, -2 missing)
    Ttl { key: String },
    Exists { key: String },
    /// Delete keys, printing how many existed
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Set a timeout in seconds on a key
    Expire { key: String, secs: u64 },

    Get { key: String },
    Set { key: String, value: String },
    /// Set with an expiry in seconds (0 = none)
    SetEx { key: String, value: String, secs: u64 },
    Incr { key: String },
    IncrBy {
        key: String,
        #[arg(allow_negative_numbers = true)]
        n: i64,
    },
    Decr { key: String },
    DecrBy {
        key: String,
        #[arg(allow_negative_numbers = true)]
        n: i64,
    },

    Hget { key: String, field: String },
    Hset { key: String, field: String, value: String },
    Hdel { key: String, field: String },
    Hexists { key: String, field: String },
    Hgetall { key: String },
    Hincr { key: String, field: String },
    HincrBy {
        key: String,
        field: String,
        #[arg(allow_negative_numbers = true)]
        n: i64,
    },
    Hdecr { key: String, field: String },
    HdecrBy {
        key: String,
        field: String,
        #[arg(allow_negative_numbers = true)]
        n: i64,
    },

    Lpush { key: String, value: String },
    Rpush { key: String, value: String },
    Lpop { key: String },
    Rpop { key: String },
    /// Elements in [start, stop]; negative indices count from the tail
    Lrange {
        key: String,
        #[arg(allow_negative_numbers = true)]
        start: i64,
        #[arg(allow_negative_numbers = true)]
        stop: i64,
    },
    Llen { key: String },

    Sadd { key: String, member: String },
    Srem { key: String, member: String },
    Sismember { key: String, member: String },
    Smembers { key: String },
}

impl Cli {
    /// Flags, then the optional config file underneath them.
    pub fn options(&self) -> Result<ConnectOptions> {
        let flags = ConnectOptions {
            addr: self.addr.clone(),
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
            db: self.db,
            namespace: self.namespace.clone(),
            call_timeout_ms: self.timeout_ms,
            slow_call_ms: self.slow_ms,
            ..Default::default()
        };
        match &self.config {
            Some(path) => Ok(flags.or(config::load(path)?)),
            None => Ok(flags),
        }
    }
}

/// Resolves settings, opens the chosen store and runs the subcommand.
pub async fn run(cli: Cli) -> Result<String> {
    let settings = cli.options()?.resolve()?;

    match &cli.local {
        Some(dir) => {
            let store = LocalStore::open(dir)
                .with_context(|| format!("opening local store at {}", dir.display()))?;
            let facade = build_facade(store.clone(), &settings);
            let out = render(&facade, &cli).await;
            store.flush().context("flushing local store")?;
            out
        }
        None => {
            let store = RedisStore::connect(&settings)
                .await
                .with_context(|| format!("connecting to {}", settings.addr()))?;
            let facade = build_facade(store, &settings);
            render(&facade, &cli).await
        }
    }
}

fn build_facade<S: Store>(store: S, settings: &Settings) -> StoreFacade<S> {
    let facade = StoreFacade::new(store, settings.namespace.clone())
        .with_monitor(Monitor::new(settings.slow_call));
    match settings.call_timeout {
        Some(d) => facade.with_timeout(d),
        None => facade,
    }
}

async fn render<S: Store + ?Sized>(facade: &StoreFacade<S>, cli: &Cli) -> Result<String> {
    let mut out = execute(facade, &cli.command).await?;
    if cli.metrics {
        out.push('\n');
        out.push_str(facade.monitor().metrics.to_prometheus().trim_end());
    }
    if cli.slowlog {
        let logs = facade.monitor().slow_log.get_logs();
        out.push('\n');
        out.push_str(if logs.is_empty() { "(no slow calls)" } else { logs.trim_end() });
    }
    Ok(out)
}

/// Runs one command and formats its reply. `NotFound` prints as `(nil)`.
pub async fn execute<S: Store + ?Sized>(facade: &StoreFacade<S>, cmd: &Command) -> Result<String> {
    match dispatch(facade, cmd).await {
        Ok(out) => Ok(out),
        Err(e) if e.is_not_found() => Ok("(nil)".to_string()),
        Err(e) => Err(e.into()),
    }
}

async fn dispatch<S: Store + ?Sized>(
    f: &StoreFacade<S>,
    cmd: &Command,
) -> std::result::Result<String, StoreError> {
    use Command::*;

    let out = match cmd {
        Ping => f.ping().await?,
        Keys { pattern } => {
            let mut keys: Vec<String> = f
                .keys(pattern)
                .await?
                .iter()
                .map(|k| f.namespace().strip(k).to_string())
                .collect();
            keys.sort();
            lines(keys)
        }
        Ttl { key } => f.ttl(key).await?.as_reply().to_string(),
        Exists { key } => flag(f.exists(key).await?),
        Del { keys } => f.del(keys.as_slice()).await?.to_string(),
        Expire { key, secs } => flag(f.expire(key, *secs).await?),

        Get { key } => f.get(key).await?,
        Set { key, value } => {
            f.set(key, value).await?;
            "OK".to_string()
        }
        SetEx { key, value, secs } => {
            f.set_ex(key, value, *secs).await?;
            "OK".to_string()
        }
        Incr { key } => f.incr(key).await?.to_string(),
        IncrBy { key, n } => f.incr_by(key, *n).await?.to_string(),
        Decr { key } => f.decr(key).await?.to_string(),
        DecrBy { key, n } => f.decr_by(key, *n).await?.to_string(),

        Hget { key, field } => f.hget(key, field).await?,
        Hset { key, field, value } => flag(f.hset(key, field, value).await?),
        Hdel { key, field } => flag(f.hdel(key, field).await?),
        Hexists { key, field } => flag(f.hexists(key, field).await?),
        Hgetall { key } => {
            let mut pairs: Vec<(String, String)> = f.hgetall(key).await?.into_iter().collect();
            pairs.sort();
            lines(pairs.into_iter().map(|(k, v)| format!("{}={}", k, v)).collect())
        }
        Hincr { key, field } => f.hincr(key, field).await?.to_string(),
        HincrBy { key, field, n } => f.hincr_by(key, field, *n).await?.to_string(),
        Hdecr { key, field } => f.hdecr(key, field).await?.to_string(),
        HdecrBy { key, field, n } => f.hdecr_by(key, field, *n).await?.to_string(),

        Lpush { key, value } => f.lpush(key, value).await?.to_string(),
        Rpush { key, value } => f.rpush(key, value).await?.to_string(),
        Lpop { key } => f.lpop(key).await?,
        Rpop { key } => f.rpop(key).await?,
        Lrange { key, start, stop } => lines(f.lrange(key, *start, *stop).await?),
        Llen { key } => f.llen(key).await?.to_string(),

        Sadd { key, member } => flag(f.sadd(key, member).await?),
        Srem { key, member } => flag(f.srem(key, member).await?),
        Sismember { key, member } => flag(f.sismember(key, member).await?),
        Smembers { key } => {
            let mut members = f.smembers(key).await?;
            members.sort();
            lines(members)
        }
    };
    Ok(out)
}

fn flag(b: bool) -> String {
    (if b { "1" } else { "0" }).to_string()
}

fn lines(items: Vec<String>) -> String {
    if items.is_empty() {
        return "(empty)".to_string();
    }
    items.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::KeyNamespace;

    fn facade() -> anyhow::Result<StoreFacade<LocalStore>> {
        Ok(StoreFacade::new(LocalStore::temporary()?, KeyNamespace::new("myapp")))
    }

    async fn exec(f: &StoreFacade<LocalStore>, args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("nskv").chain(args.iter().copied()))?;
        execute(f, &cli.command).await
    }

    #[test]
    fn test_parse_global_flags_anywhere() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "nskv", "get", "k", "--namespace", "myapp", "--timeout-ms", "50", "--port", "6380",
        ])?;
        assert_eq!(cli.command, Command::Get { key: "k".into() });
        let opts = cli.options()?;
        assert_eq!(opts.namespace.as_deref(), Some("myapp"));
        assert_eq!(opts.call_timeout_ms, Some(50));
        assert_eq!(opts.port, Some(6380));
        Ok(())
    }

    #[test]
    fn test_parse_negative_numbers() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["nskv", "lrange", "L", "0", "-1"])?;
        assert_eq!(cli.command, Command::Lrange { key: "L".into(), start: 0, stop: -1 });
        let cli = Cli::try_parse_from(["nskv", "incr-by", "c", "-5"])?;
        assert_eq!(cli.command, Command::IncrBy { key: "c".into(), n: -5 });
        Ok(())
    }

    #[test]
    fn test_flags_win_over_config_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nskv.json");
        std::fs::write(&path, r#"{"host":"cache.internal","namespace":"fromfile","db":3}"#)?;

        let cli = Cli::try_parse_from([
            "nskv", "--config", path.to_str().unwrap_or_default(), "--namespace", "flag", "ping",
        ])?;
        let opts = cli.options()?;
        assert_eq!(opts.namespace.as_deref(), Some("flag"));
        assert_eq!(opts.host.as_deref(), Some("cache.internal"));
        assert_eq!(opts.db, Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_output_formats() -> anyhow::Result<()> {
        let f = facade()?;
        assert_eq!(exec(&f, &["set", "k", "v"]).await?, "OK");
        assert_eq!(exec(&f, &["get", "k"]).await?, "v");
        assert_eq!(exec(&f, &["get", "missing"]).await?, "(nil)");
        assert_eq!(exec(&f, &["exists", "k"]).await?, "1");
        assert_eq!(exec(&f, &["ttl", "k"]).await?, "-1");
        assert_eq!(exec(&f, &["ttl", "missing"]).await?, "-2");

        exec(&f, &["hset", "h", "b", "2"]).await?;
        exec(&f, &["hset", "h", "a", "1"]).await?;
        assert_eq!(exec(&f, &["hgetall", "h"]).await?, "a=1\nb=2");

        exec(&f, &["rpush", "l", "x"]).await?;
        exec(&f, &["rpush", "l", "y"]).await?;
        assert_eq!(exec(&f, &["lrange", "l", "0", "-1"]).await?, "x\ny");
        assert_eq!(exec(&f, &["smembers", "nothing"]).await?, "(empty)");

        // keys 输出逻辑 key
        assert_eq!(exec(&f, &["keys"]).await?, "h\nk\nl");
        assert_eq!(exec(&f, &["del", "k", "h", "zz"]).await?, "2");
        Ok(())
    }

    #[tokio::test]
    async fn test_counter_commands() -> anyhow::Result<()> {
        let f = facade()?;
        assert_eq!(exec(&f, &["incr", "c"]).await?, "1");
        assert_eq!(exec(&f, &["decr-by", "c", "3"]).await?, "-2");
        assert_eq!(exec(&f, &["get", "c"]).await?, "-2");
        assert_eq!(exec(&f, &["hincr-by", "h", "n", "10"]).await?, "10");
        assert_eq!(exec(&f, &["hdecr", "h", "n"]).await?, "9");
        Ok(())
    }

    #[tokio::test]
    async fn test_type_mismatch_is_an_error() -> anyhow::Result<()> {
        let f = facade()?;
        exec(&f, &["sadd", "s", "m"]).await?;
        let err = exec(&f, &["get", "s"]).await.unwrap_err();
        assert!(err.to_string().contains("type mismatch"));
        Ok(())
    }

    #[tokio::test]
    async fn test_run_prints_slow_log() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = dir.path().join("db");
        let db = db.to_str().unwrap_or_default();

        // 阈值为 0：每次调用都记入慢日志
        let cli = Cli::try_parse_from(["nskv", "--local", db, "--slow-ms", "0", "--slowlog", "-n", "svc", "get", "k"])?;
        let out = run(cli).await?;
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("(nil)"));
        let entry = lines.next().unwrap_or_default();
        assert!(entry.starts_with("1. duration: "), "{}", out);
        assert!(entry.ends_with("op: get, key: svc:k"), "{}", out);

        let other = tempfile::tempdir()?;
        let other = other.path().join("db");
        let other = other.to_str().unwrap_or_default();
        let cli = Cli::try_parse_from(["nskv", "--local", other, "--slow-ms", "60000", "--slowlog", "ping"])?;
        assert_eq!(run(cli).await?, "PONG\n(no slow calls)");
        Ok(())
    }

    #[tokio::test]
    async fn test_run_against_local_dir_with_metrics() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = dir.path().join("db");
        let db = db.to_str().unwrap_or_default();

        let cli = Cli::try_parse_from(["nskv", "--local", db, "--namespace", "svc", "--metrics", "set", "k", "v"])?;
        let out = run(cli).await?;
        assert!(out.starts_with("OK\n"));
        assert!(out.contains(r#"nskv_op_calls_total{op="set"} 1"#));
        Ok(())
    }
}
