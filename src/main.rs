// src/main.rs
use clap::Parser;
use nskv::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志写到 stderr，stdout 只留命令输出
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let out = cli::run(Cli::parse()).await?;
    println!("{}", out);
    Ok(())
}
