//! Commands that open a pool: ping, exec

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use pgbind_core::{stdout_writer, DbLogger, LogLevel, LoggerConfig, PostgreSql, QueryLogger};
use tracing::info;

use super::load_config;

#[derive(Args, Debug, Clone)]
pub struct LoggerArgs {
    /// Query log level: silent, error, warn, info
    #[arg(long, default_value = "warn")]
    pub log_level: LogLevel,

    /// Flag statements slower than this many milliseconds (0 disables)
    #[arg(long, default_value = "200")]
    pub slow_ms: u64,

    /// Colorize query log output
    #[arg(long)]
    pub color: bool,

    /// Log every statement (same as --log-level info)
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl LoggerArgs {
    fn build(&self) -> Arc<dyn QueryLogger> {
        let logger = DbLogger::new(
            stdout_writer(),
            LoggerConfig {
                slow_threshold: Duration::from_millis(self.slow_ms),
                colorful: self.color,
                ignore_record_not_found_error: false,
                log_level: self.log_level,
            },
        );

        if self.verbose {
            logger.log_mode(LogLevel::Info)
        } else {
            Arc::new(logger)
        }
    }
}

#[derive(Parser, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub logger: LoggerArgs,
}

#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// SQL statement(s) to execute
    pub sql: String,

    #[command(flatten)]
    pub logger: LoggerArgs,
}

async fn open(config_path: Option<&Path>, logger: &LoggerArgs) -> Result<PostgreSql> {
    let mut cfg = load_config(config_path)?;
    let db = PostgreSql::connect(&mut cfg)
        .await
        .with_context(|| format!("Could not connect to {}:{}/{}", cfg.host, cfg.port, cfg.name))?;
    Ok(db.with_logger(logger.build()))
}

pub async fn run_ping(config_path: Option<&Path>, args: PingArgs) -> Result<()> {
    let db = open(config_path, &args.logger).await?;
    db.ping().await.context("SELECT 1 failed")?;
    info!("ping succeeded");
    println!("ok");
    db.close().await;
    Ok(())
}

pub async fn run_exec(config_path: Option<&Path>, args: ExecArgs) -> Result<()> {
    let db = open(config_path, &args.logger).await?;
    let result = db.execute(&args.sql).await;
    db.close().await;

    let rows = result.context("Statement failed")?;
    println!("{rows} row(s) affected");
    Ok(())
}
