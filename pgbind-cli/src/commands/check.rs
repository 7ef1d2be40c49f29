//! Offline config validation

use std::path::Path;

use anyhow::{bail, Result};
use chrono_tz::Tz;
use pgbind_core::Config;
use tracing::warn;

use super::load_config;

pub fn run_check(config_path: Option<&Path>) -> Result<()> {
    let mut cfg = load_config(config_path)?;
    cfg.apply_default_timezone();

    if cfg.pass.is_empty() {
        warn!("password is empty");
    }

    let problems = validate(&cfg);
    if problems.is_empty() {
        let limits = cfg.pool_limits();
        println!(
            "ok: {}@{}:{}/{} max-connections={} min-connections={} timezone={}",
            cfg.user,
            cfg.host,
            cfg.port,
            cfg.name,
            limits.max_connections(),
            limits.min_connections(),
            cfg.timezone,
        );
        return Ok(());
    }

    for problem in &problems {
        eprintln!("error: {problem}");
    }
    bail!("{} problem(s) found in config", problems.len())
}

/// Problems that would make a connection fail or behave unexpectedly.
pub fn validate(cfg: &Config) -> Vec<String> {
    let mut problems = Vec::new();

    if cfg.host.trim().is_empty() {
        problems.push("host is empty".to_string());
    }
    if cfg.name.trim().is_empty() {
        problems.push("database name is empty".to_string());
    }
    if cfg.port == 0 {
        problems.push("port must be non-zero".to_string());
    }
    if cfg.timezone.parse::<Tz>().is_err() {
        problems.push(format!("unknown timezone '{}'", cfg.timezone));
    }
    if cfg.max_connection_pool > 0 && cfg.min_connection_pool > cfg.max_connection_pool {
        problems.push(format!(
            "min-pool ({}) exceeds max-pool ({})",
            cfg.min_connection_pool, cfg.max_connection_pool
        ));
    }

    problems
}
