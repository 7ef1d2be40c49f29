//! Render a config without touching the database

use std::path::Path;

use anyhow::Result;

use super::load_config;

/// Print the connection string, with the timezone fallback applied.
pub fn run_dsn(config_path: Option<&Path>) -> Result<()> {
    let mut cfg = load_config(config_path)?;
    cfg.apply_default_timezone();
    println!("{}", cfg.dsn());
    Ok(())
}

pub fn run_show(config_path: Option<&Path>) -> Result<()> {
    let cfg = load_config(config_path)?;
    println!("{cfg}");
    Ok(())
}
