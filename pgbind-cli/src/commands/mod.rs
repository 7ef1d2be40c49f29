//! Command implementations for the pgbind CLI

pub mod check;
pub mod db;
pub mod inspect;

use std::path::Path;

use anyhow::{Context, Result};
use pgbind_core::Config;
use tracing::debug;

/// Load the config from `path`, or from the environment after reading `.env`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            Config::load(path).with_context(|| format!("Failed to load {}", path.display()))
        }
        None => {
            match dotenvy::dotenv() {
                Ok(env_file) => debug!("Loaded .env from {}", env_file.display()),
                Err(_) => debug!("No .env file found, using environment variables only"),
            }
            Config::from_env().context("Invalid DB_* environment variable")
        }
    }
}
