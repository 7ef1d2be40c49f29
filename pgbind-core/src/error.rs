//! Structured error types for pgbind-core.
//!
//! Connection failures keep the underlying `sqlx::Error` as their source so
//! callers can still inspect it. Statement helpers on `PostgreSql` return
//! `sqlx::Error` directly and never go through this type.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pgbind-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Opening the pool failed
    #[error("failed to connect database; {source}")]
    Connect { source: sqlx::Error },

    /// The driver handle behind the pool could not be obtained
    #[error("failed to get sql db; {source}")]
    DriverHandle { source: sqlx::Error },

    /// Reading a configuration file failed
    #[error("Failed to read config file {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// Configuration file is not valid TOML
    #[error("Failed to parse config file (invalid TOML): {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },

    /// Configuration value is invalid
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for pgbind-core operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a failure to open the pool
    pub fn connect(source: sqlx::Error) -> Self {
        Self::Connect { source }
    }

    /// Wrap a failure to reach the driver handle
    pub fn driver_handle(source: sqlx::Error) -> Self {
        Self::DriverHandle { source }
    }

    /// Create an I/O error for a config path
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_connect_error_display() {
        let err = Error::connect(sqlx::Error::PoolTimedOut);
        assert_eq!(
            err.to_string(),
            format!("failed to connect database; {}", sqlx::Error::PoolTimedOut)
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_driver_handle_error_display() {
        let err = Error::driver_handle(sqlx::Error::PoolClosed);
        assert!(err.to_string().starts_with("failed to get sql db; "));
        assert!(matches!(
            err,
            Error::DriverHandle {
                source: sqlx::Error::PoolClosed
            }
        ));
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::config("DB_PORT must be a number");
        assert_eq!(
            err.to_string(),
            "Configuration error: DB_PORT must be a number"
        );

        let err = Error::io("/tmp/db.toml", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.to_string().contains("/tmp/db.toml"));
    }
}
