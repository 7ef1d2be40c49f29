pub mod config;
pub mod error;
pub mod logger;
pub mod postgres;

pub use config::{Config, PoolLimits, DEFAULT_TIMEZONE, UNLIMITED_MAX_CONNECTIONS};
pub use error::{Error, Result};
pub use logger::{
    stdout_writer, DbLogger, LogLevel, LoggerConfig, QueryLogger, TracingWriter, Writer,
};
pub use postgres::{PostgreSql, SLOW_THRESHOLD};
