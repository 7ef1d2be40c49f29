//! PostgreSQL pool wrapper.
//!
//! Opening, pooling and query execution all belong to sqlx. This module
//! builds the pool from a [`Config`], exposes pool-size setters and routes
//! the statements it runs through a [`QueryLogger`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use crate::config::{Config, PoolLimits};
use crate::error::{Error, Result};
use crate::logger::{DbLogger, LogLevel, LoggerConfig, QueryLogger, TracingWriter, Writer};

/// Slow-statement threshold used by [`PostgreSql::set_logger`].
pub const SLOW_THRESHOLD: Duration = Duration::from_millis(200);

/// A pooled PostgreSQL database with an attached query logger.
#[derive(Debug)]
pub struct PostgreSql {
    pool: PgPool,
    connect_options: PgConnectOptions,
    timezone: Arc<str>,
    limits: PoolLimits,
    db_logger: DbLogger,
    logger: Arc<dyn QueryLogger>,
}

impl PostgreSql {
    /// Open a pool for `cfg`, filling in the default timezone first.
    ///
    /// sqlx establishes one connection before returning, so an unreachable
    /// server or bad credentials fail here. There is no retry of our own;
    /// sqlx keeps retrying a refused TCP connection until its acquire
    /// timeout runs out.
    ///
    /// Every connection the pool opens runs `SET TIME ZONE` with the
    /// config's timezone before it is handed out.
    #[instrument(skip_all, fields(host = %cfg.host, port = cfg.port, dbname = %cfg.name), err)]
    pub async fn connect(cfg: &mut Config) -> Result<Self> {
        cfg.apply_default_timezone();
        let connect_options = cfg.connect_options();
        let timezone: Arc<str> = Arc::from(cfg.timezone.as_str());
        let limits = cfg.pool_limits();

        let pool = session_pool_options(limits, &timezone)
            .connect_with(connect_options.clone())
            .await
            .map_err(Error::connect)?;

        info!(
            max_connections = limits.max_connections(),
            min_connections = limits.min_connections(),
            timezone = %cfg.timezone,
            "database pool opened"
        );

        Ok(Self::from_parts(pool, connect_options, timezone, limits))
    }

    /// Like [`PostgreSql::connect`] but defers connecting until first use.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_lazy(cfg: &mut Config) -> Self {
        cfg.apply_default_timezone();
        let connect_options = cfg.connect_options();
        let timezone: Arc<str> = Arc::from(cfg.timezone.as_str());
        let limits = cfg.pool_limits();
        let pool = session_pool_options(limits, &timezone).connect_lazy_with(connect_options.clone());

        Self::from_parts(pool, connect_options, timezone, limits)
    }

    fn from_parts(
        pool: PgPool,
        connect_options: PgConnectOptions,
        timezone: Arc<str>,
        limits: PoolLimits,
    ) -> Self {
        let db_logger = DbLogger::new(
            Arc::new(TracingWriter),
            LoggerConfig {
                slow_threshold: SLOW_THRESHOLD,
                colorful: false,
                ignore_record_not_found_error: false,
                log_level: LogLevel::Warn,
            },
        );
        let logger: Arc<dyn QueryLogger> = Arc::new(db_logger.clone());

        Self {
            pool,
            connect_options,
            timezone,
            limits,
            db_logger,
            logger,
        }
    }

    /// The sqlx pool backing this database.
    pub fn driver(&self) -> Result<&PgPool> {
        if self.pool.is_closed() {
            return Err(Error::driver_handle(sqlx::Error::PoolClosed));
        }
        Ok(&self.pool)
    }

    /// Pool sizes currently in force.
    pub fn pool_limits(&self) -> PoolLimits {
        self.limits
    }

    /// Sets the maximum number of open connections.
    ///
    /// `n <= 0` means unlimited. sqlx fixes pool sizes when a pool is built,
    /// so this replaces the pool with a lazily connecting one. The call does
    /// not wait on the old pool: pool handles and connections taken from it
    /// earlier keep working, and its connections are closed once the last
    /// of them is dropped.
    pub async fn set_max_connection_pool(&mut self, n: i32) -> Result<()> {
        let limits = PoolLimits { max: n, ..self.limits };
        self.apply_limits(limits).await
    }

    /// Sets the minimum number of idle connections kept open.
    ///
    /// `n <= 0` keeps none. Same pool replacement as
    /// [`PostgreSql::set_max_connection_pool`].
    pub async fn set_min_connection_pool(&mut self, n: i32) -> Result<()> {
        let limits = PoolLimits { min: n, ..self.limits };
        self.apply_limits(limits).await
    }

    async fn apply_limits(&mut self, limits: PoolLimits) -> Result<()> {
        self.driver()?;

        self.pool = session_pool_options(limits, &self.timezone)
            .connect_lazy_with(self.connect_options.clone());
        self.limits = limits;

        debug!(
            max_connections = limits.max_connections(),
            min_connections = limits.min_connections(),
            "pool limits updated"
        );
        Ok(())
    }

    /// Replace the logger with one writing to `writer`: colorful, level
    /// `Warn`, statements slower than [`SLOW_THRESHOLD`] flagged.
    pub fn set_logger(&mut self, writer: Arc<dyn Writer>) {
        let config = LoggerConfig {
            slow_threshold: SLOW_THRESHOLD,
            colorful: true,
            ignore_record_not_found_error: false,
            log_level: LogLevel::Warn,
        };

        self.db_logger = DbLogger::new(writer, config);
        self.logger = Arc::new(self.db_logger.clone());
    }

    /// Install a custom logger. [`PostgreSql::debug_mode`] still derives
    /// from the adapter set by [`PostgreSql::set_logger`].
    pub fn with_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Log every statement with its duration and row count.
    pub fn debug_mode(&mut self) {
        self.logger = self.db_logger.log_mode(LogLevel::Info);
    }

    pub fn logger(&self) -> &Arc<dyn QueryLogger> {
        &self.logger
    }

    /// Run `sql` and return the number of rows affected.
    pub async fn execute(&self, sql: &str) -> std::result::Result<u64, sqlx::Error> {
        let begin = Instant::now();
        let result = sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected());

        let rows = result.as_ref().ok().copied();
        self.logger
            .trace(begin, &|| (sql.to_string(), rows), result.as_ref().err());
        result
    }

    /// Run `sql` and collect every row it returns.
    pub async fn fetch_all(&self, sql: &str) -> std::result::Result<Vec<PgRow>, sqlx::Error> {
        let begin = Instant::now();
        let result = sqlx::raw_sql(sql).fetch_all(&self.pool).await;

        let rows = result.as_ref().ok().map(|rows| rows.len() as u64);
        self.logger
            .trace(begin, &|| (sql.to_string(), rows), result.as_ref().err());
        result
    }

    /// Run `sql` and return its first row, `sqlx::Error::RowNotFound` if none.
    pub async fn fetch_one(&self, sql: &str) -> std::result::Result<PgRow, sqlx::Error> {
        let begin = Instant::now();
        let result = sqlx::raw_sql(sql).fetch_one(&self.pool).await;

        let rows = result.as_ref().ok().map(|_| 1u64);
        self.logger
            .trace(begin, &|| (sql.to_string(), rows), result.as_ref().err());
        result
    }

    /// Round-trip a trivial statement through the pool.
    pub async fn ping(&self) -> std::result::Result<(), sqlx::Error> {
        self.execute("SELECT 1").await.map(|_| ())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Pool options for `limits` that set the session timezone on every new
/// connection. sqlx sends `TimeZone=UTC` in the startup packet, so a startup
/// option can't carry it.
fn session_pool_options(limits: PoolLimits, timezone: &str) -> PgPoolOptions {
    let sql: Arc<str> = Arc::from(set_time_zone_sql(timezone));

    limits.pool_options().after_connect(move |conn, _meta| {
        let sql = Arc::clone(&sql);
        Box::pin(async move {
            sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(&sql)).await?;
            Ok(())
        })
    })
}

fn set_time_zone_sql(timezone: &str) -> String {
    format!("SET TIME ZONE '{}'", timezone.replace('\'', "''"))
}

impl std::ops::Deref for PostgreSql {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}
