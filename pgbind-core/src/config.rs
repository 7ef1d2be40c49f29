use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::ConnectOptions;

use crate::error::{Error, Result};

/// Timezone applied at connection time when the config leaves it empty.
pub const DEFAULT_TIMEZONE: &str = "Asia/Jakarta";

/// Pool ceiling used when the maximum is unlimited (`<= 0`).
///
/// sqlx needs a bounded pool and preallocates its idle queue up front, so
/// "unlimited" is a ceiling the server's own `max_connections` will hit first.
pub const UNLIMITED_MAX_CONNECTIONS: u32 = 1024;

/// Connection parameters for a PostgreSQL database.
///
/// ```
/// use pgbind_core::Config;
///
/// let cfg = Config {
///     host: "localhost".into(),
///     port: 5432,
///     user: "user".into(),
///     pass: "password".into(),
///     name: "mydatabase".into(),
///     max_connection_pool: 10,
///     min_connection_pool: 2,
///     timezone: "Asia/Jakarta".into(),
/// };
///
/// assert_eq!(
///     cfg.dsn(),
///     "user=user password=password dbname=mydatabase port=5432 host=localhost sslmode=disable TimeZone=Asia/Jakarta"
/// );
/// assert_eq!(
///     cfg.to_string(),
///     "user=user password=password dbname=mydatabase port=5432 host=localhost min-pool=2 max-pool=10"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub name: String,
    /// Maximum open connections. `<= 0` means unlimited.
    pub max_connection_pool: i32,
    /// Minimum idle connections. `<= 0` keeps no idle connections.
    pub min_connection_pool: i32,
    /// Session timezone. Empty means [`DEFAULT_TIMEZONE`].
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            pass: String::new(),
            name: "postgres".to_string(),
            max_connection_pool: 0,
            min_connection_pool: 0,
            timezone: String::new(),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user={} password={} dbname={} port={} host={} min-pool={} max-pool={}",
            self.user,
            self.pass,
            self.name,
            self.port,
            self.host,
            self.min_connection_pool,
            self.max_connection_pool,
        )
    }
}

impl Config {
    /// Connection string in the libpq keyword/value form.
    pub fn dsn(&self) -> String {
        format!(
            "user={} password={} dbname={} port={} host={} sslmode=disable TimeZone={}",
            self.user, self.pass, self.name, self.port, self.host, self.timezone,
        )
    }

    /// Fill in [`DEFAULT_TIMEZONE`] if no timezone is set.
    pub fn apply_default_timezone(&mut self) {
        if self.timezone.is_empty() {
            self.timezone = DEFAULT_TIMEZONE.to_string();
        }
    }

    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            max: self.max_connection_pool,
            min: self.min_connection_pool,
        }
    }

    /// Driver options carrying the connection values of [`Config::dsn`].
    ///
    /// The statement cache is disabled so every query goes out unprepared,
    /// and sqlx's own statement logging is off since `QueryLogger` covers it.
    ///
    /// The timezone is not part of these options: sqlx always starts the
    /// session with `TimeZone=UTC`, so the pool sets it on each new
    /// connection instead (see [`crate::PostgreSql::connect`]).
    ///
    /// Every field set here overrides its `PG*` environment variable. sqlx
    /// still picks up the ones this config has no field for, like libpq
    /// does: `PGOPTIONS` and `PGAPPNAME`.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.pass)
            .database(&self.name)
            .ssl_mode(PgSslMode::Disable)
            .statement_cache_capacity(0)
            .disable_statement_logging()
    }

    /// Parse a config from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Self::from_toml_str(&content)
    }

    /// Build a config from `DB_*` environment variables.
    ///
    /// Variables: `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASS`, `DB_NAME`,
    /// `DB_MAX_CONNECTION_POOL`, `DB_MIN_CONNECTION_POOL`, `DB_TIMEZONE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(host) = lookup("DB_HOST") {
            cfg.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            cfg.port = parse_var("DB_PORT", &port)?;
        }
        if let Some(user) = lookup("DB_USER") {
            cfg.user = user;
        }
        if let Some(pass) = lookup("DB_PASS") {
            cfg.pass = pass;
        }
        if let Some(name) = lookup("DB_NAME") {
            cfg.name = name;
        }
        if let Some(max) = lookup("DB_MAX_CONNECTION_POOL") {
            cfg.max_connection_pool = parse_var("DB_MAX_CONNECTION_POOL", &max)?;
        }
        if let Some(min) = lookup("DB_MIN_CONNECTION_POOL") {
            cfg.min_connection_pool = parse_var("DB_MIN_CONNECTION_POOL", &min)?;
        }
        if let Some(timezone) = lookup("DB_TIMEZONE") {
            cfg.timezone = timezone;
        }

        Ok(cfg)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| Error::config(format!("{key}={value:?} is not a valid number: {err}")))
}

/// Pool sizes as configured, plus their translation to sqlx.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max: i32,
    pub min: i32,
}

impl PoolLimits {
    pub fn max_connections(&self) -> u32 {
        if self.max <= 0 {
            UNLIMITED_MAX_CONNECTIONS
        } else {
            self.max as u32
        }
    }

    /// Never above [`PoolLimits::max_connections`].
    pub fn min_connections(&self) -> u32 {
        if self.min <= 0 {
            0
        } else {
            (self.min as u32).min(self.max_connections())
        }
    }

    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections())
            .min_connections(self.min_connections())
    }
}
