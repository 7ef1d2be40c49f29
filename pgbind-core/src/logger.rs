//! Query logger for statements run through [`crate::PostgreSql`].
//!
//! [`DbLogger`] renders one line per event, picks plain or ANSI-colored
//! formats once at construction, and hands each line to a [`Writer`].
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use pgbind_core::logger::{DbLogger, LogLevel, LoggerConfig, QueryLogger};
//!
//! let sink = Arc::new(Mutex::new(Vec::<u8>::new()));
//! let logger = DbLogger::new(
//!     sink.clone(),
//!     LoggerConfig {
//!         colorful: false,
//!         log_level: LogLevel::Info,
//!         ..LoggerConfig::default()
//!     },
//! );
//!
//! logger.info(format_args!("pool ready with {} connections", 4));
//! let out = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
//! assert_eq!(out, "[info] pool ready with 4 connections\n");
//! ```

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Severity gate. Variants are ordered from quietest to noisiest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    Info,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Silent => "silent",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            other => Err(format!(
                "unknown log level '{other}' (expected silent, error, warn or info)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Statements slower than this are reported at warn level. Zero disables.
    pub slow_threshold: Duration,
    pub colorful: bool,
    /// Skip the error line for `sqlx::Error::RowNotFound`.
    pub ignore_record_not_found_error: bool,
    pub log_level: LogLevel,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_millis(200),
            colorful: true,
            ignore_record_not_found_error: false,
            log_level: LogLevel::Warn,
        }
    }
}

/// Line sink for rendered log output.
pub trait Writer: Send + Sync {
    fn write_line(&self, line: &str);
}

impl<W: io::Write + Send> Writer for Mutex<W> {
    fn write_line(&self, line: &str) {
        if let Ok(mut out) = self.lock() {
            let _ = writeln!(out, "{line}");
        }
    }
}

/// Forwards each line to `tracing` under the `pgbind::sql` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingWriter;

impl Writer for TracingWriter {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "pgbind::sql", "{line}");
    }
}

/// Writer over the process's stdout.
pub fn stdout_writer() -> Arc<dyn Writer> {
    Arc::new(Mutex::new(io::stdout()))
}

/// Logging contract the connection wrapper calls into.
pub trait QueryLogger: Send + Sync + fmt::Debug {
    /// A copy of this logger gated at `level`. `self` is left as is.
    fn log_mode(&self, level: LogLevel) -> Arc<dyn QueryLogger>;

    fn info(&self, args: fmt::Arguments<'_>);

    fn warn(&self, args: fmt::Arguments<'_>);

    fn error(&self, args: fmt::Arguments<'_>);

    /// Report a finished statement.
    ///
    /// `statement` yields the SQL text and the row count (`None` when
    /// unknown). It is only called when a line is actually written.
    fn trace(
        &self,
        begin: Instant,
        statement: &dyn Fn() -> (String, Option<u64>),
        err: Option<&sqlx::Error>,
    );
}

/// ANSI fragments surrounding each field. Empty in plain mode.
#[derive(Debug, Clone, Copy)]
struct Formats {
    info: (&'static str, &'static str),
    warn: (&'static str, &'static str),
    error: (&'static str, &'static str),
    trace: [&'static str; 3],
    trace_warn: [&'static str; 5],
    trace_err: [&'static str; 4],
}

const RESET: &str = "\x1b[0m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const BLUE_BOLD: &str = "\x1b[34;1m";
const MAGENTA_BOLD: &str = "\x1b[35;1m";

const COLORFUL: Formats = Formats {
    info: ("\x1b[0m\x1b[32m", RESET),
    warn: ("\x1b[0m\x1b[35m", RESET),
    error: ("\x1b[0m\x1b[31m", RESET),
    trace: [YELLOW, BLUE_BOLD, RESET],
    trace_warn: [YELLOW, "\x1b[0m\x1b[31;1m", YELLOW, MAGENTA, RESET],
    trace_err: [MAGENTA_BOLD, "\x1b[0m\x1b[33m", BLUE_BOLD, RESET],
};

const PLAIN: Formats = Formats {
    info: ("", ""),
    warn: ("", ""),
    error: ("", ""),
    trace: [""; 3],
    trace_warn: [""; 5],
    trace_err: [""; 4],
};

impl Formats {
    fn info(&self, msg: &str) -> String {
        format!("{}[info] {msg}{}", self.info.0, self.info.1)
    }

    fn warn(&self, msg: &str) -> String {
        format!("{}[warn] {msg}{}", self.warn.0, self.warn.1)
    }

    fn error(&self, msg: &str) -> String {
        format!("{}[error] {msg}{}", self.error.0, self.error.1)
    }

    fn trace(&self, ms: f64, rows: &str, sql: &str) -> String {
        let [a, b, c] = self.trace;
        format!("{a}[{ms:.3}ms] {b}[rows:{rows}]{c} {sql}")
    }

    fn trace_warn(&self, slow: &str, ms: f64, rows: &str, sql: &str) -> String {
        let [a, b, c, d, e] = self.trace_warn;
        format!("{a}{slow} {b}[{ms:.3}ms] {c}[rows:{rows}]{d} {sql}{e}")
    }

    fn trace_err(&self, err: &str, ms: f64, rows: &str, sql: &str) -> String {
        let [a, b, c, d] = self.trace_err;
        format!("{a}{err} {b}[{ms:.3}ms] {c}[rows:{rows}]{d} {sql}")
    }
}

/// Level-gated, optionally colorized [`QueryLogger`].
#[derive(Clone)]
pub struct DbLogger {
    writer: Arc<dyn Writer>,
    config: LoggerConfig,
    formats: Formats,
}

impl fmt::Debug for DbLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DbLogger {
    pub fn new(writer: Arc<dyn Writer>, config: LoggerConfig) -> Self {
        let formats = if config.colorful { COLORFUL } else { PLAIN };
        Self {
            writer,
            config,
            formats,
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn level(&self) -> LogLevel {
        self.config.log_level
    }

    /// [`QueryLogger::trace`] with the elapsed time already measured.
    pub fn trace_elapsed(
        &self,
        elapsed: Duration,
        statement: &dyn Fn() -> (String, Option<u64>),
        err: Option<&sqlx::Error>,
    ) {
        let level = self.config.log_level;
        if level <= LogLevel::Silent {
            return;
        }

        let threshold = self.config.slow_threshold;
        let ms = elapsed.as_nanos() as f64 / 1e6;
        let err = err.filter(|err| {
            !(self.config.ignore_record_not_found_error
                && matches!(err, sqlx::Error::RowNotFound))
        });

        let line = match err {
            Some(err) if level >= LogLevel::Error => {
                let (sql, rows) = statement();
                self.formats
                    .trace_err(&err.to_string(), ms, &rows_label(rows), &sql)
            }
            _ if !threshold.is_zero() && elapsed > threshold && level >= LogLevel::Warn => {
                let (sql, rows) = statement();
                let slow = format!("SLOW SQL >= {threshold:?}");
                self.formats.trace_warn(&slow, ms, &rows_label(rows), &sql)
            }
            _ if level == LogLevel::Info => {
                let (sql, rows) = statement();
                self.formats.trace(ms, &rows_label(rows), &sql)
            }
            _ => return,
        };

        self.writer.write_line(&line);
    }
}

/// Row count for a trace line. An unknown count prints `-` where the
/// GORM logger adapter printed `-1`.
fn rows_label(rows: Option<u64>) -> String {
    rows.map_or_else(|| "-".to_string(), |rows| rows.to_string())
}

impl QueryLogger for DbLogger {
    fn log_mode(&self, level: LogLevel) -> Arc<dyn QueryLogger> {
        let mut logger = self.clone();
        logger.config.log_level = level;
        Arc::new(logger)
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        if self.config.log_level >= LogLevel::Info {
            self.writer.write_line(&self.formats.info(&args.to_string()));
        }
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        if self.config.log_level >= LogLevel::Warn {
            self.writer.write_line(&self.formats.warn(&args.to_string()));
        }
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        if self.config.log_level >= LogLevel::Error {
            self.writer
                .write_line(&self.formats.error(&args.to_string()));
        }
    }

    fn trace(
        &self,
        begin: Instant,
        statement: &dyn Fn() -> (String, Option<u64>),
        err: Option<&sqlx::Error>,
    ) {
        self.trace_elapsed(begin.elapsed(), statement, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    type Sink = Arc<Mutex<Vec<u8>>>;

    fn capture(level: LogLevel, colorful: bool) -> (DbLogger, Sink) {
        let sink: Sink = Arc::new(Mutex::new(Vec::new()));
        let logger = DbLogger::new(
            sink.clone(),
            LoggerConfig {
                slow_threshold: Duration::from_millis(200),
                colorful,
                ignore_record_not_found_error: false,
                log_level: level,
            },
        );
        (logger, sink)
    }

    fn lines(sink: &Sink) -> Vec<String> {
        let bytes = sink.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn select() -> (String, Option<u64>) {
        ("SELECT * FROM users".to_string(), Some(3))
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Silent < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::Silent.to_string(), "silent");
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_plain_message_formats() {
        let (logger, sink) = capture(LogLevel::Info, false);
        logger.info(format_args!("hello {}", "world"));
        logger.warn(format_args!("careful"));
        logger.error(format_args!("broken: {}", 42));

        assert_eq!(
            lines(&sink),
            vec!["[info] hello world", "[warn] careful", "[error] broken: 42"]
        );
    }

    #[test]
    fn test_colorful_message_formats() {
        let (logger, sink) = capture(LogLevel::Info, true);
        logger.info(format_args!("up"));
        logger.warn(format_args!("slow"));
        logger.error(format_args!("down"));

        assert_eq!(
            lines(&sink),
            vec![
                "\x1b[0m\x1b[32m[info] up\x1b[0m",
                "\x1b[0m\x1b[35m[warn] slow\x1b[0m",
                "\x1b[0m\x1b[31m[error] down\x1b[0m",
            ]
        );
    }

    #[test]
    fn test_message_level_gates() {
        let (logger, sink) = capture(LogLevel::Warn, false);
        logger.info(format_args!("dropped"));
        logger.warn(format_args!("kept"));
        logger.error(format_args!("kept too"));
        assert_eq!(lines(&sink), vec!["[warn] kept", "[error] kept too"]);

        let (logger, sink) = capture(LogLevel::Silent, false);
        logger.error(format_args!("dropped"));
        assert!(lines(&sink).is_empty());
    }

    #[test]
    fn test_trace_default_branch() {
        let (logger, sink) = capture(LogLevel::Info, false);
        logger.trace_elapsed(Duration::from_micros(1500), &select, None);
        assert_eq!(lines(&sink), vec!["[1.500ms] [rows:3] SELECT * FROM users"]);
    }

    #[test]
    fn test_trace_default_branch_colorful() {
        let (logger, sink) = capture(LogLevel::Info, true);
        logger.trace_elapsed(Duration::from_millis(2), &select, None);
        assert_eq!(
            lines(&sink),
            vec!["\x1b[33m[2.000ms] \x1b[34;1m[rows:3]\x1b[0m SELECT * FROM users"]
        );
    }

    #[test]
    fn test_trace_slow_branch() {
        let (logger, sink) = capture(LogLevel::Warn, false);
        logger.trace_elapsed(Duration::from_millis(250), &select, None);
        assert_eq!(
            lines(&sink),
            vec!["SLOW SQL >= 200ms [250.000ms] [rows:3] SELECT * FROM users"]
        );
    }

    #[test]
    fn test_trace_slow_branch_colorful() {
        let (logger, sink) = capture(LogLevel::Info, true);
        logger.trace_elapsed(Duration::from_millis(300), &select, None);
        assert_eq!(
            lines(&sink),
            vec![
                "\x1b[33mSLOW SQL >= 200ms \x1b[0m\x1b[31;1m[300.000ms] \x1b[33m[rows:3]\x1b[35m SELECT * FROM users\x1b[0m"
            ]
        );
    }

    #[test]
    fn test_trace_error_overrides_slow() {
        let (logger, sink) = capture(LogLevel::Info, false);
        let err = sqlx::Error::PoolTimedOut;
        logger.trace_elapsed(
            Duration::from_millis(900),
            &|| ("UPDATE users SET active = true".to_string(), None),
            Some(&err),
        );
        assert_eq!(
            lines(&sink),
            vec![format!(
                "{err} [900.000ms] [rows:-] UPDATE users SET active = true"
            )]
        );
    }

    #[test]
    fn test_trace_error_colorful() {
        let (logger, sink) = capture(LogLevel::Error, true);
        let err = sqlx::Error::PoolClosed;
        logger.trace_elapsed(Duration::from_millis(1), &select, Some(&err));
        assert_eq!(
            lines(&sink),
            vec![format!(
                "\x1b[35;1m{err} \x1b[0m\x1b[33m[1.000ms] \x1b[34;1m[rows:3]\x1b[0m SELECT * FROM users"
            )]
        );
    }

    #[test]
    fn test_trace_zero_threshold_never_slow() {
        let sink: Sink = Arc::new(Mutex::new(Vec::new()));
        let logger = DbLogger::new(
            sink.clone(),
            LoggerConfig {
                slow_threshold: Duration::ZERO,
                colorful: false,
                ignore_record_not_found_error: false,
                log_level: LogLevel::Warn,
            },
        );
        logger.trace_elapsed(Duration::from_secs(10), &select, None);
        assert!(lines(&sink).is_empty());
    }

    #[test]
    fn test_trace_fast_query_below_info_is_quiet() {
        let (logger, sink) = capture(LogLevel::Warn, false);
        let calls = Cell::new(0);
        logger.trace_elapsed(
            Duration::from_millis(5),
            &|| {
                calls.set(calls.get() + 1);
                select()
            },
            None,
        );
        assert!(lines(&sink).is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_trace_silent_ignores_errors() {
        let (logger, sink) = capture(LogLevel::Silent, false);
        let err = sqlx::Error::PoolClosed;
        logger.trace_elapsed(Duration::from_secs(1), &select, Some(&err));
        assert!(lines(&sink).is_empty());
    }

    #[test]
    fn test_trace_ignores_row_not_found_when_configured() {
        let sink: Sink = Arc::new(Mutex::new(Vec::new()));
        let logger = DbLogger::new(
            sink.clone(),
            LoggerConfig {
                slow_threshold: Duration::from_millis(200),
                colorful: false,
                ignore_record_not_found_error: true,
                log_level: LogLevel::Info,
            },
        );
        let err = sqlx::Error::RowNotFound;
        logger.trace_elapsed(
            Duration::from_millis(1),
            &|| ("SELECT 1 WHERE false".to_string(), Some(0)),
            Some(&err),
        );
        assert_eq!(lines(&sink), vec!["[1.000ms] [rows:0] SELECT 1 WHERE false"]);
    }

    #[test]
    fn test_log_mode_returns_new_instance() {
        let (logger, sink) = capture(LogLevel::Warn, false);
        let verbose = logger.log_mode(LogLevel::Info);

        verbose.info(format_args!("from copy"));
        logger.info(format_args!("from original"));

        assert_eq!(logger.level(), LogLevel::Warn);
        assert_eq!(lines(&sink), vec!["[info] from copy"]);
    }
}
