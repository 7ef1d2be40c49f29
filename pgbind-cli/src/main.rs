//! pgbind CLI - PostgreSQL connection config inspection and smoke testing
//!
//! - `dsn` / `show`: render a config as a connection string or summary
//! - `check`: offline validation (timezone, pool sizes)
//! - `ping` / `exec`: open a pool and run statements with query logging

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info_span, Instrument};

mod commands;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "pgbind",
    author,
    version,
    about = "Inspect, check and ping PostgreSQL connection configs",
    long_about = "Build PostgreSQL connection strings from a TOML file or DB_* environment \
                  variables, validate them, and open a pooled connection with query logging."
)]
struct Cli {
    /// TOML config file (defaults to DB_* environment variables and ./.env)
    #[arg(long, short = 'c', global = true, env = "PGBIND_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the connection string
    Dsn,
    /// Print the config summary with pool sizes
    Show,
    /// Validate the config without connecting
    Check,
    /// Connect and run `SELECT 1`
    Ping(commands::db::PingArgs),
    /// Connect and execute a statement
    Exec(commands::db::ExecArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Dsn => "dsn",
            Commands::Show => "show",
            Commands::Check => "check",
            Commands::Ping(_) => "ping",
            Commands::Exec(_) => "exec",
            Commands::Completions(_) => "completions",
        }
    }
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _telemetry = tracing_setup::init(cli.debug, cli.otel).unwrap_or_else(|err| {
        eprintln!("pgbind: logging disabled: {err:#}");
        tracing_setup::TelemetryGuard::default()
    });

    let span = info_span!("pgbind", command = cli.command.name());
    run(cli).instrument(span).await
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Dsn => commands::inspect::run_dsn(config_path),
        Commands::Show => commands::inspect::run_show(config_path),
        Commands::Check => commands::check::run_check(config_path),
        Commands::Ping(args) => commands::db::run_ping(config_path, args).await,
        Commands::Exec(args) => commands::db::run_exec(config_path, args).await,
        Commands::Completions(args) => run_completions(args),
    }
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());
    Ok(())
}
