//! # pal CLI entry point
//!
//! Parses command-line arguments, initializes logging, and dispatches to
//! the subcommand handlers in `pal_cli::commands`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pal_cli::commands::Command;
use pal_cli::{run, RunOptions};

/// Product Authenticity Ledger
///
/// Anchors tamper-evident product fingerprints on an access-controlled
/// ledger, keeps descriptive records in a metadata store, and verifies that
/// the two still agree.
#[derive(Parser, Debug)]
#[command(name = "pal", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the engine configuration file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the ledger snapshot and file-backed store.
    #[arg(long, global = true, default_value = ".pal")]
    state_dir: PathBuf,

    /// Identity the command runs as.
    #[arg(long = "as", global = true, env = "PAL_IDENTITY")]
    identity: Option<String>,

    /// PostgreSQL URL for the metadata store.
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("pal CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let opts = RunOptions {
        state_dir: cli.state_dir,
        config: cli.config,
        identity: cli.identity,
        database_url: cli.database_url,
        json: cli.json,
    };

    match run(&opts, &cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
