//! gymlog CLI
//!
//! Command-line tools for looking into a device's local replica.
//!
//! # Commands
//!
//! - `inspect` - Display the version register, row counts and engine counters
//! - `staged` - List changes waiting for upload
//! - `dump` - Print the rows of one entity table as JSON
//! - `checkpoint` - Compact the journal

mod commands;

use clap::{Parser, Subcommand};
use gymlog_replica::LocalStore;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// gymlog replica tools.
#[derive(Parser)]
#[command(name = "gymlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the replica directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the version register, row counts and engine counters
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List changes waiting for upload
    Staged,

    /// Print the rows of one entity table as JSON
    Dump {
        /// Table name, e.g. `workout` or `staged_exercise`
        #[arg(short, long)]
        table: String,
    },

    /// Compact the journal to the live rows
    Checkpoint,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Inspect { format } => {
            let store = open(cli.path.as_deref(), "inspect")?;
            commands::inspect::run(&store, &format, &mut out)?;
        }
        Commands::Staged => {
            let store = open(cli.path.as_deref(), "staged")?;
            commands::staged::run(&store, &mut out)?;
        }
        Commands::Dump { table } => {
            let store = open(cli.path.as_deref(), "dump")?;
            commands::dump::run(&store, &table, &mut out)?;
        }
        Commands::Checkpoint => {
            let store = open(cli.path.as_deref(), "checkpoint")?;
            commands::checkpoint::run(&store, &mut out)?;
        }
        Commands::Version => {
            println!("gymlog CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Opens an existing replica; never creates one.
fn open(path: Option<&Path>, command: &str) -> Result<LocalStore, Box<dyn std::error::Error>> {
    let path = path.ok_or_else(|| format!("Replica path required for {command}"))?;
    if !path.is_dir() {
        return Err(format!("No replica found at {}", path.display()).into());
    }
    Ok(LocalStore::open(path)?)
}
