//! Metastore CLI
//!
//! Command-line tools for Metastore database files.
//!
//! # Commands
//!
//! - `inspect` - List buckets and key counts
//! - `backup` - Write a consistent snapshot to another file
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Metastore command-line database tools.
#[derive(Parser)]
#[command(name = "metastore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file
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
    /// List buckets and key counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Write a consistent snapshot of the database to a file
    Backup {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite the output file if it exists
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Backup { output, force } => {
            let path = cli.path.ok_or("Database path required for backup")?;
            commands::backup::run(&path, &output, force)?;
        }
        Commands::Version => {
            println!("Metastore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Metastore Core v{}", metastore_core::VERSION);
        }
    }

    Ok(())
}
