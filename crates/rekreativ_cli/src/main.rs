//! Rekreativ CLI
//!
//! Command-line tools for a Rekreativ store directory.
//!
//! # Commands
//!
//! - `init` - Create or upgrade a store and seed baseline data
//! - `inspect` - Show schema version and per-collection counts
//! - `export` / `import` - JSON snapshots
//! - `counter` - Record a counter reading
//! - `history` - Show counter history
//! - `backup` - Create, list and restore in-store backups

mod commands;

use clap::{Parser, Subcommand};
use commands::{CliError, CliResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Rekreativ store tools.
#[derive(Parser)]
#[command(name = "rekreativ")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
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
    /// Create or upgrade a store and seed missing baseline data
    Init,

    /// Show schema version and collection details
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Export every collection except backups to a JSON file
    Export {
        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import a JSON snapshot, replacing the collections it names
    Import {
        /// Snapshot file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Record a counter reading for a machine
    Counter {
        /// Machine id
        #[arg(short, long)]
        machine: String,

        /// Counter value read off the machine
        #[arg(long)]
        value: u64,

        /// Where the reading came from
        #[arg(short, long, default_value = "manual")]
        source: String,

        /// Free-text notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Show counter history, newest first
    History {
        /// Only this machine
        #[arg(short, long)]
        machine: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Manage in-store backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum BackupAction {
    /// Snapshot the current contents
    Create,
    /// List stored backups
    List,
    /// Restore a backup by id
    Restore {
        /// Backup id
        id: String,
    },
}

fn require_path<'a>(path: Option<&'a Path>, command: &'static str) -> CliResult<&'a Path> {
    path.ok_or(CliError::MissingPath { command })
}

fn run(cli: Cli) -> CliResult<()> {
    let path = cli.path.as_deref();
    match cli.command {
        Commands::Init => commands::init::run(require_path(path, "init")?)?,
        Commands::Inspect { format } => {
            commands::inspect::run(require_path(path, "inspect")?, &format)?;
        }
        Commands::Export { output } => {
            commands::snapshot::export(require_path(path, "export")?, &output)?;
        }
        Commands::Import { input } => {
            commands::snapshot::import(require_path(path, "import")?, &input)?;
        }
        Commands::Counter {
            machine,
            value,
            source,
            notes,
        } => {
            commands::counter::record(
                require_path(path, "counter")?,
                &machine,
                value,
                &source,
                notes.as_deref(),
            )?;
        }
        Commands::History { machine, format } => {
            commands::counter::history(
                require_path(path, "history")?,
                machine.as_deref(),
                &format,
            )?;
        }
        Commands::Backup { action } => {
            let path = require_path(path, "backup")?;
            match action {
                BackupAction::Create => commands::backup::create(path)?,
                BackupAction::List => commands::backup::list(path)?,
                BackupAction::Restore { id } => commands::backup::restore(path, &id)?,
            }
        }
        Commands::Version => {
            println!("Rekreativ CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Schema version {}", rekreativ_core::CURRENT_VERSION);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
