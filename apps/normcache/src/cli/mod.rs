//! # normcache CLI Module
//!
//! This module implements the CLI interface for normcache.
//!
//! ## Available Commands
//!
//! - `read` - Resolve a query against the store (strict by default)
//! - `diff` - Resolve a query, reporting whether data was missing
//! - `status` - Show store status
//! - `import` - Load a snapshot into the store
//! - `export` - Write the store to a snapshot file
//! - `init` - Initialize a new empty store

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand, ValueEnum};
use normcache_core::CacheError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// normcache - normalized cache reader
///
/// Reconstructs query results from a normalized entity store and reports
/// which requested data is missing. Never fetches.
#[derive(Parser, Debug)]
#[command(name = "normcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the store (snapshot file or redb database)
    #[arg(short = 'D', long, global = true, default_value = "normcache.db")]
    pub database: PathBuf,

    /// Storage backend
    #[arg(short = 'B', long, global = true, value_enum, default_value_t = Backend::Redb)]
    pub backend: Backend,

    /// Path to a TOML config file (default: ./normcache.toml if present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where the store lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Snapshot file (JSON or binary), loaded into memory
    File,
    /// redb database, read record by record
    Redb,
}

impl Backend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Redb => "redb",
        }
    }
}

/// Snapshot encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SnapshotFormat {
    /// `{ id: record }` JSON object
    Json,
    /// Header + postcard payload
    Binary,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a query, failing on the first missing field unless --partial
    Read {
        /// Query document (JSON)
        #[arg(short = 'f', long)]
        query: PathBuf,

        /// Variables (JSON object)
        #[arg(short = 'V', long)]
        variables: Option<PathBuf>,

        /// Omit missing fields instead of failing
        #[arg(short, long)]
        partial: bool,

        /// Object to start from (default: ROOT_QUERY)
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Resolve a query, returning the partial result and a missing flag
    Diff {
        /// Query document (JSON)
        #[arg(short = 'f', long)]
        query: PathBuf,

        /// Variables (JSON object)
        #[arg(short = 'V', long)]
        variables: Option<PathBuf>,

        /// Fail on the first missing field
        #[arg(short, long)]
        strict: bool,

        /// Object to start from (default: ROOT_QUERY)
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Show store status
    Status,

    /// Replace the store contents with a snapshot (JSON or binary)
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write the store to a snapshot file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Snapshot format
        #[arg(short = 't', long, value_enum, default_value_t = SnapshotFormat::Json)]
        format: SnapshotFormat,
    },

    /// Initialize a new empty store
    Init {
        /// Force initialization even if the store exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), CacheError> {
    let backend = cli.backend;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Read {
            query,
            variables,
            partial,
            root,
        }) => {
            let config = Config::load(cli.config.as_deref())?;
            let options = config.read_options(partial.then_some(true), root);
            cmd_read(&cli.database, backend, &query, variables.as_deref(), &options)
        }
        Some(Commands::Diff {
            query,
            variables,
            strict,
            root,
        }) => {
            let config = Config::load(cli.config.as_deref())?;
            let options = config.read_options(strict.then_some(false), root);
            cmd_diff(&cli.database, backend, &query, variables.as_deref(), &options)
        }
        Some(Commands::Status) => cmd_status(&cli.database, backend, json_mode),
        Some(Commands::Import { input }) => cmd_import(&cli.database, backend, &input, json_mode),
        Some(Commands::Export { output, format }) => {
            cmd_export(&cli.database, backend, &output, format, json_mode)
        }
        Some(Commands::Init { force }) => cmd_init(&cli.database, backend, force),
        None => {
            // No subcommand - show status by default
            cmd_status(&cli.database, backend, json_mode)
        }
    }
}
