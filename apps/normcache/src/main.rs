//! # normcache - Normalized Cache Reader
//!
//! The main binary for the normcache read path.
//!
//! This application provides:
//! - CLI interface for reading and diffing queries against a store
//! - Snapshot import/export for file and redb stores
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          apps/normcache (THE BINARY)        │
//! │                                             │
//! │   ┌─────────────┐     ┌────────────────┐    │
//! │   │    CLI      │     │    Config      │    │
//! │   │   (clap)    │     │    (toml)      │    │
//! │   └──────┬──────┘     └───────┬────────┘    │
//! │          └─────────┬──────────┘             │
//! │                    ▼                        │
//! │           ┌────────────────┐                │
//! │           │ normcache-core │                │
//! │           │  (THE LOGIC)   │                │
//! │           └────────────────┘                │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! normcache import -i snapshot.json
//! normcache read -f query.json --partial
//! normcache diff -f query.json -V variables.json
//! NORMCACHE_LOG_FORMAT=json normcache status
//! ```

use clap::Parser;
use normcache::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    init_tracing(cli.verbose);

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing. NORMCACHE_LOG_FORMAT=json enables machine-parseable output.
///
/// Logs go to stderr so stdout carries only command output.
fn init_tracing(verbose: bool) {
    let log_format = std::env::var("NORMCACHE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if verbose { "normcache=debug" } else { "normcache=info" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Print the normcache startup banner.
fn print_banner() {
    eprintln!(
        r#"
  normcache v{}
  Normalized cache reader: reports missing data, never fetches
"#,
        env!("CARGO_PKG_VERSION")
    );
}
