//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Split photographed receipts into exact per-person debts
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Receipt scanning and bill splitting service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a
        /// network. By default, the server requires identity headers from an
        /// auth proxy or a configured API key.
        #[arg(long)]
        no_auth: bool,
    },

    /// Parse a receipt image into line items
    Scan {
        /// Path to the receipt image (jpeg, png, webp)
        image: PathBuf,

        /// Receipt language hint forwarded to the model (e.g. "de")
        #[arg(long)]
        lang: Option<String>,

        /// Print the full parse result as JSON
        #[arg(long)]
        json: bool,

        /// Fail instead of degrading to the mock result when the provider
        /// is unavailable
        #[arg(long)]
        no_fallback: bool,
    },

    /// Show database and gateway status
    Status,
}
