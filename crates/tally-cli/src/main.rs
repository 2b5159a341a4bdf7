//! Tally CLI - receipt scanning and bill splitting
//!
//! Usage:
//!   tally serve --port 3000   Start the web server
//!   tally scan receipt.jpg    Parse a receipt image
//!   tally status              Show database and gateway status

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(cli.db.as_deref(), &host, port, no_auth).await,
        Commands::Scan {
            image,
            lang,
            json,
            no_fallback,
        } => commands::cmd_scan(&image, lang.as_deref(), json, no_fallback).await,
        Commands::Status => commands::cmd_status(cli.db.as_deref()),
    }
}
