//! Status command

use std::path::Path;

use anyhow::Result;

use tally_core::ai::ModelGateway;

use super::open_db;

pub fn cmd_status(db: Option<&Path>) -> Result<()> {
    let database = open_db(db)?;

    println!("Database: {}", database.path());
    println!("Settlements: {}", database.count_settlements()?);
    match database.latest_finalized_at()? {
        Some(latest) => println!("Last finalized: {}", latest.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last finalized: never"),
    }

    let gateway = ModelGateway::from_env();
    if gateway.provider_configured() {
        println!("Vision provider: configured");
    } else {
        println!("Vision provider: not configured (scans return the mock result)");
    }
    println!("Model candidates:");
    for candidate in gateway.candidates() {
        println!("  - {}", candidate);
    }

    Ok(())
}
