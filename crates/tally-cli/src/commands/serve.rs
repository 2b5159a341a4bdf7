//! Serve command

use std::path::Path;

use anyhow::Result;
use tracing::info;

use tally_server::ServerConfig;

use super::open_db;

pub async fn cmd_serve(db: Option<&Path>, host: &str, port: u16, no_auth: bool) -> Result<()> {
    let database = open_db(db)?;
    info!("Using database at {}", database.path());

    let api_keys = std::env::var("TALLY_API_KEYS")
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let config = ServerConfig {
        require_auth: !no_auth,
        allowed_origins: std::env::var("TALLY_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        api_keys,
    };

    tally_server::serve(database, host, port, config).await
}
