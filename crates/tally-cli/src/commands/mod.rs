//! Command implementations

mod scan;
mod serve;
mod status;

pub use scan::cmd_scan;
pub use serve::cmd_serve;
pub use status::cmd_status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_core::db::Database;

/// Resolve the database path: explicit flag, or the platform data directory
pub fn resolve_db_path(db: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = db {
        return Ok(path.to_path_buf());
    }

    let data_dir = dirs::data_dir()
        .context("Could not determine data directory; pass --db explicitly")?
        .join("tally");
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    Ok(data_dir.join("tally.db"))
}

/// Open the database at the resolved path
pub fn open_db(db: Option<&Path>) -> Result<Database> {
    let path = resolve_db_path(db)?;
    let path_str = path.to_string_lossy();
    Database::new(&path_str).with_context(|| format!("Failed to open database at {}", path_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_db_path_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let explicit = tmp.path().join("custom.db");
        let resolved = resolve_db_path(Some(&explicit)).unwrap();
        assert_eq!(resolved, explicit);
    }

    #[test]
    fn test_open_db_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.db");
        let db = open_db(Some(&path)).unwrap();
        assert_eq!(db.count_settlements().unwrap(), 0);
        assert!(path.exists());
    }
}
