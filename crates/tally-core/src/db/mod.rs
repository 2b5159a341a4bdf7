//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `sessions` - Session records (ownership, processing scope)
//! - `participants` - Participant directory entries
//! - `settlements` - Settlement snapshot storage and queries

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod participants;
mod sessions;
mod settlements;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a DateTime<Utc> the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a scratch database (for testing)
    ///
    /// Note: uses a temporary file rather than `:memory:` because each pooled
    /// connection would otherwise see its own empty in-memory database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("tally_test_{}_{}.db", std::process::id(), id));
        let path = path.to_string_lossy().to_string();

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Sessions (one receipt-splitting session per scanned bill)
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY,
                creator_id TEXT NOT NULL,
                group_id TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_creator ON sessions(creator_id);

            -- Participant directory (external identities echoed into snapshots)
            CREATE TABLE IF NOT EXISTS participants (
                unique_id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                avatar_url TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Settlement snapshots (at most one live snapshot per session)
            CREATE TABLE IF NOT EXISTS settlements (
                id INTEGER PRIMARY KEY,
                session_id INTEGER NOT NULL UNIQUE REFERENCES sessions(id),
                participants TEXT NOT NULL,            -- JSON array of ParticipantInfo
                allocations TEXT NOT NULL,             -- JSON array of Allocation
                totals TEXT NOT NULL,                  -- JSON SettlementTotals
                grand_total REAL NOT NULL,
                finalized_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_settlements_finalized ON settlements(finalized_at);

            -- Settlement membership (one row per participant, for history queries)
            CREATE TABLE IF NOT EXISTS settlement_members (
                settlement_id INTEGER NOT NULL REFERENCES settlements(id) ON DELETE CASCADE,
                participant_id TEXT NOT NULL,
                amount_owed REAL NOT NULL,
                PRIMARY KEY (settlement_id, participant_id)
            );

            CREATE INDEX IF NOT EXISTS idx_settlement_members_participant
                ON settlement_members(participant_id);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
