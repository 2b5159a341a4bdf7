//! Session record operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::Session;

impl Database {
    /// Create a session owned by the given identity
    pub fn create_session(&self, creator_id: &str, group_id: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (creator_id, group_id) VALUES (?, ?)",
            params![creator_id, group_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a session by id
    pub fn get_session(&self, id: i64) -> Result<Option<Session>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                "SELECT id, creator_id, group_id, created_at FROM sessions WHERE id = ?",
                params![id],
                |row| {
                    let created_at: String = row.get(3)?;
                    Ok(Session {
                        id: row.get(0)?,
                        creator_id: row.get(1)?,
                        group_id: row.get(2)?,
                        created_at: parse_datetime(&created_at),
                    })
                },
            )
            .optional()?;

        Ok(session)
    }
}
