//! Participant directory operations

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::ParticipantInfo;

impl Database {
    /// Register or update a directory entry
    pub fn register_participant(&self, info: &ParticipantInfo) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO participants (unique_id, username, avatar_url) VALUES (?, ?, ?)
             ON CONFLICT(unique_id) DO UPDATE SET
                 username = excluded.username,
                 avatar_url = excluded.avatar_url",
            params![info.unique_id, info.username, info.avatar_url],
        )?;
        Ok(())
    }

    /// Look up one directory entry
    pub fn get_participant(&self, unique_id: &str) -> Result<Option<ParticipantInfo>> {
        let conn = self.conn()?;
        let participant = conn
            .query_row(
                "SELECT unique_id, username, avatar_url FROM participants WHERE unique_id = ?",
                params![unique_id],
                |row| {
                    Ok(ParticipantInfo {
                        unique_id: row.get(0)?,
                        username: row.get(1)?,
                        avatar_url: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let db = Database::in_memory().unwrap();

        db.register_participant(&ParticipantInfo {
            unique_id: "alice".into(),
            username: "Alice".into(),
            avatar_url: Some("https://cdn.example/alice.png".into()),
        })
        .unwrap();

        let alice = db.get_participant("alice").unwrap().unwrap();
        assert_eq!(alice.username, "Alice");
        assert!(db.get_participant("nobody").unwrap().is_none());
    }

    #[test]
    fn test_register_is_upsert() {
        let db = Database::in_memory().unwrap();

        let mut info = ParticipantInfo {
            unique_id: "alice".into(),
            username: "Alice".into(),
            avatar_url: None,
        };
        db.register_participant(&info).unwrap();

        info.username = "Alice B.".into();
        db.register_participant(&info).unwrap();

        let alice = db.get_participant("alice").unwrap().unwrap();
        assert_eq!(alice.username, "Alice B.");
    }
}
