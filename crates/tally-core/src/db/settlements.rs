//! Settlement snapshot operations
//!
//! One row per session holds the participants, allocations, and totals as
//! JSON payloads; `settlement_members` rows carry per-participant owed
//! amounts for membership queries. Finalize is correctable: writing a
//! snapshot for a session that already has one replaces it.

use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{ParticipantSettlement, SettlementSnapshot};

impl Database {
    /// Create-or-replace the snapshot for a session
    ///
    /// The snapshot row and its membership rows are written in a single
    /// transaction, so a crash mid-write never leaves partial state and
    /// readers only ever see a complete snapshot.
    pub fn upsert_settlement(&self, snapshot: &SettlementSnapshot) -> Result<()> {
        let participants = serde_json::to_string(&snapshot.participants)?;
        let allocations = serde_json::to_string(&snapshot.allocations)?;
        let totals = serde_json::to_string(&snapshot.totals)?;
        let finalized_at = format_datetime(&snapshot.finalized_at);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO settlements
                 (session_id, participants, allocations, totals, grand_total, finalized_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                 participants = excluded.participants,
                 allocations = excluded.allocations,
                 totals = excluded.totals,
                 grand_total = excluded.grand_total,
                 finalized_at = excluded.finalized_at",
            params![
                snapshot.session_id,
                participants,
                allocations,
                totals,
                snapshot.totals.grand_total,
                finalized_at,
            ],
        )?;

        let settlement_id: i64 = tx.query_row(
            "SELECT id FROM settlements WHERE session_id = ?",
            params![snapshot.session_id],
            |row| row.get(0),
        )?;

        // Membership rows are rebuilt wholesale; on re-finalize the roster
        // may have changed
        tx.execute(
            "DELETE FROM settlement_members WHERE settlement_id = ?",
            params![settlement_id],
        )?;
        for entry in &snapshot.totals.by_participant {
            tx.execute(
                "INSERT INTO settlement_members (settlement_id, participant_id, amount_owed)
                 VALUES (?, ?, ?)",
                params![settlement_id, entry.participant_id, entry.amount_owed],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Get the snapshot for a session
    pub fn get_settlement(&self, session_id: i64) -> Result<Option<SettlementSnapshot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, participants, allocations, totals, finalized_at
             FROM settlements WHERE session_id = ?",
        )?;

        let row = stmt
            .query_row(params![session_id], row_to_snapshot)
            .optional()?;

        match row {
            Some(raw) => Ok(Some(raw.into_snapshot()?)),
            None => Ok(None),
        }
    }

    /// Settlements a participant is part of, newest first
    ///
    /// Each entry carries the participant's own owed amount from the
    /// membership rows. `limit` of `None` returns everything.
    pub fn settlements_for_participant(
        &self,
        unique_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ParticipantSettlement>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.session_id, s.participants, s.allocations, s.totals, s.finalized_at,
                    m.amount_owed
             FROM settlements s
             JOIN settlement_members m ON m.settlement_id = s.id
             WHERE m.participant_id = ?
             ORDER BY s.finalized_at DESC, s.id DESC
             LIMIT ?",
        )?;

        let rows = stmt
            .query_map(params![unique_id, limit.unwrap_or(-1)], |row| {
                let raw = row_to_snapshot(row)?;
                let amount_owed: f64 = row.get(5)?;
                Ok((raw, amount_owed))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(raw, amount_owed)| {
                Ok(ParticipantSettlement {
                    amount_owed,
                    snapshot: raw.into_snapshot()?,
                })
            })
            .collect()
    }

    /// Number of stored settlements
    pub fn count_settlements(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM settlements", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Most recent finalization time, if any settlement exists
    pub fn latest_finalized_at(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let conn = self.conn()?;
        let latest: Option<String> = conn
            .query_row(
                "SELECT finalized_at FROM settlements ORDER BY finalized_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(latest.map(|s| parse_datetime(&s)))
    }
}

/// Snapshot columns before JSON payload decoding
struct RawSnapshotRow {
    session_id: i64,
    participants: String,
    allocations: String,
    totals: String,
    finalized_at: String,
}

impl RawSnapshotRow {
    fn into_snapshot(self) -> Result<SettlementSnapshot> {
        Ok(SettlementSnapshot {
            session_id: self.session_id,
            participants: serde_json::from_str(&self.participants)
                .map_err(|e| Error::Persistence(format!("corrupt participants payload: {}", e)))?,
            allocations: serde_json::from_str(&self.allocations)
                .map_err(|e| Error::Persistence(format!("corrupt allocations payload: {}", e)))?,
            totals: serde_json::from_str(&self.totals)
                .map_err(|e| Error::Persistence(format!("corrupt totals payload: {}", e)))?,
            finalized_at: parse_datetime(&self.finalized_at),
        })
    }
}

fn row_to_snapshot(row: &Row) -> rusqlite::Result<RawSnapshotRow> {
    Ok(RawSnapshotRow {
        session_id: row.get(0)?,
        participants: row.get(1)?,
        allocations: row.get(2)?,
        totals: row.get(3)?,
        finalized_at: row.get(4)?,
    })
}
