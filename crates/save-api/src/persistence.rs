use std::fmt;
use std::path::Path;

use contracts::{LoadReport, TurnReport};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSummary {
    pub slot_id: String,
    pub save_name: String,
    pub updated_at: String,
}

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    NotAttached,
    SlotNotFound(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::NotAttached => write!(f, "sqlite store is not attached"),
            Self::SlotNotFound(slot) => write!(f, "no save stored under slot '{slot}'"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Slot-keyed store for canonical documents plus the audit trail of how
/// each one got that way: load reports and per-turn command outcomes.
#[derive(Debug)]
pub struct SqliteSaveStore {
    conn: Connection,
}

impl SqliteSaveStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    /// Private in-memory database; used by tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn persist_document(
        &mut self,
        slot_id: &str,
        save_name: &str,
        document: &Value,
        wall_clock_secs: u64,
    ) -> Result<(), PersistenceError> {
        let document_json = serde_json::to_string(document)?;
        self.conn.execute(
            "INSERT INTO saves (
                slot_id,
                save_name,
                document_json,
                created_at,
                updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(slot_id) DO UPDATE SET
                save_name = excluded.save_name,
                document_json = excluded.document_json,
                updated_at = excluded.updated_at",
            params![slot_id, save_name, document_json, wall_stamp(wall_clock_secs)],
        )?;
        Ok(())
    }

    pub fn load_document(&self, slot_id: &str) -> Result<Option<Value>, PersistenceError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT document_json FROM saves WHERE slot_id = ?1",
                params![slot_id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn record_load_report(
        &mut self,
        slot_id: &str,
        report: &LoadReport,
        wall_clock_secs: u64,
    ) -> Result<(), PersistenceError> {
        let report_json = serde_json::to_string(report)?;
        self.conn.execute(
            "INSERT INTO load_reports (slot_id, migrated, report_json, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                slot_id,
                if report.migrated { 1_i64 } else { 0_i64 },
                report_json,
                wall_stamp(wall_clock_secs),
            ],
        )?;
        Ok(())
    }

    pub fn record_turn(
        &mut self,
        slot_id: &str,
        turn_index: u64,
        report: &TurnReport,
        wall_clock_secs: u64,
    ) -> Result<(), PersistenceError> {
        let report_json = serde_json::to_string(report)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO turn_audits (
                slot_id,
                turn_index,
                applied_count,
                rejected_count,
                report_json,
                created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                slot_id,
                i64::try_from(turn_index).unwrap_or(i64::MAX),
                i64::try_from(report.applied_count()).unwrap_or(i64::MAX),
                i64::try_from(report.rejected_count()).unwrap_or(i64::MAX),
                report_json,
                wall_stamp(wall_clock_secs),
            ],
        )?;
        Ok(())
    }

    pub fn list_slots(&self) -> Result<Vec<SlotSummary>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT slot_id, save_name, updated_at FROM saves ORDER BY updated_at DESC, slot_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SlotSummary {
                slot_id: row.get(0)?,
                save_name: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }

    pub fn delete_slot(&mut self, slot_id: &str) -> Result<bool, PersistenceError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM turn_audits WHERE slot_id = ?1", params![slot_id])?;
        tx.execute("DELETE FROM load_reports WHERE slot_id = ?1", params![slot_id])?;
        let removed = tx.execute("DELETE FROM saves WHERE slot_id = ?1", params![slot_id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    pub fn turn_reports(&self, slot_id: &str) -> Result<Vec<TurnReport>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT report_json FROM turn_audits WHERE slot_id = ?1 ORDER BY turn_index ASC",
        )?;
        let rows = stmt.query_map(params![slot_id], |row| row.get::<_, String>(0))?;
        let mut reports = Vec::new();
        for row in rows {
            let payload = row?;
            reports.push(serde_json::from_str(&payload)?);
        }
        Ok(reports)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS saves (
                slot_id TEXT PRIMARY KEY,
                save_name TEXT NOT NULL,
                document_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS load_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slot_id TEXT NOT NULL,
                migrated INTEGER NOT NULL,
                report_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS turn_audits (
                slot_id TEXT NOT NULL,
                turn_index INTEGER NOT NULL,
                applied_count INTEGER NOT NULL,
                rejected_count INTEGER NOT NULL,
                report_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (slot_id, turn_index)
            );

            CREATE INDEX IF NOT EXISTS idx_load_reports_slot ON load_reports(slot_id);
            CREATE INDEX IF NOT EXISTS idx_turn_audits_slot ON turn_audits(slot_id, turn_index);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', 'wall-0000000000')",
            [],
        )?;

        Ok(())
    }
}

fn wall_stamp(secs: u64) -> String {
    format!("wall-{secs:010}")
}
