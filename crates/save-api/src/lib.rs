//! In-process API facade over the consistency engine, with slot-keyed
//! SQLite persistence and a per-turn audit trail.

mod persistence;

use std::path::Path;

use contracts::{EngineConfig, LoadReport, PatchCommand, TurnReport};
use save_core::SaveEngine;
use serde_json::Value;

pub use persistence::{PersistenceError, SlotSummary, SqliteSaveStore};

#[derive(Debug)]
struct PersistenceState {
    store: SqliteSaveStore,
    persisted_turn_count: u64,
}

pub struct EngineApi {
    engine: SaveEngine,
    turn_log: Vec<TurnReport>,
    persistence: Option<PersistenceState>,
    last_persistence_error: Option<String>,
    wall_clock_secs: u64,
}

impl EngineApi {
    /// Loads any document shape (raw bytes already parsed to JSON) into a
    /// canonical session.
    pub fn load(config: EngineConfig, raw: &Value, wall_clock_secs: u64) -> (Self, LoadReport) {
        let (engine, report) = SaveEngine::load(config, raw, wall_clock_secs);
        let api = Self {
            engine,
            turn_log: Vec::new(),
            persistence: None,
            last_persistence_error: None,
            wall_clock_secs,
        };
        (api, report)
    }

    /// Loads a stored slot. Missing slots are an error here, not a fresh
    /// default; callers who want a new game pass `Value::Null` to [`load`].
    pub fn load_slot(
        config: EngineConfig,
        store: SqliteSaveStore,
        slot_id: &str,
        wall_clock_secs: u64,
    ) -> Result<(Self, LoadReport), PersistenceError> {
        let raw = store
            .load_document(slot_id)?
            .ok_or_else(|| PersistenceError::SlotNotFound(slot_id.to_string()))?;
        let (mut api, report) = Self::load(config, &raw, wall_clock_secs);
        api.persistence = Some(PersistenceState {
            store,
            persisted_turn_count: 0,
        });
        api.record_load_report(&report);
        Ok((api, report))
    }

    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let store = SqliteSaveStore::open(path)?;
        self.attach_store(store);
        Ok(())
    }

    pub fn attach_store(&mut self, store: SqliteSaveStore) {
        self.persistence = Some(PersistenceState {
            store,
            persisted_turn_count: 0,
        });
    }

    /// One simulation turn. Persistence failures are recorded, never
    /// allowed to lose the in-memory state.
    pub fn apply_turn(&mut self, commands: &[PatchCommand]) -> TurnReport {
        let report = self.engine.apply_turn(commands);
        self.turn_log.push(report.clone());
        if let Err(err) = self.flush_turn_audit() {
            self.last_persistence_error = Some(err.to_string());
        }
        report
    }

    /// Writes the current document into its slot. The slot id and display
    /// name live inside the document metadata.
    pub fn persist(&mut self) -> Result<(), PersistenceError> {
        let slot_id = self.slot_id();
        let save_name = self.save_name();
        let document = self.engine.document().clone();
        let wall = self.wall_clock_secs;
        let Some(state) = self.persistence.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };
        state
            .store
            .persist_document(&slot_id, &save_name, &document, wall)?;
        self.last_persistence_error = None;
        Ok(())
    }

    pub fn engine(&self) -> &SaveEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SaveEngine {
        &mut self.engine
    }

    pub fn document(&self) -> &Value {
        self.engine.document()
    }

    pub fn turn_log(&self) -> &[TurnReport] {
        &self.turn_log
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    pub fn slot_id(&self) -> String {
        self.metadata_string("存档编号", "save_001")
    }

    pub fn save_name(&self) -> String {
        self.metadata_string("存档名称", "新的征程")
    }

    fn metadata_string(&self, key: &str, fallback: &str) -> String {
        self.engine
            .document()
            .get("元数据")
            .and_then(|meta| meta.get(key))
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    }

    fn record_load_report(&mut self, report: &LoadReport) {
        let slot_id = self.slot_id();
        let wall = self.wall_clock_secs;
        if let Some(state) = self.persistence.as_mut() {
            if let Err(err) = state.store.record_load_report(&slot_id, report, wall) {
                self.last_persistence_error = Some(err.to_string());
            }
        }
    }

    fn flush_turn_audit(&mut self) -> Result<(), PersistenceError> {
        let slot_id = self.slot_id();
        let wall = self.wall_clock_secs;
        let Some(state) = self.persistence.as_mut() else {
            return Ok(());
        };
        let pending = &self.turn_log[state.persisted_turn_count as usize..];
        for (offset, report) in pending.iter().enumerate() {
            let index = state.persisted_turn_count + offset as u64;
            state.store.record_turn(&slot_id, index, report, wall)?;
        }
        state.persisted_turn_count = self.turn_log.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PatchAction;
    use serde_json::json;

    fn fresh_api() -> EngineApi {
        let (mut api, _) = EngineApi::load(EngineConfig::default(), &Value::Null, 42);
        api.attach_store(SqliteSaveStore::open_in_memory().expect("in-memory store"));
        api
    }

    #[test]
    fn persist_then_reload_round_trips_the_document() {
        let mut api = fresh_api();
        api.apply_turn(&[PatchCommand::new(
            PatchAction::Set,
            "角色.位置.名称",
            json!("青云峰"),
        )]);
        api.persist().expect("persist");
        let document = api.document().clone();

        let store = match api.persistence.take() {
            Some(state) => state.store,
            None => unreachable!("store attached in fresh_api"),
        };
        let (reloaded, report) =
            EngineApi::load_slot(EngineConfig::default(), store, "save_001", 43).expect("slot");
        assert!(!report.migrated);
        assert_eq!(reloaded.document(), &document);
    }

    #[test]
    fn missing_slot_is_an_explicit_error() {
        let store = SqliteSaveStore::open_in_memory().expect("in-memory store");
        let result = EngineApi::load_slot(EngineConfig::default(), store, "save_404", 0);
        assert!(matches!(result, Err(PersistenceError::SlotNotFound(_))));
    }

    #[test]
    fn every_turn_lands_in_the_audit_trail() {
        let mut api = fresh_api();
        api.apply_turn(&[PatchCommand::new(
            PatchAction::Set,
            "角色.修炼.状态",
            json!("闭关"),
        )]);
        api.apply_turn(&[PatchCommand::new(
            PatchAction::Set,
            "系统.缓存.x",
            json!(1),
        )]);
        assert!(api.last_persistence_error().is_none());

        let state = api.persistence.as_ref().expect("store attached");
        let reports = state.store.turn_reports("save_001").expect("reports");
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].applied_count(), 1);
        assert_eq!(reports[1].rejected_count(), 1);
    }

    #[test]
    fn slot_listing_reflects_persisted_saves() {
        let mut api = fresh_api();
        api.persist().expect("persist");
        let state = api.persistence.as_ref().expect("store attached");
        let slots = state.store.list_slots().expect("list");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].slot_id, "save_001");
        assert_eq!(slots[0].save_name, "新的征程");
    }
}
