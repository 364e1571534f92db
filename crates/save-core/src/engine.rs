//! Engine facade. Owns one canonical document and funnels every mutation
//! through the same pipeline: commands, then repair, then the effect sweep.
//! The engine never reads wall-clock time itself; callers pass it in, which
//! keeps every operation deterministic and replayable.

use std::fmt;

use contracts::{
    EffectDisplay, EngineConfig, GameTime, LoadReport, PatchCommand, TurnReport,
    EQUIPMENT_SLOTS,
};
use serde_json::{json, Value};

use crate::detect;
use crate::effects;
use crate::migrate;
use crate::patch;
use crate::repair;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    UnknownSlot { slot: String },
    UnknownItem { id: String },
    NotEquippable { id: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSlot { slot } => write!(f, "unknown equipment slot '{slot}'"),
            Self::UnknownItem { id } => write!(f, "no inventory item with id '{id}'"),
            Self::NotEquippable { id } => write!(f, "item '{id}' cannot be equipped"),
        }
    }
}

impl std::error::Error for EngineError {}

pub struct SaveEngine {
    config: EngineConfig,
    document: Value,
}

impl SaveEngine {
    /// Loads any document shape into a canonical engine. Canonical input
    /// skips migration; anything else goes through the full pipeline.
    pub fn load(config: EngineConfig, raw: &Value, wall_clock_secs: u64) -> (Self, LoadReport) {
        let detection = detect::detect(raw);
        let mut report = LoadReport::default();

        let document = if detection.needs_migration {
            let outcome = migrate::migrate(raw, wall_clock_secs, &config);
            report.migrated = true;
            report.migration = Some(outcome.report);
            outcome.document
        } else {
            raw.clone()
        };

        let repaired = repair::repair(document, &config);
        report.repair_warnings = repaired.warnings;
        let engine = Self {
            config,
            document: repaired.document,
        };
        (engine, report)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current in-fiction clock, as repaired metadata holds it.
    pub fn clock(&self) -> GameTime {
        migrate::coerce_game_time(
            self.document
                .get("元数据")
                .and_then(|meta| meta.get("时间")),
        )
    }

    /// Runs one simulation turn: apply the command batch, repair whatever
    /// the commands left behind, then expire effects against the repaired
    /// clock. Rejected commands are audited, never fatal.
    pub fn apply_turn(&mut self, commands: &[PatchCommand]) -> TurnReport {
        let outcomes = patch::apply_batch(&mut self.document, commands, &self.config);

        let repaired = repair::repair(self.document.take(), &self.config);
        self.document = repaired.document;
        let mut repair_warnings = repaired.warnings;

        let now = self.clock();
        let (expired_effects, sweep_warnings) = effects::sweep_expired(&mut self.document, &now);
        repair_warnings.extend(sweep_warnings);

        TurnReport {
            outcomes,
            repair_warnings,
            expired_effects,
        }
    }

    /// Equips an inventory item into a slot. The equipment block is
    /// read-only for patch commands; this is the one sanctioned way in.
    pub fn equip(&mut self, slot: &str, item_id: &str) -> Result<(), EngineError> {
        if !EQUIPMENT_SLOTS.contains(&slot) {
            return Err(EngineError::UnknownSlot {
                slot: slot.to_string(),
            });
        }
        let item = self
            .document
            .pointer(&format!("/角色/背包/物品/{item_id}"))
            .ok_or_else(|| EngineError::UnknownItem {
                id: item_id.to_string(),
            })?;
        let kind = item.get("类型").and_then(Value::as_str).unwrap_or("");
        let equippable = match slot {
            "法宝" => matches!(kind, "装备" | "法宝"),
            _ => kind == "装备",
        };
        if !equippable {
            return Err(EngineError::NotEquippable {
                id: item_id.to_string(),
            });
        }
        let name = item.get("名称").and_then(Value::as_str).unwrap_or(item_id);
        let entry = json!({ "编号": item_id, "名称": name });
        if let Some(slots) = self
            .document
            .pointer_mut("/角色/装备")
            .and_then(Value::as_object_mut)
        {
            slots.insert(slot.to_string(), entry);
        }
        Ok(())
    }

    /// Clears a slot back to empty. Unequipping an empty slot is a no-op.
    pub fn unequip(&mut self, slot: &str) -> Result<(), EngineError> {
        if !EQUIPMENT_SLOTS.contains(&slot) {
            return Err(EngineError::UnknownSlot {
                slot: slot.to_string(),
            });
        }
        if let Some(slots) = self
            .document
            .pointer_mut("/角色/装备")
            .and_then(Value::as_object_mut)
        {
            slots.insert(slot.to_string(), Value::Null);
        }
        Ok(())
    }

    /// Active effects rendered for the UI against the current clock.
    pub fn effect_displays(&self) -> Vec<EffectDisplay> {
        let now = self.clock();
        effects::effect_displays(&self.document, &now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PatchAction;
    use serde_json::json;

    fn load_default() -> SaveEngine {
        let (engine, _) = SaveEngine::load(EngineConfig::default(), &Value::Null, 0);
        engine
    }

    #[test]
    fn load_null_yields_canonical_document() {
        let (engine, report) = SaveEngine::load(EngineConfig::default(), &Value::Null, 0);
        assert!(report.migrated);
        for domain in contracts::DOMAIN_KEYS {
            assert!(engine.document().get(domain).is_some(), "missing {domain}");
        }
    }

    #[test]
    fn canonical_reload_is_stable() {
        let engine = load_default();
        let first = engine.into_document();
        let (engine, report) = SaveEngine::load(EngineConfig::default(), &first, 0);
        assert!(!report.migrated);
        assert!(report.repair_warnings.is_empty());
        assert_eq!(engine.into_document(), first);
    }

    #[test]
    fn turn_applies_commands_and_repairs_damage() {
        let mut engine = load_default();
        let commands = vec![
            PatchCommand::new(PatchAction::Set, "角色.属性.气血.当前", json!(9999)),
            PatchCommand::new(PatchAction::Set, "系统.缓存.污染", json!(true)),
        ];
        let report = engine.apply_turn(&commands);
        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.rejected_count(), 1);
        // Repair clamps the overshoot back to the cap.
        let vitals = &engine.document()["角色"]["属性"]["气血"];
        assert_eq!(vitals["当前"], vitals["上限"]);
    }

    #[test]
    fn advancing_the_clock_expires_timed_effects() {
        let mut engine = load_default();
        let setup = vec![
            PatchCommand::new(
                PatchAction::Push,
                "角色.效果",
                json!({ "名称": "聚气", "类型": "增益", "持续时间": 60 }),
            ),
            PatchCommand::new(
                PatchAction::Push,
                "角色.效果",
                json!({ "名称": "道基", "类型": "增益", "持续时间": -1 }),
            ),
        ];
        let report = engine.apply_turn(&setup);
        assert_eq!(report.applied_count(), 2);
        assert!(report.expired_effects.is_empty());

        let mut later = engine.clock();
        later.hour += 2;
        let advance = vec![PatchCommand::new(
            PatchAction::Set,
            "元数据.时间",
            json!(later),
        )];
        let report = engine.apply_turn(&advance);
        assert_eq!(report.expired_effects, vec!["聚气".to_string()]);

        let names: Vec<&str> = engine.document()["角色"]["效果"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|effect| effect["名称"].as_str())
            .collect();
        assert_eq!(names, vec!["道基"]);
    }

    #[test]
    fn equip_moves_past_the_read_only_wall() {
        let mut engine = load_default();
        let stock = vec![PatchCommand::new(
            PatchAction::Set,
            "角色.背包.物品.item_001",
            json!({ "名称": "青锋剑", "类型": "装备" }),
        )];
        engine.apply_turn(&stock);

        engine.equip("武器", "item_001").unwrap();
        assert_eq!(
            engine.document()["角色"]["装备"]["武器"]["名称"],
            json!("青锋剑")
        );

        engine.unequip("武器").unwrap();
        assert_eq!(engine.document()["角色"]["装备"]["武器"], Value::Null);

        assert!(matches!(
            engine.equip("头盔", "item_001"),
            Err(EngineError::UnknownSlot { .. })
        ));
    }
}
