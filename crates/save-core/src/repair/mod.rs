//! Defensive repair of a canonical-shaped document. Total and idempotent:
//! any input (including `null`) becomes a fully valid canonical document,
//! with every fix recorded as a warning rather than an error.

use contracts::{EngineConfig, GameTime, DOMAIN_KEYS, SCHEMA_VERSION_V3};
use serde_json::{json, Map, Value};

use crate::defaults;
use crate::effects;
use crate::migrate::coerce_game_time;
use crate::value::{
    as_i64_lenient, clamp_number, non_empty_string, non_negative, string_or, vocab_or, RepairLog,
};

mod character;
mod metadata;
mod social;
mod system;
mod world;

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub document: Value,
    pub warnings: Vec<String>,
}

pub fn repair(document: Value, config: &EngineConfig) -> RepairOutcome {
    let mut repairer = Repairer {
        config,
        log: RepairLog::new(),
    };
    let document = repairer.run(document);
    RepairOutcome {
        document,
        warnings: repairer.log.into_warnings(),
    }
}

struct Repairer<'a> {
    config: &'a EngineConfig,
    log: RepairLog,
}

impl Repairer<'_> {
    fn run(&mut self, document: Value) -> Value {
        let mut root = match document {
            Value::Object(map) => map,
            _ => {
                self.log
                    .warn("$", "document is not an object, rebuilt from defaults");
                // Fall through to field repair so the synthesized skeleton
                // is normalized exactly like any loaded document.
                Map::new()
            }
        };

        // Invariant 1: all five domains present before field repair runs.
        for key in DOMAIN_KEYS {
            if !matches!(root.get(key), Some(Value::Object(_))) {
                if root.contains_key(key) {
                    self.log.warn(key, "wrong shape, rebuilt from default");
                }
                root.insert(key.to_string(), self.domain_default(key));
            }
        }

        // Documented repair order; each step is independent and local.
        self.repair_identity(&mut root);
        self.repair_vitals(&mut root);
        self.repair_location(&mut root);
        self.repair_equipment(&mut root);
        self.repair_inventory(&mut root);
        self.repair_relationships(&mut root);
        self.repair_memory(&mut root);
        self.repair_metadata(&mut root);
        self.repair_dao(&mut root);
        self.repair_skills(&mut root);
        self.repair_technique(&mut root);
        self.repair_cultivation(&mut root);
        self.repair_effects(&mut root);
        self.repair_sect(&mut root);
        self.repair_quests(&mut root);
        self.repair_world(&mut root);
        self.repair_system(&mut root);

        Value::Object(root)
    }

    fn domain_default(&self, key: &str) -> Value {
        match key {
            "元数据" => defaults::default_metadata(0),
            "角色" => defaults::default_character(self.config.innate_attribute_default),
            "社交" => defaults::default_social(),
            "世界" => defaults::default_world(0),
            _ => defaults::default_system(),
        }
    }

    /// Clock as repaired metadata sees it; used by steps that need "now".
    fn current_clock(root: &Map<String, Value>) -> GameTime {
        coerce_game_time(root.get("元数据").and_then(|meta| meta.get("时间")))
    }
}

/// Returns the map at `parent[key]`, rebuilding from `default` on a shape
/// mismatch (warned) or absence (silent).
fn object_field<'m>(
    log: &mut RepairLog,
    parent: &'m mut Map<String, Value>,
    path: &str,
    key: &str,
    default: Value,
) -> &'m mut Map<String, Value> {
    if !matches!(parent.get(key), Some(Value::Object(_))) {
        if parent.contains_key(key) {
            log.warn(path, "wrong shape, rebuilt from default");
        }
        let fresh = if default.is_object() { default } else { json!({}) };
        parent.insert(key.to_string(), fresh);
    }
    match parent.get_mut(key) {
        Some(Value::Object(map)) => map,
        _ => unreachable!("key was just set to an object"),
    }
}

/// List-shaped counterpart of [`object_field`].
fn array_field<'m>(
    log: &mut RepairLog,
    parent: &'m mut Map<String, Value>,
    path: &str,
    key: &str,
) -> &'m mut Vec<Value> {
    match parent.get(key) {
        Some(Value::Array(_)) => {}
        Some(_) => {
            log.warn(path, "expected a list, reset to empty");
            parent.insert(key.to_string(), json!([]));
        }
        None => {
            parent.insert(key.to_string(), json!([]));
        }
    }
    match parent.get_mut(key) {
        Some(Value::Array(list)) => list,
        _ => unreachable!("key was just set to an array"),
    }
}

/// Repairs one `{当前, 上限}` pair in place: both ends validated
/// independently, then `当前` clamped into `[0, 上限]`.
fn repair_value_pair(
    log: &mut RepairLog,
    parent: &mut Map<String, Value>,
    path: &str,
    key: &str,
    default_max: i64,
) {
    let pair = object_field(log, parent, path, key, json!({}));
    let max = non_negative(pair.get("上限"), default_max);
    let current = clamp_number(pair.get("当前"), 0, max, max);
    pair.insert("上限".to_string(), json!(max));
    pair.insert("当前".to_string(), json!(current));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(document: Value) -> RepairOutcome {
        repair(document, &EngineConfig::default())
    }

    #[test]
    fn null_input_becomes_full_default_document() {
        let outcome = run(Value::Null);
        for key in DOMAIN_KEYS {
            assert!(outcome.document.get(key).is_some(), "missing {key}");
        }
        assert!(!outcome.warnings.is_empty());
    }

    #[test]
    fn repair_is_idempotent() {
        let mangled = json!({
            "角色": {
                "属性": { "气血": { "当前": "250", "上限": 100 }, "境界": "炼气" },
                "背包": { "物品": [] },
                "效果": [{ "名称": "旧伤", "剩余时间": "3天" }],
            },
            "社交": { "记忆": { "短期": "不是列表" } },
        });
        let first = run(mangled);
        let second = run(first.document.clone());
        assert_eq!(first.document, second.document);
        assert!(second.warnings.is_empty(), "second pass found {:?}", second.warnings);
    }

    #[test]
    fn array_item_map_is_rebuilt_as_object() {
        let mut doc = defaults::default_document(0, 5);
        doc["角色"]["背包"]["物品"] = json!([]);
        let outcome = run(doc);
        assert_eq!(outcome.document["角色"]["背包"]["物品"], json!({}));
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("物品")), "warnings: {:?}", outcome.warnings);
    }

    #[test]
    fn value_pairs_always_satisfy_current_le_max() {
        let mut doc = defaults::default_document(0, 5);
        doc["角色"]["属性"]["气血"] = json!({ "当前": 250, "上限": 100 });
        doc["角色"]["属性"]["灵力"] = json!({ "当前": -5, "上限": "80" });
        doc["角色"]["属性"]["神识"] = json!("坏数据");
        let outcome = run(doc);
        let vitals = &outcome.document["角色"]["属性"];
        assert_eq!(vitals["气血"], json!({ "当前": 100, "上限": 100 }));
        assert_eq!(vitals["灵力"], json!({ "当前": 0, "上限": 80 }));
        assert_eq!(vitals["神识"]["当前"], vitals["神识"]["上限"]);
    }

    #[test]
    fn version_is_stamped_to_v3() {
        let mut doc = defaults::default_document(0, 5);
        doc["元数据"]["版本"] = json!("1.x");
        let outcome = run(doc);
        assert_eq!(outcome.document["元数据"]["版本"], SCHEMA_VERSION_V3);
    }
}
