//! One-time transformation of legacy save layouts into the canonical
//! five-domain schema. Total and idempotent: any input, including `null`,
//! yields a canonical document plus a migration report.

use contracts::{
    EngineConfig, GameTime, MigrationReport, DOMAIN_CHARACTER, DOMAIN_KEYS, DOMAIN_METADATA,
    DOMAIN_SOCIAL, DOMAIN_SYSTEM, DOMAIN_WORLD, LEGACY_ROOT_KEYS, MINUTES_PER_DAY,
    MINUTES_PER_HOUR, MINUTES_PER_MONTH, MINUTES_PER_YEAR, RESERVED_ANNOTATION_PREFIXES,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::defaults;
use crate::path;
use crate::value::as_i64_lenient;

#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub document: Value,
    pub report: MigrationReport,
}

/// Ordered fallback chains: for each target substructure the first present
/// legacy location wins.
const IDENTITY_CHAIN: [&str; 4] = ["角色.身份", "角色基础信息", "玩家角色信息", "状态.身份"];
const VITALS_CHAIN: [&str; 4] = ["角色.属性", "玩家角色状态", "修行状态", "状态"];
const CLOCK_CHAIN: [&str; 4] = ["元数据.时间", "游戏时间", "时间", "状态.时间"];
const LOCATION_CHAIN: [&str; 3] = ["角色.位置", "位置", "状态.位置"];
const EFFECTS_CHAIN: [&str; 3] = ["角色.效果", "状态效果", "状态.效果"];
const INVENTORY_CHAIN: [&str; 3] = ["角色.背包", "背包", "状态.背包"];
const EQUIPMENT_CHAIN: [&str; 2] = ["角色.装备", "装备栏"];
const TECHNIQUE_CHAIN: [&str; 2] = ["角色.功法", "修炼功法"];
const CULTIVATION_CHAIN: [&str; 2] = ["角色.修炼", "修行状态.修炼"];
const DAO_CHAIN: [&str; 2] = ["角色.三千大道", "三千大道"];
const SKILLS_CHAIN: [&str; 2] = ["角色.掌握技能", "掌握技能"];
const RELATIONSHIP_CHAIN: [&str; 2] = ["社交.人物关系", "人物关系"];
const SECT_CHAIN: [&str; 2] = ["社交.宗门", "宗门系统"];
const QUEST_CHAIN: [&str; 2] = ["社交.任务系统", "任务系统"];
const MEMORY_CHAIN: [&str; 1] = ["社交.记忆"];
const WORLD_INFO_CHAIN: [&str; 2] = ["世界.世界信息", "世界信息"];
const WORLD_STATE_CHAIN: [&str; 2] = ["世界.世界状态", "世界状态"];
const NARRATIVE_CHAIN: [&str; 3] = ["系统.叙事历史", "叙事历史", "对话历史"];

pub fn migrate(raw: &Value, wall_clock_secs: u64, config: &EngineConfig) -> MigrationOutcome {
    // Never mutate the caller's copy.
    let mut stripped = raw.clone();
    strip_annotations(&mut stripped);

    // Idempotence guarantee: a document that already satisfies the
    // canonical predicate passes through untouched.
    if is_canonical(&stripped) {
        return MigrationOutcome {
            document: stripped,
            report: MigrationReport::default(),
        };
    }

    let mut report = MigrationReport::default();
    if let Some(map) = stripped.as_object() {
        for key in LEGACY_ROOT_KEYS {
            if map.contains_key(key) {
                report.legacy_keys_found.push(key.to_string());
                report.removed_legacy_keys.push(key.to_string());
            }
        }
    }

    let source = &stripped;
    let mut document = Map::new();
    document.insert(
        DOMAIN_METADATA.to_string(),
        build_metadata(source, wall_clock_secs),
    );
    document.insert(
        DOMAIN_CHARACTER.to_string(),
        build_character(source, config),
    );
    document.insert(DOMAIN_SOCIAL.to_string(), build_social(source));
    document.insert(
        DOMAIN_WORLD.to_string(),
        build_world(source, wall_clock_secs),
    );
    document.insert(DOMAIN_SYSTEM.to_string(), build_system(source));

    // Guarded failure mode: default synthesis above makes this
    // unreachable, but an absent domain must still be forced in.
    for key in DOMAIN_KEYS {
        if !document.contains_key(key) {
            document.insert(key.to_string(), json!({}));
            report
                .warnings
                .push(format!("domain {key} absent after migration, forced empty"));
        }
    }

    MigrationOutcome {
        document: Value::Object(document),
        report,
    }
}

pub fn is_canonical(document: &Value) -> bool {
    document
        .as_object()
        .map(|map| DOMAIN_KEYS.iter().all(|key| map.contains_key(*key)))
        .unwrap_or(false)
}

/// Recursively removes internal annotation fields (reserved key prefixes)
/// from every map node.
pub fn strip_annotations(node: &mut Value) {
    match node {
        Value::Object(map) => {
            map.retain(|key, _| {
                !RESERVED_ANNOTATION_PREFIXES
                    .iter()
                    .any(|prefix| key.starts_with(prefix))
            });
            for child in map.values_mut() {
                strip_annotations(child);
            }
        }
        Value::Array(list) => {
            for child in list.iter_mut() {
                strip_annotations(child);
            }
        }
        _ => {}
    }
}

fn probe<'a>(source: &'a Value, chain: &[&str]) -> Option<&'a Value> {
    chain.iter().find_map(|candidate| path::get(source, candidate))
}

fn probe_object<'a>(source: &'a Value, chain: &[&str]) -> Option<&'a Map<String, Value>> {
    chain
        .iter()
        .find_map(|candidate| path::get(source, candidate).and_then(Value::as_object))
}

fn probe_array<'a>(source: &'a Value, chain: &[&str]) -> Option<&'a Vec<Value>> {
    chain
        .iter()
        .find_map(|candidate| path::get(source, candidate).and_then(Value::as_array))
}

/// Shallow overlay: copies the listed keys from `from` over `target`'s
/// defaults, leaving absent keys at their default.
fn overlay(target: &mut Value, from: &Map<String, Value>, keys: &[&str]) {
    let target_map = match target.as_object_mut() {
        Some(map) => map,
        None => return,
    };
    for key in keys {
        if let Some(found) = from.get(*key) {
            target_map.insert(key.to_string(), found.clone());
        }
    }
}

fn build_metadata(source: &Value, wall_clock_secs: u64) -> Value {
    let mut metadata = defaults::default_metadata(wall_clock_secs);
    if let Some(existing) = path::get(source, DOMAIN_METADATA).and_then(Value::as_object) {
        overlay(
            &mut metadata,
            existing,
            &["存档编号", "存档名称", "创建时间", "更新时间", "游玩秒数"],
        );
    }
    let clock = coerce_game_time(probe(source, &CLOCK_CHAIN));
    metadata["时间"] = serde_json::to_value(clock).expect("game time serializes");
    metadata
}

fn build_character(source: &Value, config: &EngineConfig) -> Value {
    let mut character = defaults::default_character(config.innate_attribute_default);

    if let Some(identity) = probe_object(source, &IDENTITY_CHAIN) {
        overlay(
            &mut character["身份"],
            identity,
            &["姓名", "性别", "出生日期", "种族", "先天六维", "后天六维"],
        );
    }
    if let Some(vitals) = probe_object(source, &VITALS_CHAIN) {
        overlay(
            &mut character["属性"],
            vitals,
            &["境界", "声望", "气血", "灵力", "神识", "寿元"],
        );
    }
    if let Some(location) = probe(source, &LOCATION_CHAIN) {
        character["位置"] = location.clone();
    }
    if let Some(effects) = probe_array(source, &EFFECTS_CHAIN) {
        character["效果"] = Value::Array(effects.clone());
    }
    if let Some(inventory) = probe(source, &INVENTORY_CHAIN) {
        character["背包"] = inventory.clone();
    }
    if let Some(equipment) = probe(source, &EQUIPMENT_CHAIN) {
        character["装备"] = equipment.clone();
    }
    if let Some(technique) = probe(source, &TECHNIQUE_CHAIN) {
        character["功法"] = technique.clone();
    }
    if let Some(cultivation) = probe(source, &CULTIVATION_CHAIN) {
        character["修炼"] = cultivation.clone();
    }
    if let Some(dao) = probe(source, &DAO_CHAIN) {
        character["三千大道"] = dao.clone();
    }
    if let Some(skills) = probe(source, &SKILLS_CHAIN) {
        character["掌握技能"] = skills.clone();
    }

    character
}

fn build_social(source: &Value) -> Value {
    let mut social = defaults::default_social();

    if let Some(relationships) = probe(source, &RELATIONSHIP_CHAIN) {
        social["人物关系"] = relationships.clone();
    }
    if let Some(sect) = probe(source, &SECT_CHAIN) {
        social["宗门"] = sect.clone();
    }
    social["任务系统"] = build_quest_system(source);
    if let Some(memory) = probe(source, &MEMORY_CHAIN) {
        social["记忆"] = memory.clone();
    }

    social
}

/// Unifies the quest list and folds the legacy "completed quests" list in
/// by id instead of dropping it.
fn build_quest_system(source: &Value) -> Value {
    let mut quest_list: Vec<Value> = Vec::new();
    let mut legacy_completed: Vec<Value> = Vec::new();

    if let Some(found) = probe(source, &QUEST_CHAIN) {
        match found {
            // Oldest layout stored the quest system as a bare list.
            Value::Array(list) => quest_list = list.clone(),
            Value::Object(map) => {
                if let Some(Value::Array(list)) = map.get("任务列表") {
                    quest_list = list.clone();
                }
                if let Some(Value::Array(done)) = map.get("已完成任务") {
                    legacy_completed = done.clone();
                }
            }
            _ => {}
        }
    }
    if let Some(Value::Array(done)) = path::get(source, "已完成任务") {
        legacy_completed.extend(done.clone());
    }

    for mut completed in legacy_completed {
        let Some(map) = completed.as_object_mut() else {
            continue;
        };
        map.insert("状态".to_string(), json!("已完成"));
        let id = map.get("编号").and_then(Value::as_str).map(str::to_string);
        let existing = id.as_deref().and_then(|needle| {
            quest_list.iter_mut().find(|quest| {
                quest.get("编号").and_then(Value::as_str) == Some(needle)
            })
        });
        match existing {
            Some(quest) => {
                if let Some(quest_map) = quest.as_object_mut() {
                    quest_map.insert("状态".to_string(), json!("已完成"));
                }
            }
            None => quest_list.push(completed),
        }
    }

    json!({ "任务列表": quest_list })
}

fn build_world(source: &Value, wall_clock_secs: u64) -> Value {
    let mut world = defaults::default_world(wall_clock_secs);
    if let Some(info) = probe_object(source, &WORLD_INFO_CHAIN) {
        overlay(
            &mut world["世界信息"],
            info,
            &["名称", "大陆", "势力", "地点", "纪元", "背景设定", "生成时间"],
        );
    }
    if let Some(state) = probe(source, &WORLD_STATE_CHAIN) {
        world["世界状态"] = state.clone();
    }
    world
}

fn build_system(source: &Value) -> Value {
    let mut system = defaults::default_system();
    if let Some(existing) = path::get(source, DOMAIN_SYSTEM).and_then(Value::as_object) {
        overlay(
            &mut system,
            existing,
            &["功能配置", "用户设置", "缓存", "待处理事件", "扩展", "联机模式"],
        );
    }
    if let Some(narrative) = probe_array(source, &NARRATIVE_CHAIN) {
        system["叙事历史"] = Value::Array(narrative.clone());
    }
    system
}

static CLOCK_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)年(\d+)月(\d+)日(?:\s*(\d+)[时:](\d+)分?)?").expect("clock pattern compiles")
});

/// Accepts every historical clock shape and produces a canonical
/// `GameTime`; anything unrecognizable degrades to the epoch.
pub fn coerce_game_time(value: Option<&Value>) -> GameTime {
    let epoch = GameTime::epoch();
    let Some(value) = value else { return epoch };

    match value {
        Value::Object(map) => {
            let component = |canonical: &str, legacy: &str, fallback: i64| {
                map.get(canonical)
                    .or_else(|| map.get(legacy))
                    .and_then(as_i64_lenient)
                    .unwrap_or(fallback)
            };
            GameTime {
                year: component("年", "year", epoch.year),
                month: component("月", "month", epoch.month),
                day: component("日", "day", epoch.day),
                hour: component("时", "hour", epoch.hour),
                minute: component("分", "minute", epoch.minute),
            }
        }
        // A bare number is an absolute minute count under the fixed
        // approximate-calendar formula.
        Value::Number(_) => match as_i64_lenient(value) {
            Some(total) if total >= 0 => decompose_minutes(total),
            _ => epoch,
        },
        Value::String(text) => match CLOCK_TEXT.captures(text) {
            Some(captures) => {
                let field = |index: usize, fallback: i64| {
                    captures
                        .get(index)
                        .and_then(|m| m.as_str().parse::<i64>().ok())
                        .unwrap_or(fallback)
                };
                GameTime {
                    year: field(1, epoch.year),
                    month: field(2, epoch.month),
                    day: field(3, epoch.day),
                    hour: field(4, epoch.hour),
                    minute: field(5, epoch.minute),
                }
            }
            None => epoch,
        },
        _ => epoch,
    }
}

fn decompose_minutes(total: i64) -> GameTime {
    let year = total / MINUTES_PER_YEAR;
    let mut rest = total % MINUTES_PER_YEAR;
    let month = rest / MINUTES_PER_MONTH;
    rest %= MINUTES_PER_MONTH;
    let day = rest / MINUTES_PER_DAY;
    rest %= MINUTES_PER_DAY;
    GameTime {
        year,
        month,
        day,
        hour: rest / MINUTES_PER_HOUR,
        minute: rest % MINUTES_PER_HOUR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn canonical_input_passes_through_unchanged() {
        let doc = defaults::default_document(7, 5);
        let outcome = migrate(&doc, 99, &default_config());
        assert_eq!(outcome.document, doc);
        assert!(outcome.report.legacy_keys_found.is_empty());
        assert!(outcome.report.warnings.is_empty());
    }

    #[test]
    fn annotations_never_survive_migration() {
        let mut doc = defaults::default_document(7, 5);
        doc["角色"]["$__note"] = json!("内部注释");
        doc["社交"]["__trace"] = json!([1, 2, 3]);
        let outcome = migrate(&doc, 99, &default_config());
        assert!(outcome.document["角色"].get("$__note").is_none());
        assert!(outcome.document["社交"].get("__trace").is_none());
        // Still the canonical fast path: stripping happens before the
        // canonical predicate.
        assert!(outcome.report.legacy_keys_found.is_empty());
    }

    #[test]
    fn legacy_status_wrapper_and_bare_clock_migrate() {
        let doc = json!({
            "状态": { "境界": { "名称": "炼气" } },
            "时间": { "年": 1, "月": 1, "日": 1 },
        });
        let outcome = migrate(&doc, 0, &default_config());
        assert_eq!(outcome.document["角色"]["属性"]["境界"]["名称"], "炼气");
        assert_eq!(outcome.document["元数据"]["时间"]["年"], 1);
        assert_eq!(outcome.document["元数据"]["时间"]["时"], 8);
        assert!(outcome
            .report
            .removed_legacy_keys
            .contains(&"状态".to_string()));
        assert!(outcome
            .report
            .removed_legacy_keys
            .contains(&"时间".to_string()));
    }

    #[test]
    fn null_input_degrades_to_full_default() {
        let outcome = migrate(&Value::Null, 42, &default_config());
        assert!(is_canonical(&outcome.document));
        assert_eq!(outcome.document["角色"]["身份"]["姓名"], "无名修士");
        assert_eq!(outcome.document["世界"]["世界信息"]["生成时间"], 42);
    }

    #[test]
    fn completed_quest_list_merges_by_id() {
        let doc = json!({
            "任务系统": {
                "任务列表": [
                    { "编号": "q1", "名称": "寻药", "状态": "进行中" },
                ],
                "已完成任务": [
                    { "编号": "q1", "名称": "寻药" },
                    { "编号": "q2", "名称": "传信" },
                ],
            },
        });
        let outcome = migrate(&doc, 0, &default_config());
        let list = outcome.document["社交"]["任务系统"]["任务列表"]
            .as_array()
            .expect("quest list");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["状态"], "已完成");
        assert_eq!(list[1]["编号"], "q2");
        assert_eq!(list[1]["状态"], "已完成");
        assert!(outcome.document["社交"]["任务系统"].get("已完成任务").is_none());
    }

    #[test]
    fn fallback_chains_prefer_earlier_locations() {
        let doc = json!({
            "角色基础信息": { "姓名": "甲" },
            "玩家角色信息": { "姓名": "乙" },
        });
        let outcome = migrate(&doc, 0, &default_config());
        assert_eq!(outcome.document["角色"]["身份"]["姓名"], "甲");
    }

    #[test]
    fn coerce_game_time_accepts_all_legacy_shapes() {
        assert_eq!(coerce_game_time(None), GameTime::epoch());
        assert_eq!(
            coerce_game_time(Some(&json!({"年": "12", "月": 3, "日": 4}))),
            GameTime { year: 12, month: 3, day: 4, hour: 8, minute: 0 }
        );
        assert_eq!(
            coerce_game_time(Some(&json!({"year": 5, "month": 2, "day": 1, "hour": 0, "minute": 30}))),
            GameTime { year: 5, month: 2, day: 1, hour: 0, minute: 30 }
        );
        assert_eq!(
            coerce_game_time(Some(&json!("1000年3月5日 14:20"))),
            GameTime { year: 1000, month: 3, day: 5, hour: 14, minute: 20 }
        );
        assert_eq!(
            coerce_game_time(Some(&json!("乱码"))),
            GameTime::epoch()
        );
        let roundabout = GameTime { year: 2, month: 4, day: 6, hour: 10, minute: 30 };
        assert_eq!(
            coerce_game_time(Some(&json!(roundabout.total_minutes()))),
            roundabout
        );
    }

    #[test]
    fn migration_is_idempotent_over_its_own_output() {
        let doc = json!({
            "状态": { "气血": { "当前": 50, "上限": 100 } },
            "背包": { "物品": {} },
        });
        let first = migrate(&doc, 5, &default_config());
        let second = migrate(&first.document, 5, &default_config());
        assert_eq!(first.document, second.document);
        assert!(second.report.legacy_keys_found.is_empty());
    }
}
