//! Documented default skeletons for every canonical domain, used whenever
//! migration finds no legacy equivalent or repair must rebuild an
//! incompatible substructure. Field names here are the persisted schema.

use contracts::{GameTime, SCHEMA_VERSION_V3};
use serde_json::{json, Value};

pub fn default_game_time() -> Value {
    serde_json::to_value(GameTime::epoch()).expect("epoch serializes")
}

pub fn default_metadata(wall_clock_secs: u64) -> Value {
    json!({
        "版本": SCHEMA_VERSION_V3,
        "存档编号": "save_001",
        "存档名称": "新的征程",
        "创建时间": wall_clock_secs,
        "更新时间": wall_clock_secs,
        "游玩秒数": 0,
        "时间": default_game_time(),
    })
}

pub fn default_value_pair(current: i64, max: i64) -> Value {
    json!({ "当前": current, "上限": max })
}

pub fn default_realm() -> Value {
    json!({
        "名称": "凡人",
        "阶段": "",
        "进度": 0,
        "突破阈值": 100,
        "突破描述": "",
    })
}

/// Balanced innate attributes for a freshly-defaulted identity.
pub fn default_six_attributes(each: i64) -> Value {
    json!({
        "根骨": each,
        "悟性": each,
        "气运": each,
        "魅力": each,
        "心性": each,
        "体魄": each,
    })
}

pub fn default_identity(innate_each: i64) -> Value {
    json!({
        "姓名": "无名修士",
        "性别": "男",
        "出生日期": default_game_time(),
        "种族": "人族",
        "先天六维": default_six_attributes(innate_each),
        "后天六维": default_six_attributes(0),
    })
}

pub fn default_vitals() -> Value {
    json!({
        "境界": default_realm(),
        "声望": 0,
        "气血": default_value_pair(100, 100),
        "灵力": default_value_pair(100, 100),
        "神识": default_value_pair(50, 50),
        "寿元": default_value_pair(80, 80),
    })
}

pub fn default_location() -> Value {
    json!({ "名称": "青云村", "描述": "" })
}

pub fn default_spirit_stones() -> Value {
    json!({ "下品": 0, "中品": 0, "上品": 0, "极品": 0 })
}

pub fn default_inventory() -> Value {
    json!({ "灵石": default_spirit_stones(), "物品": {} })
}

pub fn default_equipment() -> Value {
    json!({ "武器": null, "防具": null, "饰品": null, "法宝": null })
}

pub fn default_cultivation() -> Value {
    json!({ "状态": "空闲", "加成": 0 })
}

pub fn default_character(innate_each: i64) -> Value {
    json!({
        "身份": default_identity(innate_each),
        "属性": default_vitals(),
        "位置": default_location(),
        "效果": [],
        "背包": default_inventory(),
        "装备": default_equipment(),
        "功法": null,
        "修炼": default_cultivation(),
        "三千大道": {},
        "掌握技能": [],
    })
}

pub fn default_quest_system() -> Value {
    json!({ "任务列表": [] })
}

pub fn default_memory() -> Value {
    json!({ "短期": [], "中期": [], "长期": [] })
}

pub fn default_social() -> Value {
    json!({
        "人物关系": {},
        "宗门": null,
        "任务系统": default_quest_system(),
        "记忆": default_memory(),
    })
}

/// World skeleton; `生成时间` is the wall clock at synthesis, not the
/// in-fiction calendar.
pub fn default_world(wall_clock_secs: u64) -> Value {
    json!({
        "世界信息": {
            "名称": "九州",
            "大陆": [],
            "势力": [],
            "地点": [],
            "纪元": "灵潮纪",
            "背景设定": "",
            "生成时间": wall_clock_secs,
        },
        "世界状态": {},
    })
}

/// Single-player online descriptor is the default multiplayer state.
pub fn default_online_mode() -> Value {
    json!({ "模式": "单机", "房间编号": null })
}

pub fn default_system() -> Value {
    json!({
        "功能配置": {},
        "用户设置": {},
        "缓存": {},
        "待处理事件": [],
        "叙事历史": [],
        "扩展": {},
        "联机模式": default_online_mode(),
    })
}

/// A fully-defaulted canonical document. This is what a `null` or
/// non-object input degrades to.
pub fn default_document(wall_clock_secs: u64, innate_each: i64) -> Value {
    json!({
        "元数据": default_metadata(wall_clock_secs),
        "角色": default_character(innate_each),
        "社交": default_social(),
        "世界": default_world(wall_clock_secs),
        "系统": default_system(),
    })
}

/// Breakthrough-description lookup keyed by realm name and stage. Misses
/// fall back to [`generic_breakthrough`].
pub fn breakthrough_description(realm: &str, stage: &str) -> Option<&'static str> {
    match (realm, stage) {
        ("炼气", "初期") => Some("引气入体，初窥修行门径"),
        ("炼气", "中期") => Some("灵气渐盈，经脉初通"),
        ("炼气", "后期") => Some("气感圆融，筑基有望"),
        ("炼气", "圆满") => Some("炼气圆满，只待筑基"),
        ("筑基", "初期") => Some("筑下道基，脱胎换骨"),
        ("筑基", "中期") => Some("道基渐固，灵力浑厚"),
        ("筑基", "后期") => Some("道基稳固，金丹可期"),
        ("筑基", "圆满") => Some("筑基圆满，凝丹在即"),
        ("金丹", "初期") => Some("金丹初成，道途始定"),
        ("金丹", "中期") => Some("丹光内蕴，法力精纯"),
        ("金丹", "后期") => Some("金丹大成，元婴可望"),
        ("金丹", "圆满") => Some("金丹圆满，孕育元婴"),
        ("元婴", "初期") => Some("元婴出窍，神游太虚"),
        ("元婴", "圆满") => Some("元婴圆满，神合天地"),
        ("化神", "初期") => Some("炼神返虚，道心通明"),
        _ => None,
    }
}

pub fn generic_breakthrough(realm: &str) -> String {
    format!("感悟{realm}境界，提升修为")
}
