//! Cross-boundary contracts for the save-state consistency engine:
//! patch wire format, audit reports, calendar time, and the closed
//! vocabularies enforced by repair.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCHEMA_VERSION_V3: u64 = 3;

/// The five top-level domains of a canonical (schema v3) document.
/// Field names are persisted identifiers and must never change.
pub const DOMAIN_METADATA: &str = "元数据";
pub const DOMAIN_CHARACTER: &str = "角色";
pub const DOMAIN_SOCIAL: &str = "社交";
pub const DOMAIN_WORLD: &str = "世界";
pub const DOMAIN_SYSTEM: &str = "系统";

pub const DOMAIN_KEYS: [&str; 5] = [
    DOMAIN_METADATA,
    DOMAIN_CHARACTER,
    DOMAIN_SOCIAL,
    DOMAIN_WORLD,
    DOMAIN_SYSTEM,
];

/// Historical top-level keys from pre-v3 save layouts. Any of these at the
/// document root marks the save as legacy.
pub const LEGACY_ROOT_KEYS: [&str; 20] = [
    "状态",
    "玩家角色状态",
    "玩家角色信息",
    "角色基础信息",
    "修行状态",
    "状态效果",
    "叙事历史",
    "对话历史",
    "任务系统",
    "宗门系统",
    "世界信息",
    "人物关系",
    "装备栏",
    "游戏时间",
    "时间",
    "背包",
    "三千大道",
    "修炼功法",
    "掌握技能",
    "身体部位开发",
];

/// Map keys starting with any of these prefixes are internal annotations
/// and never survive migration.
pub const RESERVED_ANNOTATION_PREFIXES: [&str; 2] = ["$__", "__"];

/// Durations at or beyond this many minutes (or negative) mark a status
/// effect as permanent.
pub const PERMANENT_DURATION_MINUTES: i64 = 99_999;

pub const MINUTES_PER_HOUR: i64 = 60;
pub const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;
pub const MINUTES_PER_MONTH: i64 = 30 * MINUTES_PER_DAY;
pub const MINUTES_PER_YEAR: i64 = 365 * MINUTES_PER_DAY;

/// Approximate in-fiction calendar instant. 30-day months, 365-day years;
/// only relative arithmetic is meaningful.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameTime {
    #[serde(rename = "年")]
    pub year: i64,
    #[serde(rename = "月")]
    pub month: i64,
    #[serde(rename = "日")]
    pub day: i64,
    #[serde(rename = "时", default)]
    pub hour: i64,
    #[serde(rename = "分", default)]
    pub minute: i64,
}

impl GameTime {
    /// Fixed epoch every missing clock sub-field defaults to.
    pub fn epoch() -> Self {
        Self {
            year: 1000,
            month: 1,
            day: 1,
            hour: 8,
            minute: 0,
        }
    }

    /// Saturating: a corrupt year count must not take the whole turn down.
    pub fn total_minutes(&self) -> i64 {
        self.year
            .saturating_mul(MINUTES_PER_YEAR)
            .saturating_add(self.month.saturating_mul(MINUTES_PER_MONTH))
            .saturating_add(self.day.saturating_mul(MINUTES_PER_DAY))
            .saturating_add(self.hour.saturating_mul(MINUTES_PER_HOUR))
            .saturating_add(self.minute)
    }

    pub fn minutes_since(&self, earlier: &GameTime) -> i64 {
        self.total_minutes().saturating_sub(earlier.total_minutes())
    }
}

impl Default for GameTime {
    fn default() -> Self {
        Self::epoch()
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}年{}月{}日 {:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

/// `{current, max}` pair used for vitals. Repair guarantees
/// `0 <= current <= max`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValuePair {
    #[serde(rename = "当前")]
    pub current: i64,
    #[serde(rename = "上限")]
    pub max: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PatchAction {
    #[serde(rename = "set")]
    Set,
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "push")]
    Push,
    #[serde(rename = "delete")]
    Delete,
    #[serde(rename = "pull")]
    Pull,
}

impl PatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Add => "add",
            Self::Push => "push",
            Self::Delete => "delete",
            Self::Pull => "pull",
        }
    }
}

/// One addressed mutation instruction, as emitted by the AI-response
/// parser. `key` is a dot-separated path into the canonical document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchCommand {
    pub action: PatchAction,
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl PatchCommand {
    pub fn new(action: PatchAction, key: impl Into<String>, value: Value) -> Self {
        Self {
            action,
            key: key.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    ReadOnlyPath,
    TypeMismatch,
    InvalidPath,
}

/// Per-command audit record; rejected commands never abort the batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandOutcome {
    pub index: usize,
    pub action: PatchAction,
    pub key: String,
    pub applied: bool,
    pub rejection: Option<RejectionKind>,
    pub reason: Option<String>,
}

impl CommandOutcome {
    pub fn applied(index: usize, command: &PatchCommand) -> Self {
        Self {
            index,
            action: command.action,
            key: command.key.clone(),
            applied: true,
            rejection: None,
            reason: None,
        }
    }

    pub fn rejected(
        index: usize,
        command: &PatchCommand,
        kind: RejectionKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            index,
            action: command.action,
            key: command.key.clone(),
            applied: false,
            rejection: Some(kind),
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionIssue {
    InvalidStructure,
    MissingDomains,
    LegacyRootKey,
    FlatLayout,
}

/// Output of the legacy detector. Pure data; detection has no side effects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DetectionReport {
    pub needs_migration: bool,
    pub issues: Vec<DetectionIssue>,
    pub legacy_keys_found: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MigrationReport {
    pub legacy_keys_found: Vec<String>,
    pub removed_legacy_keys: Vec<String>,
    pub warnings: Vec<String>,
}

/// Everything the load pipeline has to say about one document: whether it
/// migrated, what migration saw, and what repair had to fix afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub migrated: bool,
    pub migration: Option<MigrationReport>,
    pub repair_warnings: Vec<String>,
}

/// Result surface of one simulation turn: command audit, repair warnings,
/// and the names of effects that expired when the clock advanced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TurnReport {
    pub outcomes: Vec<CommandOutcome>,
    pub repair_warnings: Vec<String>,
    pub expired_effects: Vec<String>,
}

impl TurnReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.applied).count()
    }

    pub fn rejected_count(&self) -> usize {
        self.outcomes.len() - self.applied_count()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EffectKind {
    #[serde(rename = "增益")]
    Buff,
    #[serde(rename = "减益")]
    Debuff,
}

impl EffectKind {
    pub const ALL: [&'static str; 2] = ["增益", "减益"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buff => "增益",
            Self::Debuff => "减益",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ItemKind {
    #[serde(rename = "装备")]
    Equipment,
    #[serde(rename = "功法")]
    Technique,
    #[serde(rename = "丹药")]
    Pill,
    #[serde(rename = "材料")]
    Material,
    #[serde(rename = "其他")]
    Other,
}

impl ItemKind {
    pub const ALL: [&'static str; 5] = ["装备", "功法", "丹药", "材料", "其他"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equipment => "装备",
            Self::Technique => "功法",
            Self::Pill => "丹药",
            Self::Material => "材料",
            Self::Other => "其他",
        }
    }
}

/// Seven-tier item quality vocabulary, best first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QualityTier {
    #[serde(rename = "神")]
    Divine,
    #[serde(rename = "仙")]
    Immortal,
    #[serde(rename = "天")]
    Heaven,
    #[serde(rename = "地")]
    Earth,
    #[serde(rename = "玄")]
    Profound,
    #[serde(rename = "黄")]
    Yellow,
    #[serde(rename = "凡")]
    Mortal,
}

impl QualityTier {
    pub const ALL: [&'static str; 7] = ["神", "仙", "天", "地", "玄", "黄", "凡"];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QuestStatus {
    #[serde(rename = "进行中")]
    InProgress,
    #[serde(rename = "已完成")]
    Completed,
    #[serde(rename = "已失败")]
    Failed,
}

impl QuestStatus {
    pub const ALL: [&'static str; 3] = ["进行中", "已完成", "已失败"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "进行中",
            Self::Completed => "已完成",
            Self::Failed => "已失败",
        }
    }
}

/// Realm stage vocabulary. The empty stage is only valid for the base
/// non-cultivator tier.
pub const REALM_STAGES: [&str; 6] = ["", "初期", "中期", "后期", "圆满", "极境"];

/// The four canonical equipment slots under `角色.装备`.
pub const EQUIPMENT_SLOTS: [&str; 4] = ["武器", "防具", "饰品", "法宝"];

/// Canonical status effect shape after normalization. Legacy free-text
/// durations are folded into `duration_minutes` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusEffect {
    #[serde(rename = "名称")]
    pub name: String,
    #[serde(rename = "类型")]
    pub kind: EffectKind,
    #[serde(rename = "创建时间", default)]
    pub created_at: GameTime,
    #[serde(rename = "持续时间")]
    pub duration_minutes: i64,
    #[serde(rename = "描述", default)]
    pub description: String,
    #[serde(rename = "强度", skip_serializing_if = "Option::is_none", default)]
    pub intensity: Option<i64>,
    #[serde(rename = "来源", skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
}

impl StatusEffect {
    pub fn is_permanent(&self) -> bool {
        self.duration_minutes < 0 || self.duration_minutes >= PERMANENT_DURATION_MINUTES
    }
}

/// One-way UI record for an active effect; never read back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectDisplay {
    #[serde(rename = "名称")]
    pub name: String,
    #[serde(rename = "类型")]
    pub kind: String,
    #[serde(rename = "描述")]
    pub description: String,
    #[serde(rename = "剩余时间")]
    pub remaining: String,
    #[serde(rename = "强度", skip_serializing_if = "Option::is_none")]
    pub intensity: Option<i64>,
    #[serde(rename = "来源", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Tunable policy knobs for the engine. Defaults cover every field so a
/// zero-config engine is always valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Path prefixes rejected for direct mutation commands.
    #[serde(default)]
    pub read_only_prefixes: Vec<String>,
    /// Reject writes to `名称` leaves under mastered skills.
    pub protect_mastered_skill_names: bool,
    pub favor_min: i64,
    pub favor_max: i64,
    pub permanent_duration_minutes: i64,
    /// Narrative history entries kept when repair trims the log.
    pub narrative_history_limit: usize,
    pub innate_attribute_min: i64,
    pub innate_attribute_max: i64,
    pub innate_attribute_default: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_only_prefixes: vec![
                DOMAIN_SYSTEM.to_string(),
                "角色.装备".to_string(),
                "角色.身份.姓名".to_string(),
                "角色.身份.性别".to_string(),
                "角色.身份.出生日期".to_string(),
                "角色.身份.种族".to_string(),
                "角色.身份.先天六维".to_string(),
            ],
            protect_mastered_skill_names: true,
            favor_min: -100,
            favor_max: 100,
            permanent_duration_minutes: PERMANENT_DURATION_MINUTES,
            narrative_history_limit: 200,
            innate_attribute_min: 1,
            innate_attribute_max: 10,
            innate_attribute_default: 5,
        }
    }
}
