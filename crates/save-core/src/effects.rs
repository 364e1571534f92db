//! Status effect lifecycle: legacy duration normalization, expiry against
//! the in-fiction clock, and display formatting. All pure functions over
//! the `角色.效果` list.

use contracts::{
    EffectDisplay, EffectKind, GameTime, StatusEffect, MINUTES_PER_DAY, MINUTES_PER_HOUR,
    MINUTES_PER_MONTH, MINUTES_PER_YEAR, PERMANENT_DURATION_MINUTES,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::migrate::coerce_game_time;
use crate::value::as_i64_lenient;

/// Fixed grammar of legacy free-text durations: a sequence of
/// number-plus-unit tokens, e.g. `2小时30分钟`, `3天`, `1年2个月`.
static DURATION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(年|个月|月|天|日|小时|时|分钟|分)").expect("duration pattern compiles"));

/// Parses a legacy duration string into minutes. Returns `None` when no
/// token is recognizable; callers decide the fallback.
pub fn parse_legacy_duration(text: &str) -> Option<i64> {
    let mut minutes = 0_i64;
    let mut matched = false;
    for captures in DURATION_TOKEN.captures_iter(text) {
        let amount: i64 = captures[1].parse().ok()?;
        let unit = match &captures[2] {
            "年" => MINUTES_PER_YEAR,
            "个月" | "月" => MINUTES_PER_MONTH,
            "天" | "日" => MINUTES_PER_DAY,
            "小时" | "时" => MINUTES_PER_HOUR,
            _ => 1,
        };
        minutes = minutes.saturating_add(amount.saturating_mul(unit));
        matched = true;
    }
    matched.then_some(minutes)
}

/// Inverse of the duration grammar, for display. Permanent durations
/// render as `永久`; sub-minute remainders as `不足1分钟`.
pub fn format_duration(minutes: i64) -> String {
    if minutes < 0 || minutes >= PERMANENT_DURATION_MINUTES {
        return "永久".to_string();
    }
    if minutes == 0 {
        return "不足1分钟".to_string();
    }
    let units = [
        (MINUTES_PER_YEAR, "年"),
        (MINUTES_PER_MONTH, "个月"),
        (MINUTES_PER_DAY, "天"),
        (MINUTES_PER_HOUR, "小时"),
        (1, "分钟"),
    ];
    let mut rest = minutes;
    let mut rendered = String::new();
    for (size, label) in units {
        let amount = rest / size;
        rest %= size;
        if amount > 0 {
            rendered.push_str(&format!("{amount}{label}"));
        }
    }
    rendered
}

/// Normalizes one effect entry in place: canonical `创建时间`, numeric
/// `持续时间` (parsing a legacy free-text `剩余时间` exactly once), legacy
/// clock fields dropped. Returns `false` for entries too malformed to
/// keep (no usable name).
pub fn normalize_effect(effect: &mut Value, now: &GameTime) -> bool {
    let Some(map) = effect.as_object_mut() else {
        return false;
    };
    let name_ok = map
        .get("名称")
        .and_then(Value::as_str)
        .map(|name| !name.trim().is_empty())
        .unwrap_or(false);
    if !name_ok {
        return false;
    }

    // Already-numeric durations pass through unchanged (idempotence).
    let duration = match map.get("持续时间").and_then(as_i64_lenient) {
        Some(minutes) => minutes,
        None => map
            .get("剩余时间")
            .and_then(Value::as_str)
            .and_then(parse_legacy_duration)
            .unwrap_or(PERMANENT_DURATION_MINUTES),
    };
    map.insert("持续时间".to_string(), json!(duration));
    map.remove("剩余时间");

    // A missing creation stamp means the effect is new; backdating it to
    // the epoch would expire it on the next sweep.
    let created = match map.get("创建时间").or_else(|| map.get("时间")) {
        Some(stamp) => coerce_game_time(Some(stamp)),
        None => *now,
    };
    map.remove("时间");
    map.insert("创建时间".to_string(), json!(created));

    let kind = match map.get("类型").and_then(Value::as_str) {
        Some(kind) if EffectKind::ALL.contains(&kind) => kind.to_string(),
        _ => EffectKind::Debuff.as_str().to_string(),
    };
    map.insert("类型".to_string(), json!(kind));
    if !matches!(map.get("描述"), Some(Value::String(_))) {
        map.insert("描述".to_string(), json!(""));
    }
    true
}

fn effect_expired(effect: &Value, now_minutes: i64) -> Option<bool> {
    let duration = effect.get("持续时间").and_then(as_i64_lenient)?;
    if duration < 0 || duration >= PERMANENT_DURATION_MINUTES {
        return Some(false);
    }
    let created = coerce_game_time(effect.get("创建时间"));
    Some(now_minutes.saturating_sub(created.total_minutes()) >= duration)
}

/// Removes expired effects from `角色.效果` and returns their names for
/// notification. Malformed entries are skipped with a warning, never a
/// panic; entries that fail normalization outright are dropped.
pub fn sweep_expired(document: &mut Value, now: &GameTime) -> (Vec<String>, Vec<String>) {
    let mut expired = Vec::new();
    let mut warnings = Vec::new();

    let Some(list) = document
        .get_mut("角色")
        .and_then(|character| character.get_mut("效果"))
        .and_then(Value::as_array_mut)
    else {
        return (expired, warnings);
    };

    let now_minutes = now.total_minutes();
    let mut kept = Vec::with_capacity(list.len());
    for mut effect in list.drain(..) {
        if !normalize_effect(&mut effect, now) {
            warnings.push("角色.效果: dropped malformed effect entry".to_string());
            continue;
        }
        match effect_expired(&effect, now_minutes) {
            Some(true) => {
                let name = effect
                    .get("名称")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                expired.push(name);
            }
            Some(false) => kept.push(effect),
            None => {
                warnings.push("角色.效果: effect skipped, unreadable duration".to_string());
                kept.push(effect);
            }
        }
    }
    *list = kept;

    (expired, warnings)
}

/// Builds the one-way UI records for currently active effects.
pub fn effect_displays(document: &Value, now: &GameTime) -> Vec<EffectDisplay> {
    let Some(list) = document
        .get("角色")
        .and_then(|character| character.get("效果"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let now_minutes = now.total_minutes();
    list.iter()
        .filter_map(|raw| {
            let effect: StatusEffect = serde_json::from_value(raw.clone()).ok()?;
            let remaining = if effect.is_permanent() {
                "永久".to_string()
            } else {
                let created = effect.created_at.total_minutes();
                let left = created
                    .saturating_add(effect.duration_minutes)
                    .saturating_sub(now_minutes)
                    .max(0);
                format_duration(left)
            };
            Some(EffectDisplay {
                name: effect.name,
                kind: effect.kind.as_str().to_string(),
                description: effect.description,
                remaining,
                intensity: effect.intensity,
                source: effect.source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(minute_offset: i64) -> GameTime {
        let mut time = GameTime::epoch();
        time.minute += minute_offset;
        time
    }

    #[test]
    fn legacy_duration_grammar_sums_tokens() {
        assert_eq!(parse_legacy_duration("2小时30分钟"), Some(150));
        assert_eq!(parse_legacy_duration("3天"), Some(3 * MINUTES_PER_DAY));
        assert_eq!(
            parse_legacy_duration("1年2个月"),
            Some(MINUTES_PER_YEAR + 2 * MINUTES_PER_MONTH)
        );
        assert_eq!(parse_legacy_duration("45分"), Some(45));
        assert_eq!(parse_legacy_duration("稍后"), None);
    }

    #[test]
    fn format_duration_inverts_the_grammar() {
        assert_eq!(format_duration(125), "2小时5分钟");
        assert_eq!(format_duration(MINUTES_PER_DAY + 30), "1天30分钟");
        assert_eq!(format_duration(0), "不足1分钟");
        assert_eq!(format_duration(-5), "永久");
        assert_eq!(format_duration(PERMANENT_DURATION_MINUTES), "永久");
    }

    #[test]
    fn legacy_effect_normalizes_once_then_passes_through() {
        let now = GameTime::epoch();
        let mut effect = json!({
            "名称": "灵力紊乱",
            "时间": "1000年1月1日 8:00",
            "剩余时间": "2小时30分钟",
        });
        assert!(normalize_effect(&mut effect, &now));
        assert_eq!(effect["持续时间"], 150);
        assert!(effect.get("剩余时间").is_none());
        assert!(effect.get("时间").is_none());
        assert_eq!(effect["创建时间"]["年"], 1000);
        assert_eq!(effect["类型"], "减益");

        let snapshot = effect.clone();
        assert!(normalize_effect(&mut effect, &clock(500)));
        assert_eq!(effect, snapshot, "normalization must be idempotent");
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let make_doc = || {
            json!({
                "角色": { "效果": [{
                    "名称": "护体罡气",
                    "类型": "增益",
                    "创建时间": json!(GameTime::epoch()),
                    "持续时间": 60,
                    "描述": "",
                }]}
            })
        };

        let mut active = make_doc();
        let (expired, _) = sweep_expired(&mut active, &clock(59));
        assert!(expired.is_empty());
        assert_eq!(active["角色"]["效果"].as_array().unwrap().len(), 1);

        let mut done = make_doc();
        let (expired, _) = sweep_expired(&mut done, &clock(60));
        assert_eq!(expired, vec!["护体罡气"]);
        assert!(done["角色"]["效果"].as_array().unwrap().is_empty());
    }

    #[test]
    fn permanent_effects_are_exempt_from_expiry() {
        let mut doc = json!({
            "角色": { "效果": [
                { "名称": "道种", "类型": "增益", "持续时间": -1 },
                { "名称": "心魔", "类型": "减益", "持续时间": PERMANENT_DURATION_MINUTES },
            ]}
        });
        let (expired, warnings) = sweep_expired(&mut doc, &clock(1_000_000));
        assert!(expired.is_empty());
        assert!(warnings.is_empty());
        assert_eq!(doc["角色"]["效果"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn malformed_entries_are_dropped_with_warning_not_panic() {
        let mut doc = json!({
            "角色": { "效果": [
                "不是对象",
                { "类型": "增益" },
                { "名称": "有效", "类型": "增益", "持续时间": 99 },
            ]}
        });
        let (expired, warnings) = sweep_expired(&mut doc, &GameTime::epoch());
        assert!(expired.is_empty());
        assert_eq!(warnings.len(), 2);
        assert_eq!(doc["角色"]["效果"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn displays_render_remaining_time() {
        let doc = json!({
            "角色": { "效果": [{
                "名称": "灵力护体",
                "类型": "增益",
                "创建时间": json!(GameTime::epoch()),
                "持续时间": 125,
                "描述": "护体灵罩",
                "强度": 2,
            }]}
        });
        let displays = effect_displays(&doc, &GameTime::epoch());
        assert_eq!(displays.len(), 1);
        assert_eq!(displays[0].remaining, "2小时5分钟");
        assert_eq!(displays[0].kind, "增益");
        assert_eq!(displays[0].intensity, Some(2));
    }
}
