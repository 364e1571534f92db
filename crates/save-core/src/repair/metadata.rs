use contracts::MINUTES_PER_HOUR;

use super::*;

impl Repairer<'_> {
    pub(super) fn repair_metadata(&mut self, root: &mut Map<String, Value>) {
        let meta = object_field(
            &mut self.log,
            root,
            "元数据",
            "元数据",
            defaults::default_metadata(0),
        );

        // The version field is stamped, never trusted.
        if meta.get("版本").and_then(as_i64_lenient) != Some(SCHEMA_VERSION_V3 as i64) {
            meta.insert("版本".to_string(), json!(SCHEMA_VERSION_V3));
        }
        let slot = non_empty_string(meta.get("存档编号")).unwrap_or_else(|| "save_001".to_string());
        meta.insert("存档编号".to_string(), json!(slot));
        let name = non_empty_string(meta.get("存档名称")).unwrap_or_else(|| "新的征程".to_string());
        meta.insert("存档名称".to_string(), json!(name));
        for key in ["创建时间", "更新时间", "游玩秒数"] {
            let seconds = non_negative(meta.get(key), 0);
            meta.insert(key.to_string(), json!(seconds));
        }

        let mut clock = coerce_game_time(meta.get("时间"));
        normalize_clock(&mut self.log, &mut clock);
        meta.insert("时间".to_string(), json!(clock));
    }
}

/// Clamps each calendar component into its legal range: 12 months of 30
/// days, so out-of-range components from hand-edited saves are pulled back
/// rather than carried over into duration arithmetic.
fn normalize_clock(log: &mut RepairLog, clock: &mut GameTime) {
    let original = *clock;
    clock.year = clock.year.max(0);
    clock.month = clock.month.clamp(1, 12);
    clock.day = clock.day.clamp(1, 30);
    clock.hour = clock.hour.clamp(0, 23);
    clock.minute = clock.minute.clamp(0, MINUTES_PER_HOUR - 1);
    if *clock != original {
        log.warn("元数据.时间", "calendar component out of range, clamped");
    }
}
