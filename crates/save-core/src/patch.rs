//! Command patch applier. Commands arrive as a batch; each one is checked
//! against the write policy, applied independently, and audited. A rejected
//! command never aborts the rest of the batch.

use contracts::{CommandOutcome, EngineConfig, PatchAction, PatchCommand, RejectionKind};
use serde_json::Value;

use crate::{path, value};

/// Applies a batch in order, mutating `document` in place. Returns one
/// outcome per command, index-aligned with the input.
pub fn apply_batch(
    document: &mut Value,
    commands: &[PatchCommand],
    config: &EngineConfig,
) -> Vec<CommandOutcome> {
    commands
        .iter()
        .enumerate()
        .map(|(index, command)| apply_one(document, index, command, config))
        .collect()
}

pub fn apply_one(
    document: &mut Value,
    index: usize,
    command: &PatchCommand,
    config: &EngineConfig,
) -> CommandOutcome {
    if let Err(err) = path::parse_path(&command.key) {
        return CommandOutcome::rejected(index, command, RejectionKind::InvalidPath, err.to_string());
    }
    if let Some(prefix) = read_only_violation(&command.key, config) {
        return CommandOutcome::rejected(
            index,
            command,
            RejectionKind::ReadOnlyPath,
            format!("path is under read-only prefix {prefix}"),
        );
    }

    let result = match command.action {
        PatchAction::Set => apply_set(document, command),
        PatchAction::Add => apply_add(document, command),
        PatchAction::Push => apply_push(document, command),
        PatchAction::Delete => apply_delete(document, command),
        PatchAction::Pull => apply_pull(document, command),
    };
    match result {
        Ok(()) => CommandOutcome::applied(index, command),
        Err((kind, reason)) => CommandOutcome::rejected(index, command, kind, reason),
    }
}

type ApplyResult = Result<(), (RejectionKind, String)>;

/// Returns the policy prefix a write to `key` would violate, if any.
/// Prefix matching is segment-aware: `角色.装` does not shadow `角色.装备`.
fn read_only_violation<'a>(key: &str, config: &'a EngineConfig) -> Option<&'a str> {
    for prefix in &config.read_only_prefixes {
        if key == prefix || key.starts_with(&format!("{prefix}.")) {
            return Some(prefix);
        }
    }
    if config.protect_mastered_skill_names && is_mastered_skill_name(key) {
        return Some("角色.掌握技能[].名称");
    }
    None
}

/// `角色.掌握技能.<index>.名称` leaves: renaming a learned skill breaks the
/// link between narration and the skill registry, so only whole-entry
/// operations may touch them.
fn is_mastered_skill_name(key: &str) -> bool {
    let Ok(segments) = path::parse_path(key) else {
        return false;
    };
    segments.len() == 4
        && segments[0] == "角色"
        && segments[1] == "掌握技能"
        && segments[2].parse::<usize>().is_ok()
        && segments[3] == "名称"
}

fn apply_set(document: &mut Value, command: &PatchCommand) -> ApplyResult {
    path::set(document, &command.key, command.value.clone())
        .map_err(|err| (RejectionKind::InvalidPath, err.to_string()))
}

/// Numeric delta, truncated to integers. An absent target counts as 0 and
/// the write creates it; a present non-numeric target is rejected.
fn apply_add(document: &mut Value, command: &PatchCommand) -> ApplyResult {
    let Some(delta) = value::as_i64_lenient(&command.value) else {
        return Err((
            RejectionKind::TypeMismatch,
            "add value must be numeric".to_string(),
        ));
    };
    match path::get_mut(document, &command.key) {
        Some(target) => {
            let Some(current) = value::as_i64_lenient(target) else {
                return Err((
                    RejectionKind::TypeMismatch,
                    "add target is not numeric".to_string(),
                ));
            };
            *target = Value::from(current.saturating_add(delta));
            Ok(())
        }
        None => path::set(document, &command.key, Value::from(delta))
            .map_err(|err| (RejectionKind::InvalidPath, err.to_string())),
    }
}

fn apply_push(document: &mut Value, command: &PatchCommand) -> ApplyResult {
    path::push(document, &command.key, command.value.clone()).map_err(|err| {
        let kind = match err {
            path::PathError::NotAContainer { .. } => RejectionKind::TypeMismatch,
            _ => RejectionKind::InvalidPath,
        };
        (kind, err.to_string())
    })
}

/// Deleting an absent path is an applied no-op: the goal state already
/// holds.
fn apply_delete(document: &mut Value, command: &PatchCommand) -> ApplyResult {
    path::delete(document, &command.key)
        .map(|_| ())
        .map_err(|err| (RejectionKind::InvalidPath, err.to_string()))
}

/// Removes the first list element matching the needle; no match is an
/// applied no-op for the same reason as delete.
fn apply_pull(document: &mut Value, command: &PatchCommand) -> ApplyResult {
    let Some(target) = path::get_mut(document, &command.key) else {
        return Err((
            RejectionKind::InvalidPath,
            "pull target does not exist".to_string(),
        ));
    };
    let Some(list) = target.as_array_mut() else {
        return Err((
            RejectionKind::TypeMismatch,
            "pull target is not a list".to_string(),
        ));
    };
    if let Some(position) = list.iter().position(|entry| pull_matches(entry, &command.value)) {
        list.remove(position);
    }
    Ok(())
}

/// Object needles match by identity (`编号`, then `名称`); everything else
/// matches by deep equality.
fn pull_matches(entry: &Value, needle: &Value) -> bool {
    if let (Some(entry_map), Some(needle_map)) = (entry.as_object(), needle.as_object()) {
        for id_key in ["编号", "名称"] {
            if let Some(wanted) = needle_map.get(id_key).and_then(Value::as_str) {
                return entry_map.get(id_key).and_then(Value::as_str) == Some(wanted);
            }
        }
    }
    entry == needle
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PatchAction;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "角色": {
                "属性": { "气血": { "当前": 80, "上限": 100 } },
                "背包": { "灵石": { "下品": 10 } },
                "装备": { "武器": null },
                "掌握技能": [ { "名称": "御剑术", "等级": 3 } ],
                "效果": []
            },
            "社交": {
                "任务系统": { "任务列表": [ { "编号": "q1", "名称": "入门试炼" } ] }
            },
            "系统": { "缓存": {} }
        })
    }

    fn run(document: &mut Value, action: PatchAction, key: &str, value: Value) -> CommandOutcome {
        let command = PatchCommand::new(action, key, value);
        apply_one(document, 0, &command, &EngineConfig::default())
    }

    #[test]
    fn set_writes_through_missing_intermediates() {
        let mut document = doc();
        let outcome = run(&mut document, PatchAction::Set, "角色.修炼.状态", json!("闭关"));
        assert!(outcome.applied);
        assert_eq!(document["角色"]["修炼"]["状态"], json!("闭关"));
    }

    #[test]
    fn add_requires_numbers_on_both_sides() {
        let mut document = doc();
        let ok = run(
            &mut document,
            PatchAction::Add,
            "角色.背包.灵石.下品",
            json!(5),
        );
        assert!(ok.applied);
        assert_eq!(document["角色"]["背包"]["灵石"]["下品"], json!(15));

        let bad = run(
            &mut document,
            PatchAction::Add,
            "角色.背包.灵石.下品",
            json!("很多"),
        );
        assert_eq!(bad.rejection, Some(RejectionKind::TypeMismatch));
        assert_eq!(document["角色"]["背包"]["灵石"]["下品"], json!(15));

        let onto_object = run(&mut document, PatchAction::Add, "角色.背包", json!(1));
        assert_eq!(onto_object.rejection, Some(RejectionKind::TypeMismatch));
    }

    #[test]
    fn add_to_absent_path_starts_from_zero() {
        let mut document = doc();
        let outcome = run(&mut document, PatchAction::Add, "角色.修炼.累计感悟", json!(5));
        assert!(outcome.applied);
        assert_eq!(document["角色"]["修炼"]["累计感悟"], json!(5));

        let again = run(&mut document, PatchAction::Add, "角色.修炼.累计感悟", json!(2));
        assert!(again.applied);
        assert_eq!(document["角色"]["修炼"]["累计感悟"], json!(7));
    }

    #[test]
    fn add_truncates_fractional_deltas() {
        let mut document = doc();
        let outcome = run(
            &mut document,
            PatchAction::Add,
            "角色.背包.灵石.下品",
            json!(2.9),
        );
        assert!(outcome.applied);
        assert_eq!(document["角色"]["背包"]["灵石"]["下品"], json!(12));
    }

    #[test]
    fn read_only_prefix_blocks_every_action() {
        let mut document = doc();
        for action in [
            PatchAction::Set,
            PatchAction::Add,
            PatchAction::Push,
            PatchAction::Delete,
            PatchAction::Pull,
        ] {
            let outcome = run(&mut document, action, "系统.缓存.x", json!(1));
            assert_eq!(outcome.rejection, Some(RejectionKind::ReadOnlyPath));
        }
        assert_eq!(document["系统"]["缓存"], json!({}));
    }

    #[test]
    fn equipment_prefix_is_segment_aware() {
        let mut document = doc();
        let blocked = run(&mut document, PatchAction::Set, "角色.装备.武器", json!("铁剑"));
        assert_eq!(blocked.rejection, Some(RejectionKind::ReadOnlyPath));

        // A sibling key sharing the text prefix is not covered.
        let allowed = run(&mut document, PatchAction::Set, "角色.装备栏位说明", json!("x"));
        assert!(allowed.applied);
    }

    #[test]
    fn mastered_skill_name_leaf_is_protected() {
        let mut document = doc();
        let name = run(
            &mut document,
            PatchAction::Set,
            "角色.掌握技能.0.名称",
            json!("改名"),
        );
        assert_eq!(name.rejection, Some(RejectionKind::ReadOnlyPath));

        let level = run(&mut document, PatchAction::Set, "角色.掌握技能.0.等级", json!(4));
        assert!(level.applied);
    }

    #[test]
    fn pull_matches_objects_by_id() {
        let mut document = doc();
        let outcome = run(
            &mut document,
            PatchAction::Pull,
            "社交.任务系统.任务列表",
            json!({ "编号": "q1" }),
        );
        assert!(outcome.applied);
        assert_eq!(document["社交"]["任务系统"]["任务列表"], json!([]));

        // No match stays an applied no-op.
        let again = run(
            &mut document,
            PatchAction::Pull,
            "社交.任务系统.任务列表",
            json!({ "编号": "q1" }),
        );
        assert!(again.applied);
    }

    #[test]
    fn push_onto_scalar_is_a_type_mismatch() {
        let mut document = doc();
        let outcome = run(
            &mut document,
            PatchAction::Push,
            "角色.属性.气血.当前",
            json!(1),
        );
        assert_eq!(outcome.rejection, Some(RejectionKind::TypeMismatch));
    }

    #[test]
    fn delete_of_absent_path_is_a_no_op() {
        let mut document = doc();
        let outcome = run(&mut document, PatchAction::Delete, "角色.不存在", json!(null));
        assert!(outcome.applied);
    }

    #[test]
    fn batch_continues_past_rejections() {
        let mut document = doc();
        let commands = vec![
            PatchCommand::new(PatchAction::Set, "系统.缓存.x", json!(1)),
            PatchCommand::new(PatchAction::Set, "角色.位置.名称", json!("青云峰")),
        ];
        let outcomes = apply_batch(&mut document, &commands, &EngineConfig::default());
        assert!(!outcomes[0].applied);
        assert!(outcomes[1].applied);
        assert_eq!(document["角色"]["位置"]["名称"], json!("青云峰"));
    }
}
