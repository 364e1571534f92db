use contracts::QuestStatus;

use super::*;

impl Repairer<'_> {
    fn social<'m>(&mut self, root: &'m mut Map<String, Value>) -> &'m mut Map<String, Value> {
        object_field(&mut self.log, root, "社交", "社交", defaults::default_social())
    }

    /// Each NPC is repaired independently through the same rules as the
    /// player-facing maps: no name, no entry.
    pub(super) fn repair_relationships(&mut self, root: &mut Map<String, Value>) {
        let (favor_min, favor_max) = (self.config.favor_min, self.config.favor_max);
        let social = self.social(root);
        let relationships = object_field(
            &mut self.log,
            social,
            "社交.人物关系",
            "人物关系",
            json!({}),
        );
        let entries: Vec<(String, Value)> = std::mem::take(relationships).into_iter().collect();
        for (key, mut npc) in entries {
            if repair_npc(&mut self.log, &key, &mut npc, favor_min, favor_max) {
                relationships.insert(key, npc);
            } else {
                self.log
                    .warn("社交.人物关系", "dropped relationship entry without identity");
            }
        }
    }

    pub(super) fn repair_memory(&mut self, root: &mut Map<String, Value>) {
        let social = self.social(root);
        let memory = object_field(
            &mut self.log,
            social,
            "社交.记忆",
            "记忆",
            defaults::default_memory(),
        );
        for tier in ["短期", "中期", "长期"] {
            array_field(&mut self.log, memory, &format!("社交.记忆.{tier}"), tier);
        }
    }

    pub(super) fn repair_sect(&mut self, root: &mut Map<String, Value>) {
        let social = self.social(root);
        match social.get_mut("宗门") {
            None => {
                social.insert("宗门".to_string(), Value::Null);
            }
            Some(Value::Null) => {}
            Some(Value::Object(sect)) => {
                if non_empty_string(sect.get("名称")).is_none() {
                    self.log.warn("社交.宗门", "sect lacks a name, cleared");
                    social.insert("宗门".to_string(), Value::Null);
                } else {
                    let position =
                        non_empty_string(sect.get("职位")).unwrap_or_else(|| "外门弟子".to_string());
                    sect.insert("职位".to_string(), json!(position));
                    let contribution = non_negative(sect.get("贡献"), 0);
                    sect.insert("贡献".to_string(), json!(contribution));
                }
            }
            Some(_) => {
                self.log.warn("社交.宗门", "wrong shape, cleared");
                social.insert("宗门".to_string(), Value::Null);
            }
        }
    }

    pub(super) fn repair_quests(&mut self, root: &mut Map<String, Value>) {
        let social = self.social(root);
        let quests = object_field(
            &mut self.log,
            social,
            "社交.任务系统",
            "任务系统",
            defaults::default_quest_system(),
        );
        let list = array_field(&mut self.log, quests, "社交.任务系统.任务列表", "任务列表");
        let mut kept = Vec::with_capacity(list.len());
        for mut quest in list.drain(..) {
            if repair_quest(&mut quest) {
                kept.push(quest);
            } else {
                self.log
                    .warn("社交.任务系统.任务列表", "dropped quest entry without id");
            }
        }
        *list = kept;
    }
}

fn repair_npc(
    log: &mut RepairLog,
    key: &str,
    npc: &mut Value,
    favor_min: i64,
    favor_max: i64,
) -> bool {
    let Some(map) = npc.as_object_mut() else {
        return false;
    };
    let Some(name) = non_empty_string(map.get("姓名")).or_else(|| {
        // Older saves keyed the map by name without repeating it inside.
        (!key.trim().is_empty()).then(|| key.to_string())
    }) else {
        return false;
    };
    map.insert("姓名".to_string(), json!(name));
    let sex = string_or(map.get("性别"), "男");
    map.insert("性别".to_string(), json!(sex));
    let relation = non_empty_string(map.get("关系")).unwrap_or_else(|| "陌生人".to_string());
    map.insert("关系".to_string(), json!(relation));
    let favor = clamp_number(map.get("好感度"), favor_min, favor_max, 0);
    map.insert("好感度".to_string(), json!(favor));
    let realm = non_empty_string(map.get("境界")).unwrap_or_else(|| "凡人".to_string());
    map.insert("境界".to_string(), json!(realm));
    let location = string_or(map.get("位置"), "");
    map.insert("位置".to_string(), json!(location));

    object_field(log, map, "社交.人物关系.背包", "背包", json!({}));
    array_field(log, map, "社交.人物关系.记忆", "记忆");
    array_field(log, map, "社交.人物关系.底线", "底线");
    true
}

fn repair_quest(quest: &mut Value) -> bool {
    let Some(map) = quest.as_object_mut() else {
        return false;
    };
    let Some(id) = non_empty_string(map.get("编号")) else {
        return false;
    };
    map.insert("编号".to_string(), json!(id.clone()));
    let name = non_empty_string(map.get("名称")).unwrap_or(id);
    map.insert("名称".to_string(), json!(name));
    let status = vocab_or(map.get("状态"), &QuestStatus::ALL, "进行中").to_string();
    map.insert("状态".to_string(), json!(status));
    let kind = non_empty_string(map.get("类型")).unwrap_or_else(|| "支线".to_string());
    map.insert("类型".to_string(), json!(kind));
    let description = string_or(map.get("描述"), "");
    map.insert("描述".to_string(), json!(description));
    if !matches!(map.get("目标"), Some(Value::Array(_))) {
        map.insert("目标".to_string(), json!([]));
    }
    if !matches!(map.get("奖励"), Some(Value::Array(_))) {
        map.insert("奖励".to_string(), json!([]));
    }
    true
}
