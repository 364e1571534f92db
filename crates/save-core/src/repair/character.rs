use contracts::{ItemKind, QualityTier, EQUIPMENT_SLOTS, REALM_STAGES};

use super::*;

const SIX_ATTRIBUTES: [&str; 6] = ["根骨", "悟性", "气运", "魅力", "心性", "体魄"];

impl Repairer<'_> {
    fn character<'m>(&mut self, root: &'m mut Map<String, Value>) -> &'m mut Map<String, Value> {
        let default = defaults::default_character(self.config.innate_attribute_default);
        object_field(&mut self.log, root, "角色", "角色", default)
    }

    pub(super) fn repair_identity(&mut self, root: &mut Map<String, Value>) {
        let innate_default = self.config.innate_attribute_default;
        let (innate_min, innate_max) = (
            self.config.innate_attribute_min,
            self.config.innate_attribute_max,
        );
        let character = self.character(root);
        let identity = object_field(
            &mut self.log,
            character,
            "角色.身份",
            "身份",
            defaults::default_identity(innate_default),
        );

        let name = non_empty_string(identity.get("姓名")).unwrap_or_else(|| "无名修士".to_string());
        identity.insert("姓名".to_string(), json!(name));
        let sex = string_or(identity.get("性别"), "男");
        identity.insert("性别".to_string(), json!(sex));
        let race = non_empty_string(identity.get("种族")).unwrap_or_else(|| "人族".to_string());
        identity.insert("种族".to_string(), json!(race));
        let birth = coerce_game_time(identity.get("出生日期"));
        identity.insert(
            "出生日期".to_string(),
            serde_json::to_value(birth).expect("game time serializes"),
        );

        repair_six_attributes(
            &mut self.log,
            identity,
            "角色.身份.先天六维",
            "先天六维",
            innate_min,
            innate_max,
            innate_default,
        );
        repair_six_attributes(
            &mut self.log,
            identity,
            "角色.身份.后天六维",
            "后天六维",
            0,
            i64::MAX,
            0,
        );
    }

    pub(super) fn repair_vitals(&mut self, root: &mut Map<String, Value>) {
        let character = self.character(root);
        let vitals = object_field(
            &mut self.log,
            character,
            "角色.属性",
            "属性",
            defaults::default_vitals(),
        );

        // Realm first: the value pairs below may depend on nothing, but the
        // breakthrough text depends on a valid (name, stage).
        let realm = object_field(
            &mut self.log,
            vitals,
            "角色.属性.境界",
            "境界",
            defaults::default_realm(),
        );
        let realm_name =
            non_empty_string(realm.get("名称")).unwrap_or_else(|| "凡人".to_string());
        let stage_fallback = if realm_name == "凡人" { "" } else { "初期" };
        let stage = vocab_or(realm.get("阶段"), &REALM_STAGES, stage_fallback).to_string();
        let progress = non_negative(realm.get("进度"), 0);
        let threshold = non_negative(realm.get("突破阈值"), 100);
        let description = match non_empty_string(realm.get("突破描述")) {
            Some(text) => text,
            None => defaults::breakthrough_description(&realm_name, &stage)
                .map(str::to_string)
                .unwrap_or_else(|| defaults::generic_breakthrough(&realm_name)),
        };
        realm.insert("名称".to_string(), json!(realm_name));
        realm.insert("阶段".to_string(), json!(stage));
        realm.insert("进度".to_string(), json!(progress));
        realm.insert("突破阈值".to_string(), json!(threshold));
        realm.insert("突破描述".to_string(), json!(description));

        let reputation = clamp_number(vitals.get("声望"), i64::MIN, i64::MAX, 0);
        vitals.insert("声望".to_string(), json!(reputation));

        repair_value_pair(&mut self.log, vitals, "角色.属性.气血", "气血", 100);
        repair_value_pair(&mut self.log, vitals, "角色.属性.灵力", "灵力", 100);
        repair_value_pair(&mut self.log, vitals, "角色.属性.神识", "神识", 50);
        repair_value_pair(&mut self.log, vitals, "角色.属性.寿元", "寿元", 80);
    }

    pub(super) fn repair_location(&mut self, root: &mut Map<String, Value>) {
        let character = self.character(root);
        // A bare string is an old shorthand for the location name.
        if let Some(Value::String(name)) = character.get("位置") {
            let name = name.clone();
            character.insert("位置".to_string(), json!({ "名称": name, "描述": "" }));
        }
        let location = object_field(
            &mut self.log,
            character,
            "角色.位置",
            "位置",
            defaults::default_location(),
        );
        let name = non_empty_string(location.get("名称")).unwrap_or_else(|| "青云村".to_string());
        location.insert("名称".to_string(), json!(name));
        let description = string_or(location.get("描述"), "");
        location.insert("描述".to_string(), json!(description));
    }

    pub(super) fn repair_equipment(&mut self, root: &mut Map<String, Value>) {
        let character = self.character(root);
        let equipment = object_field(
            &mut self.log,
            character,
            "角色.装备",
            "装备",
            defaults::default_equipment(),
        );
        for slot in EQUIPMENT_SLOTS {
            let path = format!("角色.装备.{slot}");
            match equipment.get(slot) {
                None => {
                    equipment.insert(slot.to_string(), Value::Null);
                }
                Some(Value::Null) => {}
                Some(Value::Object(item)) => {
                    if non_empty_string(item.get("名称")).is_none() {
                        self.log.warn(&path, "equipped item lacks a name, unequipped");
                        equipment.insert(slot.to_string(), Value::Null);
                    }
                }
                Some(_) => {
                    self.log.warn(&path, "wrong shape, slot emptied");
                    equipment.insert(slot.to_string(), Value::Null);
                }
            }
        }
    }

    pub(super) fn repair_inventory(&mut self, root: &mut Map<String, Value>) {
        let character = self.character(root);
        let inventory = object_field(
            &mut self.log,
            character,
            "角色.背包",
            "背包",
            defaults::default_inventory(),
        );

        let stones = object_field(
            &mut self.log,
            inventory,
            "角色.背包.灵石",
            "灵石",
            defaults::default_spirit_stones(),
        );
        for bucket in ["下品", "中品", "上品", "极品"] {
            let amount = non_negative(stones.get(bucket), 0);
            stones.insert(bucket.to_string(), json!(amount));
        }

        // Collection filtering, not collection repair: identity-less
        // entries are dropped outright, survivors repaired in place.
        let items = object_field(&mut self.log, inventory, "角色.背包.物品", "物品", json!({}));
        let entries: Vec<(String, Value)> = std::mem::take(items)
            .into_iter()
            .collect();
        for (id, mut item) in entries {
            if self.repair_item(&id, &mut item) {
                items.insert(id, item);
            } else {
                self.log
                    .warn("角色.背包.物品", "dropped item entry without identity");
            }
        }
    }

    fn repair_item(&mut self, id: &str, item: &mut Value) -> bool {
        let Some(map) = item.as_object_mut() else {
            return false;
        };
        let Some(name) = non_empty_string(map.get("名称")) else {
            return false;
        };
        map.insert("名称".to_string(), json!(name));
        let item_id = non_empty_string(map.get("编号")).unwrap_or_else(|| id.to_string());
        map.insert("编号".to_string(), json!(item_id));
        let kind = vocab_or(map.get("类型"), &ItemKind::ALL, "其他").to_string();
        map.insert("类型".to_string(), json!(kind));
        let quantity = clamp_number(map.get("数量"), 1, i64::MAX, 1);
        map.insert("数量".to_string(), json!(quantity));
        let description = string_or(map.get("描述"), "");
        map.insert("描述".to_string(), json!(description));

        let quality = object_field(
            &mut self.log,
            map,
            "角色.背包.物品.品质",
            "品质",
            json!({}),
        );
        let tier = vocab_or(quality.get("品阶"), &QualityTier::ALL, "凡").to_string();
        let grade = clamp_number(quality.get("品级"), 0, 10, 0);
        quality.insert("品阶".to_string(), json!(tier));
        quality.insert("品级".to_string(), json!(grade));
        true
    }

    pub(super) fn repair_dao(&mut self, root: &mut Map<String, Value>) {
        let character = self.character(root);
        let dao = object_field(&mut self.log, character, "角色.三千大道", "三千大道", json!({}));
        let keys: Vec<String> = dao.keys().cloned().collect();
        for key in keys {
            let entry_is_object = matches!(dao.get(&key), Some(Value::Object(_)));
            if !entry_is_object {
                self.log.warn(
                    &format!("角色.三千大道.{key}"),
                    "wrong shape, reset to zero progress",
                );
                dao.insert(key.clone(), json!({ "进度": 0 }));
                continue;
            }
            if let Some(Value::Object(entry)) = dao.get_mut(&key) {
                let progress = non_negative(entry.get("进度"), 0);
                entry.insert("进度".to_string(), json!(progress));
            }
        }
    }

    pub(super) fn repair_skills(&mut self, root: &mut Map<String, Value>) {
        let character = self.character(root);
        let skills = array_field(&mut self.log, character, "角色.掌握技能", "掌握技能");
        let mut kept = Vec::with_capacity(skills.len());
        for mut skill in skills.drain(..) {
            let valid = skill
                .as_object_mut()
                .map(|map| {
                    let Some(name) = non_empty_string(map.get("名称")) else {
                        return false;
                    };
                    map.insert("名称".to_string(), json!(name));
                    let level = clamp_number(map.get("等级"), 1, i64::MAX, 1);
                    map.insert("等级".to_string(), json!(level));
                    let description = string_or(map.get("描述"), "");
                    map.insert("描述".to_string(), json!(description));
                    true
                })
                .unwrap_or(false);
            if valid {
                kept.push(skill);
            } else {
                self.log
                    .warn("角色.掌握技能", "dropped skill entry without identity");
            }
        }
        *skills = kept;
    }

    /// A technique missing its mandatory fields is nulled, never kept
    /// half-shaped.
    pub(super) fn repair_technique(&mut self, root: &mut Map<String, Value>) {
        let character = self.character(root);
        match character.get_mut("功法") {
            None => {
                character.insert("功法".to_string(), Value::Null);
            }
            Some(Value::Null) => {}
            Some(Value::Object(technique)) => {
                if non_empty_string(technique.get("名称")).is_none() {
                    self.log.warn("角色.功法", "technique lacks a name, cleared");
                    character.insert("功法".to_string(), Value::Null);
                } else {
                    let tier = vocab_or(technique.get("品质"), &QualityTier::ALL, "凡").to_string();
                    technique.insert("品质".to_string(), json!(tier));
                    let mastery = non_negative(technique.get("熟练度"), 0);
                    technique.insert("熟练度".to_string(), json!(mastery));
                }
            }
            Some(_) => {
                self.log.warn("角色.功法", "wrong shape, cleared");
                character.insert("功法".to_string(), Value::Null);
            }
        }
    }

    pub(super) fn repair_cultivation(&mut self, root: &mut Map<String, Value>) {
        let character = self.character(root);
        let cultivation = object_field(
            &mut self.log,
            character,
            "角色.修炼",
            "修炼",
            defaults::default_cultivation(),
        );
        let state = non_empty_string(cultivation.get("状态")).unwrap_or_else(|| "空闲".to_string());
        cultivation.insert("状态".to_string(), json!(state));
        let bonus = clamp_number(cultivation.get("加成"), i64::MIN, i64::MAX, 0);
        cultivation.insert("加成".to_string(), json!(bonus));
    }

    /// Normalizes every status effect (invariant 5); expiry itself is the
    /// lifecycle manager's job.
    pub(super) fn repair_effects(&mut self, root: &mut Map<String, Value>) {
        let now = Self::current_clock(root);
        let character = self.character(root);
        let list = array_field(&mut self.log, character, "角色.效果", "效果");
        let mut kept = Vec::with_capacity(list.len());
        for mut effect in list.drain(..) {
            if effects::normalize_effect(&mut effect, &now) {
                kept.push(effect);
            } else {
                self.log
                    .warn("角色.效果", "dropped malformed effect entry");
            }
        }
        *list = kept;
    }
}

fn repair_six_attributes(
    log: &mut RepairLog,
    parent: &mut Map<String, Value>,
    path: &str,
    key: &str,
    min: i64,
    max: i64,
    default: i64,
) {
    let attributes = object_field(log, parent, path, key, defaults::default_six_attributes(default));
    for attribute in SIX_ATTRIBUTES {
        let score = clamp_number(attributes.get(attribute), min, max, default);
        attributes.insert(attribute.to_string(), json!(score));
    }
}
