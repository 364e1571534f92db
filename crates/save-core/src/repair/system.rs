use super::*;

impl Repairer<'_> {
    pub(super) fn repair_system(&mut self, root: &mut Map<String, Value>) {
        let limit = self.config.narrative_history_limit;
        let system = object_field(
            &mut self.log,
            root,
            "系统",
            "系统",
            defaults::default_system(),
        );

        for key in ["功能配置", "用户设置", "缓存", "扩展"] {
            object_field(&mut self.log, system, &format!("系统.{key}"), key, json!({}));
        }
        array_field(&mut self.log, system, "系统.待处理事件", "待处理事件");

        let history = array_field(&mut self.log, system, "系统.叙事历史", "叙事历史");
        if history.len() > limit {
            // Oldest entries fall off; the tail is what narration replays.
            let excess = history.len() - limit;
            history.drain(..excess);
            self.log.warn("系统.叙事历史", "history over limit, oldest entries trimmed");
        }

        let online = object_field(
            &mut self.log,
            system,
            "系统.联机模式",
            "联机模式",
            defaults::default_online_mode(),
        );
        let mode = non_empty_string(online.get("模式")).unwrap_or_else(|| "单机".to_string());
        online.insert("模式".to_string(), json!(mode));
        match online.get("房间编号") {
            Some(Value::Null) | Some(Value::String(_)) => {}
            _ => {
                online.insert("房间编号".to_string(), Value::Null);
            }
        }
    }
}
