use super::*;

impl Repairer<'_> {
    pub(super) fn repair_world(&mut self, root: &mut Map<String, Value>) {
        let world = object_field(
            &mut self.log,
            root,
            "世界",
            "世界",
            defaults::default_world(0),
        );

        let info = object_field(
            &mut self.log,
            world,
            "世界.世界信息",
            "世界信息",
            json!({}),
        );
        let name = non_empty_string(info.get("名称")).unwrap_or_else(|| "九州".to_string());
        info.insert("名称".to_string(), json!(name));
        let era = string_or(info.get("纪元"), "灵潮纪");
        info.insert("纪元".to_string(), json!(era));
        let backdrop = string_or(info.get("背景设定"), "");
        info.insert("背景设定".to_string(), json!(backdrop));
        for key in ["大陆", "势力", "地点"] {
            array_field(&mut self.log, info, &format!("世界.世界信息.{key}"), key);
        }
        let generated = non_negative(info.get("生成时间"), 0);
        info.insert("生成时间".to_string(), json!(generated));

        object_field(&mut self.log, world, "世界.世界状态", "世界状态", json!({}));
    }
}
