use contracts::{EngineConfig, GameTime, PatchAction, PatchCommand, DOMAIN_KEYS, LEGACY_ROOT_KEYS};
use proptest::prelude::*;
use save_core::effects::{format_duration, parse_legacy_duration};
use save_core::{detect, migrate, repair, SaveEngine};
use serde_json::{json, Value};

fn config() -> EngineConfig {
    EngineConfig::default()
}

/// Arbitrary JSON tree, biased toward keys the schema actually uses so the
/// repair paths get exercised instead of only the defaults.
fn arb_json() -> impl Strategy<Value = Value> {
    let key = prop_oneof![
        "[a-z]{1,6}",
        Just("角色".to_string()),
        Just("属性".to_string()),
        Just("气血".to_string()),
        Just("当前".to_string()),
        Just("上限".to_string()),
        Just("效果".to_string()),
        Just("元数据".to_string()),
        Just("时间".to_string()),
        Just("背包".to_string()),
        Just("物品".to_string()),
        Just("名称".to_string()),
    ];
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000_000_i64..1_000_000).prop_map(Value::from),
        "[a-z0-9]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, move |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::btree_map(key.clone(), inner, 0..5)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn arb_game_time() -> impl Strategy<Value = GameTime> {
    (1000_i64..1100, 1_i64..=12, 1_i64..=30, 0_i64..24, 0_i64..60).prop_map(
        |(year, month, day, hour, minute)| GameTime {
            year,
            month,
            day,
            hour,
            minute,
        },
    )
}

#[test]
fn property_migrated_document_is_canonical() {
    let legacy = json!({
        "玩家角色状态": { "气血": { "当前": 30, "上限": 100 } },
        "位置": "青云村",
        "游戏时间": { "年": 1001, "月": 3, "日": 15 },
        "状态效果": [],
        "背包": { "物品": {} }
    });
    let outcome = migrate::migrate(&legacy, 0, &config());
    let report = detect::detect(&outcome.document);
    assert!(!report.needs_migration);
    for key in LEGACY_ROOT_KEYS {
        assert!(
            outcome.document.get(key).is_none() || DOMAIN_KEYS.contains(&key),
            "legacy key {key} survived migration"
        );
    }
}

#[test]
fn property_duration_rendering_inverts_known_grammar() {
    for (text, minutes) in [
        ("2小时30分钟", 150),
        ("1天", 1_440),
        ("3天", 4_320),
        ("45分钟", 45),
    ] {
        assert_eq!(parse_legacy_duration(text), Some(minutes), "{text}");
        assert_eq!(parse_legacy_duration(&format_duration(minutes)), Some(minutes));
    }
}

proptest! {
    /// Repair is total: any JSON whatsoever comes out as a valid document.
    #[test]
    fn property_repair_is_total(raw in arb_json()) {
        let outcome = repair::repair(raw, &config());
        for key in DOMAIN_KEYS {
            prop_assert!(
                matches!(outcome.document.get(key), Some(Value::Object(_))),
                "domain {} missing after repair", key
            );
        }
    }

    /// Repairing a repaired document changes nothing and warns nothing.
    #[test]
    fn property_repair_is_idempotent(raw in arb_json()) {
        let first = repair::repair(raw, &config());
        let second = repair::repair(first.document.clone(), &config());
        prop_assert_eq!(first.document, second.document);
        prop_assert!(second.warnings.is_empty(), "{:?}", second.warnings);
    }

    /// The full load pipeline is a fixpoint: loading its own output again
    /// is a silent no-op.
    #[test]
    fn property_load_reaches_fixpoint(raw in arb_json(), wall in 0_u64..2_000_000_000) {
        let (engine, _) = SaveEngine::load(config(), &raw, wall);
        let first = engine.into_document();
        let (engine, report) = SaveEngine::load(config(), &first, wall);
        prop_assert!(!report.migrated);
        prop_assert!(report.repair_warnings.is_empty(), "{:?}", report.repair_warnings);
        prop_assert_eq!(engine.into_document(), first);
    }

    /// Vitals invariant holds after repair regardless of input numbers.
    #[test]
    fn property_vitals_stay_within_bounds(current in any::<i64>(), max in any::<i64>()) {
        let raw = json!({
            "角色": { "属性": { "气血": { "当前": current, "上限": max } } }
        });
        let outcome = repair::repair(raw, &config());
        let pair = &outcome.document["角色"]["属性"]["气血"];
        let current = pair["当前"].as_i64().unwrap();
        let max = pair["上限"].as_i64().unwrap();
        prop_assert!(max >= 0);
        prop_assert!((0..=max).contains(&current));
    }

    /// Same document, same commands: identical outcome, byte for byte.
    #[test]
    fn property_turns_are_deterministic(raw in arb_json(), delta in -500_i64..500) {
        let commands = vec![
            PatchCommand::new(PatchAction::Set, "角色.位置.名称", json!("坊市")),
            PatchCommand::new(PatchAction::Add, "角色.背包.灵石.下品", json!(delta)),
            PatchCommand::new(PatchAction::Set, "系统.缓存.x", json!(1)),
        ];
        let (mut engine_a, _) = SaveEngine::load(config(), &raw, 7);
        let (mut engine_b, _) = SaveEngine::load(config(), &raw, 7);
        let report_a = engine_a.apply_turn(&commands);
        let report_b = engine_b.apply_turn(&commands);
        prop_assert_eq!(report_a, report_b);
        prop_assert_eq!(engine_a.into_document(), engine_b.into_document());
    }

    /// Clock arithmetic is consistent with the fixed calendar.
    #[test]
    fn property_minutes_since_is_antisymmetric(a in arb_game_time(), b in arb_game_time()) {
        prop_assert_eq!(a.minutes_since(&b), -b.minutes_since(&a));
        prop_assert_eq!(a.minutes_since(&a), 0);
    }

    /// Legacy duration parsing never panics on arbitrary text.
    #[test]
    fn property_duration_parser_is_total(text in "\\PC{0,24}") {
        let _ = parse_legacy_duration(&text);
    }
}
