use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use contracts::{EngineConfig, PatchCommand};
use save_api::{EngineApi, SqliteSaveStore};
use save_core::detect;
use serde_json::Value;

fn print_usage() {
    println!("save-cli <command>");
    println!("commands:");
    println!("  inspect <save.json>");
    println!("    reports whether the document needs migration and why");
    println!("  migrate <save.json> [out.json]");
    println!("    runs the full load pipeline and writes the canonical document");
    println!("  turn <save.json> <commands.json> [out.json]");
    println!("    applies a command batch and writes the resulting document");
    println!("  effects <save.json>");
    println!("    lists active status effects with remaining durations");
    println!("  persist <save.json> [sqlite_path]");
    println!("    loads a document and stores it into its slot");
    println!("  slots [sqlite_path]");
    println!("    lists stored save slots");
}

fn wall_clock_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn default_sqlite_path() -> String {
    env::var("SAVE_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "saves.sqlite".to_string())
}

fn parse_sqlite_path(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path)
}

fn read_json(path: &str) -> Result<Value, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("cannot read {path}: {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid json in {path}: {err}"))
}

fn write_json(path: &str, value: &Value) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| format!("cannot serialize document: {err}"))?;
    fs::write(path, rendered).map_err(|err| format!("cannot write {path}: {err}"))
}

fn load_document(path: &str) -> Result<(EngineApi, contracts::LoadReport), String> {
    let raw = read_json(path)?;
    Ok(EngineApi::load(
        EngineConfig::default(),
        &raw,
        wall_clock_secs(),
    ))
}

fn run_inspect(args: &[String]) -> Result<(), String> {
    let path = args.get(2).ok_or_else(|| "missing save path".to_string())?;
    let raw = read_json(path)?;
    let report = detect::detect(&raw);
    println!("needs_migration={}", report.needs_migration);
    for issue in &report.issues {
        println!("issue: {issue:?}");
    }
    for key in &report.legacy_keys_found {
        println!("legacy key: {key}");
    }
    Ok(())
}

fn run_migrate(args: &[String]) -> Result<(), String> {
    let path = args.get(2).ok_or_else(|| "missing save path".to_string())?;
    let (api, report) = load_document(path)?;
    println!("migrated={}", report.migrated);
    if let Some(migration) = &report.migration {
        for key in &migration.removed_legacy_keys {
            println!("relocated: {key}");
        }
        for warning in &migration.warnings {
            println!("migration warning: {warning}");
        }
    }
    for warning in &report.repair_warnings {
        println!("repair warning: {warning}");
    }
    let out = args.get(3).map(String::as_str).unwrap_or(path.as_str());
    write_json(out, api.document())?;
    println!("wrote {out}");
    Ok(())
}

fn run_turn(args: &[String]) -> Result<(), String> {
    let save_path = args.get(2).ok_or_else(|| "missing save path".to_string())?;
    let commands_path = args
        .get(3)
        .ok_or_else(|| "missing commands path".to_string())?;
    let commands: Vec<PatchCommand> = serde_json::from_value(read_json(commands_path)?)
        .map_err(|err| format!("invalid commands in {commands_path}: {err}"))?;

    let (mut api, _) = load_document(save_path)?;
    let report = api.apply_turn(&commands);
    println!(
        "applied={} rejected={}",
        report.applied_count(),
        report.rejected_count()
    );
    for outcome in report.outcomes.iter().filter(|outcome| !outcome.applied) {
        println!(
            "rejected [{}] {} {}: {}",
            outcome.index,
            outcome.action.as_str(),
            outcome.key,
            outcome.reason.as_deref().unwrap_or("unspecified"),
        );
    }
    for name in &report.expired_effects {
        println!("effect expired: {name}");
    }
    let out = args.get(4).map(String::as_str).unwrap_or(save_path.as_str());
    write_json(out, api.document())?;
    println!("wrote {out}");
    Ok(())
}

fn run_effects(args: &[String]) -> Result<(), String> {
    let path = args.get(2).ok_or_else(|| "missing save path".to_string())?;
    let (api, _) = load_document(path)?;
    let displays = api.engine().effect_displays();
    if displays.is_empty() {
        println!("no active effects");
    }
    for effect in displays {
        println!(
            "{} [{}] 剩余 {} {}",
            effect.name, effect.kind, effect.remaining, effect.description
        );
    }
    Ok(())
}

fn run_persist(args: &[String]) -> Result<(), String> {
    let path = args.get(2).ok_or_else(|| "missing save path".to_string())?;
    let sqlite_path = parse_sqlite_path(args.get(3));
    let (mut api, _) = load_document(path)?;
    api.attach_sqlite_store(PathBuf::from(&sqlite_path))
        .map_err(|err| format!("failed to attach sqlite store: {err}"))?;
    api.persist()
        .map_err(|err| format!("failed to persist: {err}"))?;
    println!("persisted slot={} sqlite={}", api.slot_id(), sqlite_path);
    Ok(())
}

fn run_slots(args: &[String]) -> Result<(), String> {
    let sqlite_path = parse_sqlite_path(args.get(2));
    let store = SqliteSaveStore::open(PathBuf::from(&sqlite_path))
        .map_err(|err| format!("failed to open sqlite store: {err}"))?;
    let slots = store
        .list_slots()
        .map_err(|err| format!("failed to list slots: {err}"))?;
    if slots.is_empty() {
        println!("no saves in {sqlite_path}");
    }
    for slot in slots {
        println!("{} {} ({})", slot.slot_id, slot.save_name, slot.updated_at);
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    let result = match command {
        Some("inspect") => run_inspect(&args),
        Some("migrate") => run_migrate(&args),
        Some("turn") => run_turn(&args),
        Some("effects") => run_effects(&args),
        Some("persist") => run_persist(&args),
        Some("slots") => run_slots(&args),
        _ => {
            print_usage();
            return;
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        print_usage();
        std::process::exit(2);
    }
}
