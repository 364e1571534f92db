//! Consistency kernel for the save document: legacy detection, schema
//! migration into the five-domain layout, defensive repair, the command
//! patch applier, and status-effect lifecycle. Everything operates on a
//! `serde_json::Value` tree and is deterministic given the inputs.

pub mod defaults;
pub mod detect;
pub mod effects;
pub mod engine;
pub mod migrate;
pub mod patch;
pub mod path;
pub mod repair;
pub mod value;

pub use contracts::EQUIPMENT_SLOTS;
pub use engine::{EngineError, SaveEngine};
pub use migrate::MigrationOutcome;
pub use repair::RepairOutcome;
