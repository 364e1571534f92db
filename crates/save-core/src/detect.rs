//! Legacy layout detection. Pure inspection only; the detector never
//! touches the document it examines.

use contracts::{DetectionIssue, DetectionReport, DOMAIN_KEYS, LEGACY_ROOT_KEYS};
use serde_json::Value;

/// Bare keys whose presence at the root marks a pre-domain "flat" layout
/// even when no named legacy root key is present.
pub const FLAT_LAYOUT_KEYS: [&str; 6] = ["属性", "位置", "境界", "气血", "灵力", "装备"];

/// Decides whether `document` needs migration and why.
pub fn detect(document: &Value) -> DetectionReport {
    let map = match document.as_object() {
        Some(map) => map,
        None => {
            return DetectionReport {
                needs_migration: true,
                issues: vec![DetectionIssue::InvalidStructure],
                legacy_keys_found: Vec::new(),
            }
        }
    };

    // Canonical fast path: all five domains present means nothing to do,
    // regardless of whatever else the map carries.
    if DOMAIN_KEYS.iter().all(|key| map.contains_key(*key)) {
        return DetectionReport::default();
    }

    let legacy_keys_found: Vec<String> = LEGACY_ROOT_KEYS
        .iter()
        .filter(|key| map.contains_key(**key))
        .map(|key| key.to_string())
        .collect();

    let mut issues = vec![DetectionIssue::MissingDomains];
    if !legacy_keys_found.is_empty() {
        issues.push(DetectionIssue::LegacyRootKey);
    }
    if FLAT_LAYOUT_KEYS.iter().any(|key| map.contains_key(*key)) {
        issues.push(DetectionIssue::FlatLayout);
    }

    DetectionReport {
        needs_migration: true,
        issues,
        legacy_keys_found,
    }
}
