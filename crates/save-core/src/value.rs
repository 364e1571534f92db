//! Field-level validation combinators shared by the migrator and the
//! repair engine. Every helper is total: bad input yields the supplied
//! default and, where a sink is given, a recorded warning.

use serde_json::Value;

/// Accumulates human-readable warnings while a document is rebuilt.
/// Warnings are data, never logged side effects.
#[derive(Debug, Default)]
pub struct RepairLog {
    warnings: Vec<String>,
}

impl RepairLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, path: &str, message: impl AsRef<str>) {
        self.warnings.push(format!("{path}: {}", message.as_ref()));
    }

    pub fn extend(&mut self, other: Vec<String>) {
        self.warnings.extend(other);
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Lenient numeric read: integers, fractional numbers (truncated), and
/// numeric strings all count. Everything else is `None`.
pub fn as_i64_lenient(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

/// Parses and clamps a numeric field into `[min, max]`; non-numeric or
/// missing input yields `default`.
pub fn clamp_number(value: Option<&Value>, min: i64, max: i64, default: i64) -> i64 {
    match value.and_then(as_i64_lenient) {
        Some(parsed) => parsed.clamp(min, max),
        None => default.clamp(min, max),
    }
}

/// Non-negative numeric read with a floor of zero.
pub fn non_negative(value: Option<&Value>, default: i64) -> i64 {
    clamp_number(value, 0, i64::MAX, default)
}

/// Closed-vocabulary check: members pass through, everything else becomes
/// `fallback`.
pub fn vocab_or<'a>(value: Option<&Value>, vocabulary: &[&'a str], fallback: &'a str) -> &'a str {
    match value.and_then(Value::as_str) {
        Some(text) => vocabulary
            .iter()
            .copied()
            .find(|member| *member == text)
            .unwrap_or(fallback),
        None => fallback,
    }
}

pub fn string_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

pub fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
