//! Deep, schema-authoritative merge of override values into defaults.

use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Why an override value did not reach the effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Key is not declared by the defaults/schema.
    UnknownKey,
    /// Value shape differs from the declared one; the default stays in force.
    IncompatibleShape {
        expected: &'static str,
        found: &'static str,
    },
}

/// Non-fatal notice about one override that was not merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigKeyDroppedWarning {
    /// Dotted key path, e.g. `forms.enabled`.
    pub path: String,
    pub reason: DropReason,
}

impl Display for ConfigKeyDroppedWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            DropReason::UnknownKey => write!(
                f,
                "config key `{}` dropped: not declared by schema",
                self.path
            ),
            DropReason::IncompatibleShape { expected, found } => write!(
                f,
                "config key `{}` dropped: expected {expected}, got {found}",
                self.path
            ),
        }
    }
}

/// Result of one merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Defaults-shaped effective configuration.
    pub effective: Value,
    pub warnings: Vec<ConfigKeyDroppedWarning>,
}

/// Merges `overrides` into `defaults` key by key.
///
/// - Keys of `defaults` take the override value when present, non-null and of
///   the same JSON kind; nested objects merge recursively.
/// - Override keys missing from `defaults` are dropped with a warning.
/// - A `null` default accepts any override.
pub fn merge_config(defaults: &Value, overrides: &Value) -> MergeOutcome {
    let mut warnings = Vec::new();
    let effective = merge_value("", defaults, overrides, &mut warnings);
    log_dropped(&warnings);
    MergeOutcome {
        effective,
        warnings,
    }
}

fn merge_value(
    path: &str,
    default: &Value,
    override_value: &Value,
    warnings: &mut Vec<ConfigKeyDroppedWarning>,
) -> Value {
    match (default, override_value) {
        (_, Value::Null) => default.clone(),
        (Value::Null, value) => value.clone(),
        (Value::Object(defaults), Value::Object(overrides)) => {
            merge_objects(path, defaults, overrides, warnings)
        }
        (default, value) if json_kind(default) == json_kind(value) => value.clone(),
        (default, value) => {
            warnings.push(incompatible(path, json_kind(default), value));
            default.clone()
        }
    }
}

fn merge_objects(
    path: &str,
    defaults: &Map<String, Value>,
    overrides: &Map<String, Value>,
    warnings: &mut Vec<ConfigKeyDroppedWarning>,
) -> Value {
    let mut merged = Map::with_capacity(defaults.len());
    for (key, default) in defaults {
        let child_path = join_path(path, key);
        let value = match overrides.get(key) {
            Some(override_value) => merge_value(&child_path, default, override_value, warnings),
            None => default.clone(),
        };
        merged.insert(key.clone(), value);
    }
    warn_unknown_keys(path, overrides, |key| defaults.contains_key(key), warnings);
    Value::Object(merged)
}

pub(crate) fn warn_unknown_keys(
    path: &str,
    overrides: &Map<String, Value>,
    is_declared: impl Fn(&str) -> bool,
    warnings: &mut Vec<ConfigKeyDroppedWarning>,
) {
    for key in overrides.keys().filter(|key| !is_declared(key)) {
        warnings.push(ConfigKeyDroppedWarning {
            path: join_path(path, key),
            reason: DropReason::UnknownKey,
        });
    }
}

pub(crate) fn incompatible(
    path: &str,
    expected: &'static str,
    found: &Value,
) -> ConfigKeyDroppedWarning {
    ConfigKeyDroppedWarning {
        path: display_path(path),
        reason: DropReason::IncompatibleShape {
            expected,
            found: json_kind(found),
        },
    }
}

pub(crate) fn log_dropped(warnings: &[ConfigKeyDroppedWarning]) {
    for warning in warnings {
        warn!(
            "event=config_key_dropped module=config status=warn path={} detail={}",
            warning.path, warning
        );
    }
}

pub(crate) fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

/// JSON kind name used in shape comparisons and warnings.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
