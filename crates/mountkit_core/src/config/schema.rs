//! Configuration schema definition.
//!
//! Schema JSON follows the host convention: a leaf is an object carrying
//! `_default` (plus optional `_type` and `_description`); any other object is
//! a group of nested keys. Keys starting with `_` inside a group annotate the
//! group and are not configuration keys.

use crate::config::merge::{incompatible, join_path, log_dropped, warn_unknown_keys};
use crate::config::merge::{ConfigKeyDroppedWarning, MergeOutcome};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_KEY: &str = "_default";
const TYPE_KEY: &str = "_type";
const DESCRIPTION_KEY: &str = "_description";

/// Declared value type of a schema leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Any,
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueType {
    /// Parses a `_type` annotation, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any" => Some(Self::Any),
            "string" | "uuid" | "conceptuuid" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether `value` fits this type. `null` fits every type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (Self::Any, _) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    fn infer(value: &Value) -> Self {
        match value {
            Value::Null => Self::Any,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

/// Leaf declaration with its default value.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaLeaf {
    pub value_type: ValueType,
    pub default: Value,
    pub description: Option<String>,
}

/// One schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Leaf(SchemaLeaf),
    Group(BTreeMap<String, SchemaNode>),
}

impl SchemaNode {
    fn defaults(&self) -> Value {
        match self {
            Self::Leaf(leaf) => leaf.default.clone(),
            Self::Group(children) => Value::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.defaults()))
                    .collect(),
            ),
        }
    }
}

/// Errors raised while parsing a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// Node is neither a leaf nor a group object.
    InvalidNode { path: String },
    /// `_type` annotation is not recognized.
    UnknownType { path: String, value: String },
    /// `_default` does not fit the declared `_type`.
    DefaultTypeMismatch {
        path: String,
        expected: &'static str,
    },
}

impl Display for ConfigSchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNode { path } => write!(
                f,
                "config schema node `{path}` must be an object with `_default` or nested keys"
            ),
            Self::UnknownType { path, value } => {
                write!(f, "config schema node `{path}` has unknown _type `{value}`")
            }
            Self::DefaultTypeMismatch { path, expected } => write!(
                f,
                "config schema node `{path}` declares a _default that is not {expected}"
            ),
        }
    }
}

impl Error for ConfigSchemaError {}

/// Parsed configuration schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSchema {
    root: BTreeMap<String, SchemaNode>,
}

impl ConfigSchema {
    /// Parses a schema from its JSON declaration.
    pub fn from_json(value: &Value) -> Result<Self, ConfigSchemaError> {
        let Value::Object(entries) = value else {
            return Err(ConfigSchemaError::InvalidNode {
                path: "<root>".to_string(),
            });
        };
        Ok(Self {
            root: parse_group("", entries)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Defaults object, shaped like the schema.
    pub fn defaults(&self) -> Value {
        Value::Object(
            self.root
                .iter()
                .map(|(key, node)| (key.clone(), node.defaults()))
                .collect(),
        )
    }

    /// Looks up a leaf by dotted path.
    pub fn leaf(&self, path: &str) -> Option<&SchemaLeaf> {
        let mut segments = path.split('.');
        let mut node = self.root.get(segments.next()?)?;
        for segment in segments {
            match node {
                SchemaNode::Group(children) => node = children.get(segment)?,
                SchemaNode::Leaf(_) => return None,
            }
        }
        match node {
            SchemaNode::Leaf(leaf) => Some(leaf),
            SchemaNode::Group(_) => None,
        }
    }

    /// Merges `overrides` into the schema defaults.
    pub fn merge(&self, overrides: &Value) -> MergeOutcome {
        self.merge_onto(&self.defaults(), overrides)
    }

    /// Merges `overrides` onto a schema-shaped `base`.
    ///
    /// Leaves are opaque: an override of the declared type replaces the base
    /// value wholesale, even for `Object` and `Array` leaves.
    pub fn merge_onto(&self, base: &Value, overrides: &Value) -> MergeOutcome {
        let mut warnings = Vec::new();
        let effective = match overrides {
            Value::Null => merge_group("", &self.root, base, &Map::new(), &mut warnings),
            Value::Object(values) => merge_group("", &self.root, base, values, &mut warnings),
            other => {
                warnings.push(incompatible("", "object", other));
                merge_group("", &self.root, base, &Map::new(), &mut warnings)
            }
        };
        log_dropped(&warnings);
        MergeOutcome {
            effective,
            warnings,
        }
    }
}

fn parse_group(
    path: &str,
    entries: &Map<String, Value>,
) -> Result<BTreeMap<String, SchemaNode>, ConfigSchemaError> {
    let mut children = BTreeMap::new();
    for (key, value) in entries.iter().filter(|(key, _)| !key.starts_with('_')) {
        let child_path = join_path(path, key);
        children.insert(key.clone(), parse_node(&child_path, value)?);
    }
    Ok(children)
}

fn parse_node(path: &str, value: &Value) -> Result<SchemaNode, ConfigSchemaError> {
    let Value::Object(entries) = value else {
        return Err(ConfigSchemaError::InvalidNode {
            path: path.to_string(),
        });
    };

    let Some(default) = entries.get(DEFAULT_KEY) else {
        return parse_group(path, entries).map(SchemaNode::Group);
    };

    let value_type = match entries.get(TYPE_KEY) {
        None => ValueType::infer(default),
        Some(Value::String(raw)) => {
            ValueType::parse(raw).ok_or_else(|| ConfigSchemaError::UnknownType {
                path: path.to_string(),
                value: raw.clone(),
            })?
        }
        Some(other) => {
            return Err(ConfigSchemaError::UnknownType {
                path: path.to_string(),
                value: other.to_string(),
            })
        }
    };
    if !value_type.accepts(default) {
        return Err(ConfigSchemaError::DefaultTypeMismatch {
            path: path.to_string(),
            expected: value_type.as_str(),
        });
    }

    Ok(SchemaNode::Leaf(SchemaLeaf {
        value_type,
        default: default.clone(),
        description: entries
            .get(DESCRIPTION_KEY)
            .and_then(Value::as_str)
            .map(str::to_string),
    }))
}

fn merge_group(
    path: &str,
    children: &BTreeMap<String, SchemaNode>,
    base: &Value,
    overrides: &Map<String, Value>,
    warnings: &mut Vec<ConfigKeyDroppedWarning>,
) -> Value {
    let mut merged = Map::with_capacity(children.len());
    for (key, node) in children {
        let child_path = join_path(path, key);
        let child_base = base
            .get(key)
            .cloned()
            .unwrap_or_else(|| node.defaults());
        let value = match overrides.get(key) {
            None | Some(Value::Null) => child_base,
            Some(value) => merge_node(&child_path, node, &child_base, value, warnings),
        };
        merged.insert(key.clone(), value);
    }
    warn_unknown_keys(path, overrides, |key| children.contains_key(key), warnings);
    Value::Object(merged)
}

fn merge_node(
    path: &str,
    node: &SchemaNode,
    base: &Value,
    value: &Value,
    warnings: &mut Vec<ConfigKeyDroppedWarning>,
) -> Value {
    match node {
        SchemaNode::Leaf(leaf) if leaf.value_type.accepts(value) => value.clone(),
        SchemaNode::Leaf(leaf) => {
            warnings.push(incompatible(path, leaf.value_type.as_str(), value));
            base.clone()
        }
        SchemaNode::Group(children) => match value {
            Value::Object(overrides) => merge_group(path, children, base, overrides, warnings),
            other => {
                warnings.push(incompatible(path, "object", other));
                base.clone()
            }
        },
    }
}
