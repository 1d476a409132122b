//! Extension descriptor declaration and validation.
//!
//! # Responsibility
//! - Define the typed shape of one registration entry.
//! - Validate ids and slot names before they reach the registry.
//!
//! # Invariants
//! - Descriptors are immutable once constructed.
//! - Slot names are non-empty lowercase tokens without path-like segments.

use crate::dashboard::meta::DashboardMeta;
use crate::lifecycle::loader::{LoadHandle, Provenance};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Renderer metadata attached to a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionMeta {
    /// Typed dashboard node metadata consumed by the hierarchy builder.
    Dashboard(DashboardMeta),
    /// Opaque renderer payload passed through untouched.
    Opaque(Value),
}

impl ExtensionMeta {
    pub fn as_dashboard(&self) -> Option<&DashboardMeta> {
        match self {
            Self::Dashboard(meta) => Some(meta),
            Self::Opaque(_) => None,
        }
    }
}

/// One registered unit of functionality bound to a slot.
#[derive(Debug, Clone)]
pub struct ExtensionDescriptor {
    id: String,
    slot: String,
    load: LoadHandle,
    meta: Option<ExtensionMeta>,
}

impl ExtensionDescriptor {
    pub fn new(id: impl Into<String>, slot: impl Into<String>, load: LoadHandle) -> Self {
        Self {
            id: id.into(),
            slot: slot.into(),
            load,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: ExtensionMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn load(&self) -> &LoadHandle {
        &self.load
    }

    pub fn meta(&self) -> Option<&ExtensionMeta> {
        self.meta.as_ref()
    }

    /// Dashboard metadata, when this descriptor is a dashboard node.
    pub fn dashboard(&self) -> Option<&DashboardMeta> {
        self.meta.as_ref().and_then(ExtensionMeta::as_dashboard)
    }

    pub fn provenance(&self) -> &Provenance {
        self.load.provenance()
    }

    pub fn feature_name(&self) -> &str {
        &self.provenance().feature_name
    }

    pub fn module_name(&self) -> &str {
        &self.provenance().module_name
    }
}

/// Route-bound page entry, passed through to the host untouched.
#[derive(Debug, Clone)]
pub struct PageDefinition {
    pub route: String,
    pub load: LoadHandle,
}

impl PageDefinition {
    pub fn new(route: impl Into<String>, load: LoadHandle) -> Self {
        Self {
            route: route.into(),
            load,
        }
    }
}

/// Reason a slot name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRejection {
    Empty,
    PathTraversal,
    InvalidCharacter(char),
    LeadingSeparator,
    TrailingSeparator,
    /// Dashboard descriptor not placed in its parent slot.
    ParentMismatch,
}

impl Display for SlotRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "slot must not be empty"),
            Self::PathTraversal => write!(f, "slot must not contain `..`, `/` or `\\`"),
            Self::InvalidCharacter(c) => write!(f, "slot contains unsupported character {c:?}"),
            Self::LeadingSeparator => write!(f, "slot must start with a letter or digit"),
            Self::TrailingSeparator => write!(f, "slot must not end with a separator"),
            Self::ParentMismatch => write!(f, "dashboard entries must target their parent slot"),
        }
    }
}

/// Validates one slot name.
pub fn validate_slot(slot: &str) -> Result<(), SlotRejection> {
    if slot.is_empty() {
        return Err(SlotRejection::Empty);
    }
    if slot.contains("..") || slot.contains('/') || slot.contains('\\') {
        return Err(SlotRejection::PathTraversal);
    }
    if let Some(c) = slot.chars().find(|c| !is_slot_char(*c)) {
        return Err(SlotRejection::InvalidCharacter(c));
    }
    if slot.starts_with(is_separator) {
        return Err(SlotRejection::LeadingSeparator);
    }
    if slot.ends_with(is_separator) {
        return Err(SlotRejection::TrailingSeparator);
    }
    Ok(())
}

/// Returns whether `id` is acceptable as a descriptor id.
pub fn is_valid_descriptor_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn is_slot_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || is_separator(c)
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '_' || c == '.'
}
