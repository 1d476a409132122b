//! Load capability declarations for descriptor handles.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// How a descriptor's load handle materializes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadCapability {
    Eager,
    Deferred,
}

impl LoadCapability {
    /// Stable string id used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eager => LOAD_CAPABILITY_EAGER,
            Self::Deferred => LOAD_CAPABILITY_DEFERRED,
        }
    }

    /// User-facing short description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Eager => "Resolved synchronously on first use and reused afterwards.",
            Self::Deferred => "Fetched asynchronously once, on demand, and shared by all callers.",
        }
    }

    /// Whether resolving this capability may suspend the caller.
    pub fn may_suspend(self) -> bool {
        matches!(self, Self::Deferred)
    }
}

impl Display for LoadCapability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String id for synchronous handles.
pub const LOAD_CAPABILITY_EAGER: &str = "eager";
/// String id for asynchronous handles.
pub const LOAD_CAPABILITY_DEFERRED: &str = "deferred";

const SUPPORTED_LOAD_CAPABILITY_STRINGS: &[&str] =
    &[LOAD_CAPABILITY_EAGER, LOAD_CAPABILITY_DEFERRED];

/// Returns supported load capability strings.
pub fn supported_load_capability_strings() -> &'static [&'static str] {
    SUPPORTED_LOAD_CAPABILITY_STRINGS
}

/// Parses one load capability from its string id.
pub fn parse_load_capability(value: &str) -> Result<LoadCapability, LoadCapabilityError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(LoadCapabilityError::EmptyCapability);
    }

    match normalized {
        LOAD_CAPABILITY_EAGER => Ok(LoadCapability::Eager),
        LOAD_CAPABILITY_DEFERRED => Ok(LoadCapability::Deferred),
        other => Err(LoadCapabilityError::UnsupportedCapability(
            other.to_string(),
        )),
    }
}

/// Load capability parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadCapabilityError {
    EmptyCapability,
    UnsupportedCapability(String),
}

impl Display for LoadCapabilityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCapability => write!(f, "load capability value must not be empty"),
            Self::UnsupportedCapability(value) => {
                write!(f, "load capability is unsupported: {value}")
            }
        }
    }
}

impl Error for LoadCapabilityError {}
