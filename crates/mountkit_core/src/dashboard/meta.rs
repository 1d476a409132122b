//! Dashboard node metadata.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Suffix appended to a node slug to synthesize its own slot name.
pub const DASHBOARD_SLOT_SUFFIX: &str = "-dashboard-slot";

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

/// Role of a node inside the dashboard hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardKind {
    /// Container exposing its slot to child dashboard nodes.
    Group,
    /// Leaf pointer whose slot hosts feature extensions.
    Link,
    /// Group whose own detail view is reached through the same slot.
    GroupLink,
}

impl DashboardKind {
    /// Whether other dashboard nodes may attach to this node's slot.
    pub fn accepts_children(self) -> bool {
        matches!(self, Self::Group | Self::GroupLink)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Link => "link",
            Self::GroupLink => "group_link",
        }
    }
}

/// Typed metadata of one dashboard node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMeta {
    /// Sluggable identity; unique across one hierarchy.
    pub slug: String,
    /// User-facing label.
    pub title: String,
    /// Slot this node mounts into: a host slot or a group's dashboard slot.
    pub parent_slot: String,
    pub kind: DashboardKind,
    #[serde(default)]
    pub icon: Option<String>,
    /// Layout hint for the detail view.
    #[serde(default = "default_columns")]
    pub columns: u8,
    /// Whether a group renders expanded by default.
    #[serde(default)]
    pub is_expanded: bool,
}

impl DashboardMeta {
    pub fn new(
        kind: DashboardKind,
        slug: impl Into<String>,
        title: impl Into<String>,
        parent_slot: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            parent_slot: parent_slot.into(),
            kind,
            icon: None,
            columns: default_columns(),
            is_expanded: false,
        }
    }

    pub fn group(
        slug: impl Into<String>,
        title: impl Into<String>,
        parent_slot: impl Into<String>,
    ) -> Self {
        Self::new(DashboardKind::Group, slug, title, parent_slot)
    }

    pub fn link(
        slug: impl Into<String>,
        title: impl Into<String>,
        parent_slot: impl Into<String>,
    ) -> Self {
        Self::new(DashboardKind::Link, slug, title, parent_slot)
    }

    pub fn group_link(
        slug: impl Into<String>,
        title: impl Into<String>,
        parent_slot: impl Into<String>,
    ) -> Self {
        Self::new(DashboardKind::GroupLink, slug, title, parent_slot)
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_columns(mut self, columns: u8) -> Self {
        self.columns = columns.max(1);
        self
    }

    pub fn expanded(mut self) -> Self {
        self.is_expanded = true;
        self
    }

    /// Synthesized slot of this node, e.g. `mch-dashboard-slot`.
    pub fn dashboard_slot(&self) -> String {
        dashboard_slot_for(&self.slug)
    }

    pub fn accepts_children(&self) -> bool {
        self.kind.accepts_children()
    }
}

/// Synthesizes the dashboard slot for `slug`.
pub fn dashboard_slot_for(slug: &str) -> String {
    format!("{slug}{DASHBOARD_SLOT_SUFFIX}")
}

/// Returns whether `slug` is lowercase kebab-case.
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

fn default_columns() -> u8 {
    1
}

#[cfg(test)]
mod tests {
    use super::{dashboard_slot_for, is_valid_slug, DashboardKind, DashboardMeta};

    #[test]
    fn synthesizes_slot_from_slug() {
        let meta = DashboardMeta::group("family-health", "Family Health", "patient-chart-dashboard-slot");
        assert_eq!(meta.dashboard_slot(), "family-health-dashboard-slot");
        assert_eq!(dashboard_slot_for("mch"), "mch-dashboard-slot");
    }

    #[test]
    fn only_group_kinds_accept_children() {
        assert!(DashboardKind::Group.accepts_children());
        assert!(DashboardKind::GroupLink.accepts_children());
        assert!(!DashboardKind::Link.accepts_children());
    }

    #[test]
    fn validates_slug_format() {
        assert!(is_valid_slug("child-health"));
        assert!(is_valid_slug("eid2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Child Health"));
        assert!(!is_valid_slug("mch-"));
        assert!(!is_valid_slug("a--b"));
    }

    #[test]
    fn deserializes_with_layout_defaults() {
        let meta: DashboardMeta = serde_json::from_value(serde_json::json!({
            "slug": "pnc",
            "title": "PNC",
            "parent_slot": "mch-dashboard-slot",
            "kind": "link"
        }))
        .expect("meta should deserialize");

        assert_eq!(meta.kind, DashboardKind::Link);
        assert_eq!(meta.columns, 1);
        assert!(!meta.is_expanded);
        assert_eq!(meta.icon, None);
    }

    #[test]
    fn columns_never_drop_below_one() {
        let meta = DashboardMeta::link("anc", "ANC", "mch-dashboard-slot").with_columns(0);
        assert_eq!(meta.columns, 1);
    }
}
