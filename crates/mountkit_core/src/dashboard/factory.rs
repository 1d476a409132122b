//! Group/link node factories producing descriptor `load`/`meta` pairs.

use crate::dashboard::meta::{DashboardKind, DashboardMeta};
use crate::extension::manifest::{ExtensionDescriptor, ExtensionMeta};
use crate::lifecycle::loader::{sync_lifecycle, LoadedModule, Provenance};
use std::sync::Arc;

/// Renderer-facing dashboard node produced by the eager loaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardComponent {
    Group(DashboardGroup),
    Link(DashboardLink),
}

impl DashboardComponent {
    pub fn title(&self) -> &str {
        match self {
            Self::Group(group) => &group.title,
            Self::Link(link) => &link.title,
        }
    }

    /// Slot the component renders its content into.
    pub fn slot_name(&self) -> &str {
        match self {
            Self::Group(group) => &group.slot_name,
            Self::Link(link) => &link.slot_name,
        }
    }
}

/// Expandable container rendering its children from `slot_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardGroup {
    pub title: String,
    pub slot_name: String,
    pub is_expanded: bool,
    pub icon: Option<String>,
    /// Detail route for group-link pairings.
    pub path: Option<String>,
}

/// Navigation entry opening the view rendered from `slot_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardLink {
    pub title: String,
    pub path: String,
    pub slot_name: String,
    pub columns: u8,
    pub icon: Option<String>,
}

/// Builds the group component for `meta`.
///
/// Group-links keep their slug as detail `path`.
pub fn create_dashboard_group(meta: &DashboardMeta) -> DashboardComponent {
    DashboardComponent::Group(DashboardGroup {
        title: meta.title.clone(),
        slot_name: meta.dashboard_slot(),
        is_expanded: meta.is_expanded,
        icon: meta.icon.clone(),
        path: (meta.kind == DashboardKind::GroupLink).then(|| meta.slug.clone()),
    })
}

/// Builds the link component for `meta`.
pub fn create_dashboard_link(meta: &DashboardMeta) -> DashboardComponent {
    DashboardComponent::Link(DashboardLink {
        title: meta.title.clone(),
        path: meta.slug.clone(),
        slot_name: meta.dashboard_slot(),
        columns: meta.columns,
        icon: meta.icon.clone(),
    })
}

/// Builds the descriptor registering `meta` into its parent slot.
///
/// The load handle is eager: dashboard nodes are lightweight and always
/// needed once their parent renders.
pub fn dashboard_extension(
    id: impl Into<String>,
    meta: DashboardMeta,
    provenance: Provenance,
) -> ExtensionDescriptor {
    let node = meta.clone();
    let load = sync_lifecycle(
        move || {
            let component = if node.accepts_children() {
                create_dashboard_group(&node)
            } else {
                create_dashboard_link(&node)
            };
            Arc::new(component) as LoadedModule
        },
        provenance,
    );

    ExtensionDescriptor::new(id, meta.parent_slot.clone(), load)
        .with_meta(ExtensionMeta::Dashboard(meta))
}
