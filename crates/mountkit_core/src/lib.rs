//! Extension registration manifest for a micro-frontend shell.
//! Feature modules declare extensions, pages, dashboards, configuration and
//! translations here; the shell resolves them per slot and loads them lazily.

pub mod backend;
pub mod config;
pub mod dashboard;
pub mod extension;
pub mod i18n;
pub mod lifecycle;
pub mod logging;

pub use backend::{
    BackendAdvisory, BackendRequirement, BackendRequirementError, BackendRequirements,
    VersionRange,
};
pub use config::merge::{merge_config, ConfigKeyDroppedWarning, DropReason, MergeOutcome};
pub use config::schema::{ConfigSchema, ConfigSchemaError, ValueType};
pub use config::store::ConfigStore;
pub use dashboard::factory::{
    create_dashboard_group, create_dashboard_link, dashboard_extension, DashboardComponent,
    DashboardGroup, DashboardLink,
};
pub use dashboard::hierarchy::{DashboardHierarchy, DashboardNode, DashboardTree, HierarchyError};
pub use dashboard::meta::{dashboard_slot_for, DashboardKind, DashboardMeta};
pub use extension::capability::{
    parse_load_capability, supported_load_capability_strings, LoadCapability, LoadCapabilityError,
};
pub use extension::kernel::{FeatureModule, Manifest, ManifestBuilder, ManifestError, SlotEntries};
pub use extension::manifest::{
    validate_slot, ExtensionDescriptor, ExtensionMeta, PageDefinition, SlotRejection,
};
pub use i18n::bundle::{StringTable, TranslationBundleIndex, TranslationError};
pub use lifecycle::loader::{
    async_lifecycle, ready_lifecycle, sync_lifecycle, DeferredLoader, EagerLoader,
    LoadFailureError, LoadHandle, LoadedModule, Provenance,
};
pub use logging::{default_log_level, init_logging, logging_status};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
