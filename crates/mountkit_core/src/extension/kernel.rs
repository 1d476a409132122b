//! Manifest builder and the immutable manifest it produces.

use crate::backend::{BackendRequirementError, BackendRequirements};
use crate::config::schema::{ConfigSchema, ConfigSchemaError};
use crate::config::store::ConfigStore;
use crate::dashboard::factory::dashboard_extension;
use crate::dashboard::hierarchy::{DashboardHierarchy, DashboardTree, HierarchyError};
use crate::dashboard::meta::DashboardMeta;
use crate::extension::manifest::{
    is_valid_descriptor_id, validate_slot, ExtensionDescriptor, PageDefinition, SlotRejection,
};
use crate::i18n::bundle::{StringTable, TranslationBundleIndex, TranslationError};
use crate::lifecycle::loader::Provenance;
use log::{debug, error, info};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;

/// Build-time manifest errors. All of them abort the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    DuplicateId(String),
    InvalidId(String),
    InvalidSlot {
        id: String,
        slot: String,
        reason: SlotRejection,
    },
    InvalidRoute(String),
    Dashboard(HierarchyError),
    ConfigSchema(ConfigSchemaError),
    Backend(BackendRequirementError),
    Translation(TranslationError),
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "extension id already registered: {id}"),
            Self::InvalidId(id) => write!(f, "extension id is invalid: {id:?}"),
            Self::InvalidSlot { id, slot, reason } => {
                write!(f, "extension `{id}` has invalid slot `{slot}`: {reason}")
            }
            Self::InvalidRoute(route) => write!(f, "page route is invalid: {route:?}"),
            Self::Dashboard(err) => write!(f, "dashboard hierarchy rejected: {err}"),
            Self::ConfigSchema(err) => write!(f, "config schema rejected: {err}"),
            Self::Backend(err) => write!(f, "backend requirement rejected: {err}"),
            Self::Translation(err) => write!(f, "translation rejected: {err}"),
        }
    }
}

impl Error for ManifestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Dashboard(err) => Some(err),
            Self::ConfigSchema(err) => Some(err),
            Self::Backend(err) => Some(err),
            Self::Translation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HierarchyError> for ManifestError {
    fn from(err: HierarchyError) -> Self {
        Self::Dashboard(err)
    }
}

impl From<ConfigSchemaError> for ManifestError {
    fn from(err: ConfigSchemaError) -> Self {
        Self::ConfigSchema(err)
    }
}

impl From<BackendRequirementError> for ManifestError {
    fn from(err: BackendRequirementError) -> Self {
        Self::Backend(err)
    }
}

impl From<TranslationError> for ManifestError {
    fn from(err: TranslationError) -> Self {
        Self::Translation(err)
    }
}

/// Feature module contributing registrations to a manifest.
pub trait FeatureModule {
    fn module_name(&self) -> &str;
    fn register(&self, builder: &mut ManifestBuilder) -> Result<(), ManifestError>;
}

/// Builder state captured before a feature module registers.
struct Checkpoint {
    descriptors: usize,
    pages: usize,
    overrides: usize,
    schema: ConfigSchema,
    backend: BackendRequirements,
    translations: TranslationBundleIndex,
}

/// Append-only registration phase of a manifest.
#[derive(Debug)]
pub struct ManifestBuilder {
    module_name: String,
    descriptors: Vec<ExtensionDescriptor>,
    ids: HashMap<String, usize>,
    slot_index: BTreeMap<String, Vec<usize>>,
    pages: Vec<PageDefinition>,
    host_slots: BTreeSet<String>,
    schema: ConfigSchema,
    overrides: Vec<Value>,
    backend: BackendRequirements,
    translations: TranslationBundleIndex,
}

impl ManifestBuilder {
    pub fn new(module_name: impl Into<String>) -> Self {
        let module_name = module_name.into();
        Self {
            translations: TranslationBundleIndex::new(module_name.clone()),
            module_name,
            descriptors: Vec::new(),
            ids: HashMap::new(),
            slot_index: BTreeMap::new(),
            pages: Vec::new(),
            host_slots: BTreeSet::new(),
            schema: ConfigSchema::default(),
            overrides: Vec::new(),
            backend: BackendRequirements::new(),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Declares a shell-owned slot that root dashboard nodes may mount into.
    pub fn with_host_slot(mut self, slot: impl Into<String>) -> Self {
        self.host_slots.insert(slot.into());
        self
    }

    /// Appends one descriptor.
    ///
    /// # Errors
    /// - `InvalidId` for blank ids or ids containing whitespace.
    /// - `InvalidSlot` for malformed slots, or a dashboard descriptor whose
    ///   slot differs from its parent slot.
    /// - `DuplicateId` when the id is taken; the earlier entry is kept.
    pub fn register_extension(
        &mut self,
        descriptor: ExtensionDescriptor,
    ) -> Result<(), ManifestError> {
        let id = descriptor.id();
        if !is_valid_descriptor_id(id) {
            return Err(ManifestError::InvalidId(id.to_string()));
        }
        validate_slot(descriptor.slot()).map_err(|reason| ManifestError::InvalidSlot {
            id: id.to_string(),
            slot: descriptor.slot().to_string(),
            reason,
        })?;
        if let Some(meta) = descriptor.dashboard() {
            if meta.parent_slot != descriptor.slot() {
                return Err(ManifestError::InvalidSlot {
                    id: id.to_string(),
                    slot: descriptor.slot().to_string(),
                    reason: SlotRejection::ParentMismatch,
                });
            }
        }
        if self.ids.contains_key(id) {
            return Err(ManifestError::DuplicateId(id.to_string()));
        }

        let index = self.descriptors.len();
        debug!(
            "event=extension_register module=manifest status=ok id={} slot={} load={} feature={}",
            id,
            descriptor.slot(),
            descriptor.load().capability(),
            descriptor.feature_name()
        );
        self.ids.insert(id.to_string(), index);
        self.slot_index
            .entry(descriptor.slot().to_string())
            .or_default()
            .push(index);
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Registers a dashboard node into its parent slot.
    pub fn register_dashboard(
        &mut self,
        id: impl Into<String>,
        meta: DashboardMeta,
        provenance: Provenance,
    ) -> Result<(), ManifestError> {
        self.register_extension(dashboard_extension(id, meta, provenance))
    }

    pub fn register_page(&mut self, page: PageDefinition) -> Result<(), ManifestError> {
        if page.route.trim().is_empty() {
            return Err(ManifestError::InvalidRoute(page.route));
        }
        self.pages.push(page);
        Ok(())
    }

    /// Replaces the configuration schema with `schema` parsed from JSON.
    pub fn define_config_schema(&mut self, schema: &Value) -> Result<(), ManifestError> {
        self.schema = ConfigSchema::from_json(schema)?;
        Ok(())
    }

    /// Queues an override layer applied at build time, in call order.
    pub fn provide_config(&mut self, overrides: Value) {
        self.overrides.push(overrides);
    }

    pub fn require_backend(
        &mut self,
        module: impl Into<String>,
        range: &str,
    ) -> Result<(), ManifestError> {
        self.backend.require(module, range)?;
        Ok(())
    }

    pub fn register_translation<F, Fut, E>(
        &mut self,
        locale: impl Into<String>,
        factory: F,
    ) -> Result<(), ManifestError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StringTable, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.translations.register(locale, factory)?;
        Ok(())
    }

    /// Replaces the translation index, e.g. one built by `from_dir`.
    pub fn set_translations(&mut self, translations: TranslationBundleIndex) {
        self.translations = translations;
    }

    /// Lets `module` register its entries into this builder.
    ///
    /// All or nothing: when `register` fails, every entry the module added
    /// before the failure is removed again and the builder stays usable.
    pub fn install(&mut self, module: &impl FeatureModule) -> Result<(), ManifestError> {
        let checkpoint = self.checkpoint();
        let before = checkpoint.descriptors;
        if let Err(err) = module.register(self) {
            let discarded = self.descriptors.len() - before;
            self.rollback(checkpoint);
            error!(
                "event=module_install module=manifest status=error feature_module={} discarded={} error={}",
                module.module_name(),
                discarded,
                err
            );
            return Err(err);
        }
        info!(
            "event=module_install module=manifest status=ok feature_module={} extensions={}",
            module.module_name(),
            self.descriptors.len() - before
        );
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            descriptors: self.descriptors.len(),
            pages: self.pages.len(),
            overrides: self.overrides.len(),
            schema: self.schema.clone(),
            backend: self.backend.clone(),
            translations: self.translations.clone(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        let kept = checkpoint.descriptors;
        self.descriptors.truncate(kept);
        self.ids.retain(|_, index| *index < kept);
        self.slot_index.retain(|_, indices| {
            indices.retain(|index| *index < kept);
            !indices.is_empty()
        });
        self.pages.truncate(checkpoint.pages);
        self.overrides.truncate(checkpoint.overrides);
        self.schema = checkpoint.schema;
        self.backend = checkpoint.backend;
        self.translations = checkpoint.translations;
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Validates the dashboard hierarchy, applies config layers and freezes
    /// the registrations.
    pub fn build(self) -> Result<Manifest, ManifestError> {
        let dashboards = DashboardHierarchy::build(
            self.descriptors
                .iter()
                .filter_map(ExtensionDescriptor::dashboard),
            &self.host_slots,
        )
        .map_err(|err| {
            error!(
                "event=manifest_build module=manifest status=error owner={} error={}",
                self.module_name, err
            );
            ManifestError::Dashboard(err)
        })?;

        let config = ConfigStore::new(self.module_name.clone(), self.schema);
        for overrides in self.overrides {
            config.provide(overrides);
        }

        let manifest = Manifest {
            module_name: self.module_name,
            descriptors: self.descriptors,
            ids: self.ids,
            slot_index: self.slot_index,
            pages: self.pages,
            host_slots: self.host_slots,
            dashboards,
            config,
            backend: self.backend,
            translations: self.translations,
        };

        for slot in manifest.shared_slots() {
            debug!(
                "event=slot_shared module=manifest status=ok slot={} owners={}",
                slot,
                manifest.slot_owners(slot).join(",")
            );
        }
        info!(
            "event=manifest_build module=manifest status=ok owner={} extensions={} slots={} dashboards={} pages={} locales={}",
            manifest.module_name,
            manifest.descriptors.len(),
            manifest.slot_index.len(),
            manifest.dashboards.len(),
            manifest.pages.len(),
            manifest.translations.len()
        );
        Ok(manifest)
    }
}

/// Frozen registrations of one feature module.
#[derive(Debug)]
pub struct Manifest {
    module_name: String,
    descriptors: Vec<ExtensionDescriptor>,
    ids: HashMap<String, usize>,
    slot_index: BTreeMap<String, Vec<usize>>,
    pages: Vec<PageDefinition>,
    host_slots: BTreeSet<String>,
    dashboards: DashboardTree,
    config: ConfigStore,
    backend: BackendRequirements,
    translations: TranslationBundleIndex,
}

impl Manifest {
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Descriptors registered into `slot`, in registration order.
    ///
    /// Unknown slots resolve to an empty sequence.
    pub fn resolve_slot(&self, slot: &str) -> SlotEntries<'_> {
        let indices = self.slot_index.get(slot).map_or(&[][..], Vec::as_slice);
        SlotEntries {
            descriptors: &self.descriptors,
            indices: indices.iter(),
        }
    }

    pub fn extension(&self, id: &str) -> Option<&ExtensionDescriptor> {
        self.ids.get(id).map(|&index| &self.descriptors[index])
    }

    /// All descriptors in registration order.
    pub fn extensions(&self) -> &[ExtensionDescriptor] {
        &self.descriptors
    }

    /// Slots holding at least one descriptor, sorted.
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slot_index.keys().map(String::as_str)
    }

    /// Slots claimed by descriptors of more than one module.
    pub fn shared_slots(&self) -> Vec<&str> {
        self.slot_names()
            .filter(|slot| self.slot_owners(slot).len() > 1)
            .collect()
    }

    /// Distinct module names registered into `slot`, sorted.
    pub fn slot_owners(&self, slot: &str) -> Vec<&str> {
        self.resolve_slot(slot)
            .map(ExtensionDescriptor::module_name)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn host_slots(&self) -> &BTreeSet<String> {
        &self.host_slots
    }

    pub fn pages(&self) -> &[PageDefinition] {
        &self.pages
    }

    pub fn dashboards(&self) -> &DashboardTree {
        &self.dashboards
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn backend_dependencies(&self) -> &BackendRequirements {
        &self.backend
    }

    pub fn translations(&self) -> &TranslationBundleIndex {
        &self.translations
    }
}

/// Restartable iterator over the descriptors of one slot.
#[derive(Debug, Clone)]
pub struct SlotEntries<'a> {
    descriptors: &'a [ExtensionDescriptor],
    indices: std::slice::Iter<'a, usize>,
}

impl<'a> SlotEntries<'a> {
    /// Descriptor ids of the remaining entries.
    pub fn ids(self) -> Vec<&'a str> {
        self.map(ExtensionDescriptor::id).collect()
    }
}

impl<'a> Iterator for SlotEntries<'a> {
    type Item = &'a ExtensionDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        self.indices.next().map(|&index| &self.descriptors[index])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl ExactSizeIterator for SlotEntries<'_> {}

#[cfg(test)]
mod tests {
    use super::{FeatureModule, ManifestBuilder, ManifestError};
    use crate::dashboard::meta::DashboardMeta;
    use crate::extension::manifest::{
        ExtensionDescriptor, ExtensionMeta, PageDefinition, SlotRejection,
    };
    use crate::i18n::bundle::StringTable;
    use crate::lifecycle::loader::{ready_lifecycle, LoadHandle, LoadedModule, Provenance};
    use serde_json::json;
    use std::sync::Arc;

    const HOST_SLOT: &str = "patient-chart-dashboard-slot";

    fn handle(feature: &str, module: &str) -> LoadHandle {
        ready_lifecycle(
            Arc::new(feature.to_string()) as LoadedModule,
            Provenance::new(feature, module),
        )
    }

    fn descriptor(id: &str, slot: &str) -> ExtensionDescriptor {
        ExtensionDescriptor::new(id, slot, handle(id, "@test/app"))
    }

    #[test]
    fn resolves_slots_in_registration_order() {
        let mut builder = ManifestBuilder::new("@test/app");
        builder
            .register_extension(descriptor("vitals", "summary-slot"))
            .expect("vitals");
        builder
            .register_extension(descriptor("allergies", "other-slot"))
            .expect("allergies");
        builder
            .register_extension(descriptor("biometrics", "summary-slot"))
            .expect("biometrics");
        let manifest = builder.build().expect("manifest builds");

        let entries = manifest.resolve_slot("summary-slot");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.clone().ids(), vec!["vitals", "biometrics"]);
        assert_eq!(entries.ids(), vec!["vitals", "biometrics"]);
        assert_eq!(manifest.resolve_slot("missing-slot").count(), 0);
        assert_eq!(
            manifest.slot_names().collect::<Vec<_>>(),
            vec!["other-slot", "summary-slot"]
        );
    }

    #[test]
    fn rejects_duplicate_ids_and_keeps_first_registration() {
        let mut builder = ManifestBuilder::new("@test/app");
        builder
            .register_extension(descriptor("vitals", "summary-slot"))
            .expect("first");
        let err = builder
            .register_extension(descriptor("vitals", "other-slot"))
            .expect_err("duplicate");
        assert_eq!(err, ManifestError::DuplicateId("vitals".to_string()));

        let manifest = builder.build().expect("manifest builds");
        assert_eq!(
            manifest.extension("vitals").map(ExtensionDescriptor::slot),
            Some("summary-slot")
        );
        assert_eq!(manifest.resolve_slot("other-slot").count(), 0);
    }

    #[test]
    fn rejects_invalid_ids_and_slots() {
        let mut builder = ManifestBuilder::new("@test/app");
        assert_eq!(
            builder.register_extension(descriptor(" ", "summary-slot")),
            Err(ManifestError::InvalidId(" ".to_string()))
        );
        assert_eq!(
            builder.register_extension(descriptor("vitals", "../summary")),
            Err(ManifestError::InvalidSlot {
                id: "vitals".to_string(),
                slot: "../summary".to_string(),
                reason: SlotRejection::PathTraversal,
            })
        );
        assert!(builder.is_empty());
    }

    #[test]
    fn dashboard_descriptor_must_target_its_parent_slot() {
        let meta = DashboardMeta::link("pnc", "PNC", "mch-dashboard-slot");
        let mismatched =
            ExtensionDescriptor::new("pnc", "elsewhere-slot", handle("pnc", "@test/app"))
                .with_meta(ExtensionMeta::Dashboard(meta));

        let mut builder = ManifestBuilder::new("@test/app");
        let err = builder
            .register_extension(mismatched)
            .expect_err("slot mismatch");
        assert!(matches!(
            err,
            ManifestError::InvalidSlot {
                reason: SlotRejection::ParentMismatch,
                ..
            }
        ));
    }

    #[test]
    fn dangling_dashboard_parent_fails_the_build() {
        let mut builder = ManifestBuilder::new("@test/app").with_host_slot(HOST_SLOT);
        builder
            .register_dashboard(
                "pnc",
                DashboardMeta::link("pnc", "PNC", "mch-dashboard-slot"),
                Provenance::new("PNC", "@test/app"),
            )
            .expect("registration itself succeeds");

        let err = builder.build().expect_err("no group exposes mch slot");
        assert!(matches!(err, ManifestError::Dashboard(_)));
    }

    #[test]
    fn applies_schema_and_override_layers_at_build() {
        let mut builder = ManifestBuilder::new("@test/app");
        builder
            .define_config_schema(&json!({
                "showBanner": { "_type": "Boolean", "_default": false },
                "pageSize": { "_type": "Number", "_default": 10 }
            }))
            .expect("schema parses");
        builder.provide_config(json!({ "pageSize": 25, "unknown": true }));
        let manifest = builder.build().expect("manifest builds");

        assert_eq!(
            *manifest.config().effective(),
            json!({ "showBanner": false, "pageSize": 25 })
        );
        assert_eq!(manifest.config().layers().len(), 1);
    }

    #[test]
    fn rejects_blank_page_routes_and_keeps_page_order() {
        let mut builder = ManifestBuilder::new("@test/app");
        assert!(matches!(
            builder.register_page(PageDefinition::new("  ", handle("blank", "@test/app"))),
            Err(ManifestError::InvalidRoute(_))
        ));
        builder
            .register_page(PageDefinition::new("home", handle("home", "@test/app")))
            .expect("home");
        builder
            .register_page(PageDefinition::new("patient/:uuid", handle("chart", "@test/app")))
            .expect("chart");

        let manifest = builder.build().expect("manifest builds");
        let routes: Vec<&str> = manifest.pages().iter().map(|p| p.route.as_str()).collect();
        assert_eq!(routes, vec!["home", "patient/:uuid"]);
    }

    #[test]
    fn reports_slots_shared_between_modules() {
        struct Referrals;

        impl FeatureModule for Referrals {
            fn module_name(&self) -> &str {
                "@test/referrals"
            }

            fn register(&self, builder: &mut ManifestBuilder) -> Result<(), ManifestError> {
                builder.register_extension(ExtensionDescriptor::new(
                    "referral-summary",
                    "summary-slot",
                    handle("referral-summary", self.module_name()),
                ))
            }
        }

        let mut builder = ManifestBuilder::new("@test/app");
        builder
            .register_extension(descriptor("vitals", "summary-slot"))
            .expect("vitals");
        builder
            .register_extension(descriptor("allergies", "allergy-slot"))
            .expect("allergies");
        builder.install(&Referrals).expect("module installs");

        let manifest = builder.build().expect("manifest builds");
        assert_eq!(manifest.shared_slots(), vec!["summary-slot"]);
        assert_eq!(
            manifest.slot_owners("summary-slot"),
            vec!["@test/app", "@test/referrals"]
        );
    }

    #[test]
    fn failed_install_leaves_no_partial_registration() {
        struct HalfBroken;

        impl FeatureModule for HalfBroken {
            fn module_name(&self) -> &str {
                "@test/half-broken"
            }

            fn register(&self, builder: &mut ManifestBuilder) -> Result<(), ManifestError> {
                builder.register_extension(ExtensionDescriptor::new(
                    "growth-chart",
                    "summary-slot",
                    handle("growth-chart", self.module_name()),
                ))?;
                builder.register_extension(ExtensionDescriptor::new(
                    "growth-alerts",
                    "alerts-slot",
                    handle("growth-alerts", self.module_name()),
                ))?;
                builder.register_page(PageDefinition::new(
                    "growth",
                    handle("growth-page", self.module_name()),
                ))?;
                builder.define_config_schema(&json!({
                    "chartType": { "_type": "String", "_default": "who" }
                }))?;
                builder.provide_config(json!({ "chartType": "cdc" }));
                builder.require_backend("growth", "^1.0.0")?;
                builder.register_translation("en", || async {
                    Ok::<_, String>(StringTable::new())
                })?;
                builder.register_extension(descriptor("vitals", "summary-slot"))
            }
        }

        let mut builder = ManifestBuilder::new("@test/app");
        builder
            .register_extension(descriptor("vitals", "summary-slot"))
            .expect("vitals");

        let err = builder.install(&HalfBroken).expect_err("duplicate id");
        assert_eq!(err, ManifestError::DuplicateId("vitals".to_string()));
        assert_eq!(builder.len(), 1);

        builder
            .register_extension(descriptor("growth-chart", "growth-slot"))
            .expect("id is free again");
        let manifest = builder.build().expect("manifest builds");
        assert_eq!(manifest.resolve_slot("summary-slot").ids(), vec!["vitals"]);
        assert_eq!(manifest.resolve_slot("alerts-slot").count(), 0);
        assert_eq!(
            manifest.slot_names().collect::<Vec<_>>(),
            vec!["growth-slot", "summary-slot"]
        );
        assert!(manifest.pages().is_empty());
        assert!(manifest.backend_dependencies().is_empty());
        assert!(!manifest.translations().contains("en"));
        assert!(manifest.config().layers().is_empty());
        assert_eq!(*manifest.config().effective(), json!({}));
    }
}
