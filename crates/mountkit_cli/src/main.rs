//! CLI smoke entry point.
//!
//! # Responsibility
//! - Build a small sample manifest against `mountkit_core`.
//! - Print slot resolution, the dashboard tree and each extension's load capability.
//! - Load the listed extensions, blocking only on handles that may suspend.
//!
//! Usage: `mountkit_cli [eager|deferred]` limits the listing to one capability.

use futures::executor::block_on;
use mountkit_core::{
    async_lifecycle, core_version, default_log_level, init_logging, parse_load_capability,
    supported_load_capability_strings, DashboardMeta, ExtensionDescriptor, FeatureModule,
    LoadCapability, LoadedModule, Manifest, ManifestBuilder, ManifestError, Provenance,
    StringTable,
};
use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;

const MODULE_NAME: &str = "@sample/esm-family-health-app";
const HOST_SLOT: &str = "patient-chart-dashboard-slot";

struct FamilyHealth;

impl FeatureModule for FamilyHealth {
    fn module_name(&self) -> &str {
        MODULE_NAME
    }

    fn register(&self, builder: &mut ManifestBuilder) -> Result<(), ManifestError> {
        let provenance = |feature: &str| Provenance::new(feature, MODULE_NAME);

        builder.register_dashboard(
            "family-health-group",
            DashboardMeta::group("family-health", "Family Health", HOST_SLOT).expanded(),
            provenance("family-health"),
        )?;
        builder.register_dashboard(
            "mch-dashboard",
            DashboardMeta::link("mch", "MCH", "family-health-dashboard-slot"),
            provenance("mch"),
        )?;
        builder.register_extension(ExtensionDescriptor::new(
            "mch-summary-ext",
            "mch-dashboard-slot",
            async_lifecycle(
                || async { Ok::<_, String>(Arc::new("MchSummary".to_string()) as LoadedModule) },
                provenance("mch-summary"),
            ),
        ))?;

        builder.define_config_schema(&json!({
            "showRecentVisits": { "_type": "Boolean", "_default": true }
        }))?;
        builder.require_backend("webservices.rest", "^2.24.0")?;
        builder.register_translation("en", || async {
            Ok::<_, String>(StringTable::from([(
                "familyHealth".to_string(),
                "Family Health".to_string(),
            )]))
        })?;
        Ok(())
    }
}

fn build_manifest() -> Result<Manifest, ManifestError> {
    let mut builder = ManifestBuilder::new(MODULE_NAME).with_host_slot(HOST_SLOT);
    builder.install(&FamilyHealth)?;
    builder.build()
}

fn capability_filter() -> Result<Option<LoadCapability>, String> {
    let Some(arg) = std::env::args().nth(1) else {
        return Ok(None);
    };
    parse_load_capability(&arg).map(Some).map_err(|err| {
        format!(
            "{err}; expected one of {}",
            supported_load_capability_strings().join("|")
        )
    })
}

/// String payloads print as themselves; other components by their feature name.
fn describe<'a>(module: &'a LoadedModule, descriptor: &'a ExtensionDescriptor) -> &'a str {
    module
        .downcast_ref::<String>()
        .map_or(descriptor.feature_name(), String::as_str)
}

/// Loads `descriptor` twice; only handles that may suspend are driven by an executor.
fn load_twice(descriptor: &ExtensionDescriptor) -> Result<(), String> {
    let handle = descriptor.load();
    for _ in 0..2 {
        let module = if handle.capability().may_suspend() {
            block_on(handle.load()).map_err(|err| err.to_string())?
        } else {
            handle
                .load_now()
                .ok_or_else(|| format!("{} did not resolve synchronously", descriptor.id()))?
        };
        println!(
            "loaded {} -> {} fetches={}",
            descriptor.id(),
            describe(&module, descriptor),
            handle.fetch_count()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = init_logging(default_log_level(), None) {
        eprintln!("logging disabled: {err}");
    }
    println!("mountkit_core version={}", core_version());

    let filter = match capability_filter() {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let manifest = match build_manifest() {
        Ok(manifest) => manifest,
        Err(err) => {
            eprintln!("manifest rejected: {err}");
            return ExitCode::FAILURE;
        }
    };

    for slot in manifest.slot_names() {
        println!("slot {slot} -> {:?}", manifest.resolve_slot(slot).ids());
    }
    for (depth, node) in manifest.dashboards().iter() {
        println!(
            "{}{} [{}] -> {}",
            "  ".repeat(depth),
            node.meta.title,
            node.meta.kind.as_str(),
            node.slot
        );
    }

    let selected: Vec<&ExtensionDescriptor> = manifest
        .extensions()
        .iter()
        .filter(|descriptor| {
            filter.map_or(true, |wanted| descriptor.load().capability() == wanted)
        })
        .collect();
    for descriptor in &selected {
        let capability = descriptor.load().capability();
        println!(
            "extension {} [{capability}] {}",
            descriptor.id(),
            capability.description()
        );
    }
    for descriptor in selected {
        if let Err(err) = load_twice(descriptor) {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    }

    println!("config {}", manifest.config().effective());
    ExitCode::SUCCESS
}
