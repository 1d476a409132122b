use mountkit_core::{
    ready_lifecycle, ExtensionDescriptor, LoadedModule, ManifestBuilder, ManifestError,
    Provenance, SlotRejection,
};
use std::sync::Arc;

const MODULE: &str = "@test/esm-patient-chart-app";

fn descriptor(id: &str, slot: &str) -> ExtensionDescriptor {
    ExtensionDescriptor::new(
        id,
        slot,
        ready_lifecycle(
            Arc::new(id.to_string()) as LoadedModule,
            Provenance::new(id, MODULE),
        ),
    )
}

fn build(entries: &[(&str, &str)]) -> mountkit_core::Manifest {
    let mut builder = ManifestBuilder::new(MODULE);
    for (id, slot) in entries {
        builder.register_extension(descriptor(id, slot)).unwrap();
    }
    builder.build().unwrap()
}

#[test]
fn duplicate_id_fails_and_leaves_prior_registration_untouched() {
    let mut builder = ManifestBuilder::new(MODULE);
    builder
        .register_extension(descriptor("vitals-widget", "patient-summary-slot"))
        .unwrap();

    let err = builder
        .register_extension(descriptor("vitals-widget", "patient-banner-slot"))
        .unwrap_err();
    assert_eq!(err, ManifestError::DuplicateId("vitals-widget".to_string()));
    assert_eq!(builder.len(), 1);

    let manifest = builder.build().unwrap();
    let vitals = manifest.extension("vitals-widget").unwrap();
    assert_eq!(vitals.slot(), "patient-summary-slot");
    let value = vitals.load().load_now().unwrap();
    assert_eq!(value.downcast_ref::<String>().unwrap(), "vitals-widget");
    assert_eq!(manifest.resolve_slot("patient-banner-slot").count(), 0);
}

#[test]
fn resolve_slot_follows_registration_order() {
    let manifest = build(&[
        ("allergies", "patient-summary-slot"),
        ("banner", "patient-banner-slot"),
        ("conditions", "patient-summary-slot"),
        ("vitals", "patient-summary-slot"),
    ]);

    assert_eq!(
        manifest.resolve_slot("patient-summary-slot").ids(),
        vec!["allergies", "conditions", "vitals"]
    );
    assert_eq!(
        manifest.resolve_slot("patient-banner-slot").ids(),
        vec!["banner"]
    );
}

#[test]
fn reordering_registration_changes_order_but_not_membership() {
    let forward = build(&[
        ("allergies", "patient-summary-slot"),
        ("conditions", "patient-summary-slot"),
        ("vitals", "patient-summary-slot"),
    ]);
    let reversed = build(&[
        ("vitals", "patient-summary-slot"),
        ("conditions", "patient-summary-slot"),
        ("allergies", "patient-summary-slot"),
    ]);

    let mut forward_ids = forward.resolve_slot("patient-summary-slot").ids();
    let reversed_ids = reversed.resolve_slot("patient-summary-slot").ids();
    assert_eq!(reversed_ids, vec!["vitals", "conditions", "allergies"]);

    let mut sorted_reversed = reversed_ids.clone();
    forward_ids.sort_unstable();
    sorted_reversed.sort_unstable();
    assert_eq!(forward_ids, sorted_reversed);
}

#[test]
fn unpopulated_slot_resolves_to_empty_sequence() {
    let manifest = build(&[("vitals", "patient-summary-slot")]);

    let mut entries = manifest.resolve_slot("never-registered-slot");
    assert_eq!(entries.len(), 0);
    assert!(entries.next().is_none());
}

#[test]
fn resolve_slot_restarts_deterministically() {
    let manifest = build(&[
        ("allergies", "patient-summary-slot"),
        ("vitals", "patient-summary-slot"),
    ]);

    let mut partial = manifest.resolve_slot("patient-summary-slot");
    assert_eq!(partial.next().map(ExtensionDescriptor::id), Some("allergies"));

    let rest = partial.clone().ids();
    assert_eq!(rest, vec!["vitals"]);
    assert_eq!(
        manifest.resolve_slot("patient-summary-slot").ids(),
        vec!["allergies", "vitals"]
    );
}

#[test]
fn malformed_slots_are_rejected() {
    let mut builder = ManifestBuilder::new(MODULE);
    for (slot, reason) in [
        ("", SlotRejection::Empty),
        ("..", SlotRejection::PathTraversal),
        ("patient/summary", SlotRejection::PathTraversal),
        ("Patient-Summary", SlotRejection::InvalidCharacter('P')),
        ("patient-summary-", SlotRejection::TrailingSeparator),
    ] {
        let err = builder
            .register_extension(descriptor("widget", slot))
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::InvalidSlot {
                id: "widget".to_string(),
                slot: slot.to_string(),
                reason,
            }
        );
    }
    assert!(builder.is_empty());
}
