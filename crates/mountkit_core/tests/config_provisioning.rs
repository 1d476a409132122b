use mountkit_core::{
    merge_config, ConfigSchemaError, DropReason, ManifestBuilder, ManifestError,
};
use serde_json::json;

#[test]
fn merge_keeps_defaults_applies_overrides_and_drops_unknown_keys() {
    let outcome = merge_config(&json!({ "a": 1, "b": 2 }), &json!({ "b": 5, "c": 9 }));

    assert_eq!(outcome.effective, json!({ "a": 1, "b": 5 }));
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].path, "c");
    assert_eq!(outcome.warnings[0].reason, DropReason::UnknownKey);
}

#[test]
fn null_override_leaves_default_in_force() {
    let outcome = merge_config(
        &json!({ "visits": { "limit": 10, "showVoided": false } }),
        &json!({ "visits": { "limit": null, "showVoided": true } }),
    );

    assert_eq!(
        outcome.effective,
        json!({ "visits": { "limit": 10, "showVoided": true } })
    );
    assert!(outcome.warnings.is_empty());
}

#[test]
fn manifest_config_layers_stack_and_snapshots_stay_consistent() {
    let mut builder = ManifestBuilder::new("@test/esm-family-health-app");
    builder
        .define_config_schema(&json!({
            "encounterTypes": {
                "ancVisit": { "_type": "String", "_default": "anc-uuid" },
                "pncVisit": { "_type": "String", "_default": "pnc-uuid" }
            },
            "tiles": { "_type": "Array", "_default": [] }
        }))
        .unwrap();
    builder.provide_config(json!({ "encounterTypes": { "ancVisit": "site-anc" } }));
    let manifest = builder.build().unwrap();

    let before = manifest.config().effective();
    let warnings = manifest.config().provide(json!({
        "encounterTypes": { "pncVisit": 42 },
        "tiles": [{ "title": "ANC" }]
    }));

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, "encounterTypes.pncVisit");
    assert_eq!(
        *manifest.config().effective(),
        json!({
            "encounterTypes": { "ancVisit": "site-anc", "pncVisit": "pnc-uuid" },
            "tiles": [{ "title": "ANC" }]
        })
    );
    assert_eq!(before["tiles"], json!([]));
    assert_eq!(manifest.config().layers().len(), 2);
}

#[test]
fn malformed_schema_is_rejected_at_registration() {
    let mut builder = ManifestBuilder::new("@test/app");
    let err = builder
        .define_config_schema(&json!({ "pageSize": { "_type": "Number", "_default": "ten" } }))
        .unwrap_err();
    assert!(matches!(
        err,
        ManifestError::ConfigSchema(ConfigSchemaError::DefaultTypeMismatch { .. })
    ));
}
