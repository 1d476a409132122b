//! Snapshot store for a module's effective configuration.

use crate::config::merge::ConfigKeyDroppedWarning;
use crate::config::schema::ConfigSchema;
use log::info;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone)]
struct ConfigSnapshot {
    layers: Vec<Arc<Value>>,
    effective: Arc<Value>,
}

/// Effective configuration of one module.
///
/// Each `provide` call installs a new snapshot built from the previous one;
/// `Arc`s handed out earlier keep pointing at the state they captured.
#[derive(Debug)]
pub struct ConfigStore {
    module_name: String,
    schema: ConfigSchema,
    state: RwLock<ConfigSnapshot>,
}

impl ConfigStore {
    pub fn new(module_name: impl Into<String>, schema: ConfigSchema) -> Self {
        let effective = Arc::new(schema.defaults());
        Self {
            module_name: module_name.into(),
            schema,
            state: RwLock::new(ConfigSnapshot {
                layers: Vec::new(),
                effective,
            }),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    /// Installs one override layer on top of the current snapshot.
    ///
    /// Returns the warnings for keys of this layer that were dropped.
    pub fn provide(&self, overrides: Value) -> Vec<ConfigKeyDroppedWarning> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let outcome = self.schema.merge_onto(&state.effective, &overrides);

        let mut layers = state.layers.clone();
        layers.push(Arc::new(overrides));
        *state = ConfigSnapshot {
            layers,
            effective: Arc::new(outcome.effective),
        };

        info!(
            "event=config_provide module=config status=ok owner={} layers={} dropped={}",
            self.module_name,
            state.layers.len(),
            outcome.warnings.len()
        );
        outcome.warnings
    }

    /// Current effective configuration snapshot.
    pub fn effective(&self) -> Arc<Value> {
        self.read_snapshot().effective
    }

    /// Override layers installed so far, oldest first.
    pub fn layers(&self) -> Vec<Arc<Value>> {
        self.read_snapshot().layers
    }

    /// Looks up one effective value by dotted path.
    pub fn get(&self, path: &str) -> Option<Value> {
        let effective = self.effective();
        path.split('.')
            .try_fold(&*effective, |value, segment| value.get(segment))
            .cloned()
    }

    fn read_snapshot(&self) -> ConfigSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
