//! Configuration schema, override merge and snapshot store.
//!
//! # Responsibility
//! - Parse the module's configuration schema and derive its defaults.
//! - Merge override payloads into defaults, schema-shaped.
//! - Install override layers as new immutable snapshots.
//!
//! # Invariants
//! - Effective configuration never contains keys the schema does not declare.
//! - Dropped keys and rejected shapes are logged, never raised as errors.
//! - A snapshot handed out once is never mutated.

pub mod merge;
pub mod schema;
pub mod store;
