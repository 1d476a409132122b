//! Dashboard metadata, node factories and hierarchy construction.
//!
//! # Responsibility
//! - Describe group/link dashboard nodes with a typed metadata schema.
//! - Build the parent/child tree addressed by the slot-naming convention.
//!
//! # Invariants
//! - A node's child slot is always `<slug>-dashboard-slot`.
//! - Sibling order equals registration order.
//! - Hierarchy errors are fatal; no partial tree is ever returned.

pub mod factory;
pub mod hierarchy;
pub mod meta;
