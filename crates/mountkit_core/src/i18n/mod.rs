//! Lazy, per-locale translation bundles.
//!
//! # Responsibility
//! - Map locale ids to deferred string-table loaders.
//! - Fetch each locale at most once and share the outcome.
//!
//! # Invariants
//! - The index is fixed once built; payloads load only on request.
//! - A missing locale is reported, never silently substituted.

pub mod bundle;
