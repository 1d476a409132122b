//! Deferred-instantiation contracts for descriptor load handles.
//!
//! # Responsibility
//! - Model the closed `{eager, deferred}` load handle set.
//! - Memoize fetches so each loader runs its underlying work at most once.
//!
//! # Invariants
//! - Eager handles never suspend.
//! - Deferred handles share one in-flight fetch across concurrent callers.
//! - Failures are memoized until the host explicitly asks for a retry.

pub mod loader;
pub(crate) mod memo;
