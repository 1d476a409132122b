//! Extension registration.
//!
//! Descriptors are declared by feature modules, collected by a
//! [`kernel::ManifestBuilder`] and frozen into a [`kernel::Manifest`] that the
//! shell queries per slot. Loading a descriptor's code is deferred to its
//! load handle.

pub mod capability;
pub mod kernel;
pub mod manifest;
