//! Resource groups with pluggable cgroup backends
//!
//! This crate provides a trait-based abstraction over the two cgroup
//! layouts a host may expose, a static probe that picks one, and a handle
//! that guarantees creation, enrollment and removal happen as a unit.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod group;
pub mod hierarchy;
pub mod legacy;
pub mod probe;
pub mod unified;

pub use backend::{MockBackend, MockFailure, ResourceBackend};
pub use group::ResourceGroup;
pub use legacy::LegacyBackend;
pub use unified::{ResourceDescriptor, UnifiedBackend};

// Re-export commonly used types
pub use burrow_core::{BackendKind, GroupId, ResourceLimits};
