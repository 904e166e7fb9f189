//! Namespace launcher for process isolation
//!
//! This crate starts the isolated child:
//! - UTS namespace - Hostname isolation
//! - PID namespace - Process isolation
//! - Mount namespace - Filesystem isolation, with private propagation
//!
//! The child is created with `clone(2)` and immediately re-executes the
//! current binary in its internal child sub-mode.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod info;
pub mod launcher;

pub use config::{MountPropagation, NamespaceSet};
pub use info::NamespaceInfo;
pub use launcher::{ChildEntry, Launcher, CHILD_MARKER, SELF_EXE};
