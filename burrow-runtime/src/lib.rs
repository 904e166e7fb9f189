//! Child-side bootstrap for Burrow
//!
//! Runs inside the fresh namespaces, in strict order: hostname, root
//! switch, pseudo mounts, resource group, user command, teardown.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod bootstrap;
pub mod state;

pub use bootstrap::{BootstrapOutcome, Bootstrapper};
pub use state::BootstrapState;
