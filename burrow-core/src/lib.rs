//! Burrow Core - Foundation types, configuration, and errors
//!
//! This crate provides the core abstractions shared by the launcher and the
//! in-jail bootstrapper.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod resources;
pub mod types;

pub use config::{BackendKind, HostBind, LaunchConfig, HOST_DIR_ENV};
pub use error::{Error, ErrorKind, Result};
pub use resources::{CpuWeight, MemorySize, ResourceLimits};
pub use types::{GroupId, LaunchRequest, ProcessId};
