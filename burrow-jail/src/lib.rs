//! Filesystem jail for the isolated child
//!
//! This crate confines the calling process:
//! - hostname inside the UTS namespace
//! - root switch via `chroot(2)`, with an optional host bind mount
//! - `/proc` and `/sys` inside the new root, with aggregated teardown

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod jail;
pub mod mock;
pub mod pseudo;

pub use jail::{FilesystemJail, Jail};
pub use mock::{JailOp, MockJail};
pub use pseudo::PseudoFs;
