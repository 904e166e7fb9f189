//! Static backend selection
//!
//! The launcher probes the host once at startup; the result travels to the
//! child inside the launch configuration and is never renegotiated.

use std::path::Path;
use burrow_core::config::UNIFIED_HIERARCHY;
use burrow_core::BackendKind;

use crate::backend::ResourceBackend;
use crate::legacy::LegacyBackend;
use crate::unified::{UnifiedBackend, CONTROLLERS_FILE};

/// Pick the backend for the hierarchy mounted at `mount`
///
/// A unified hierarchy exposes `cgroup.controllers` at its root; anything
/// else is treated as the legacy layout.
#[must_use]
pub fn detect(mount: &Path) -> BackendKind {
    if mount.join(CONTROLLERS_FILE).is_file() {
        BackendKind::Unified
    } else {
        BackendKind::Legacy
    }
}

/// Probe the host's standard cgroup mount point
#[must_use]
pub fn detect_host() -> BackendKind {
    let kind = detect(Path::new(UNIFIED_HIERARCHY));
    tracing::debug!(backend = %kind, "Probed cgroup hierarchy");
    kind
}

/// Build the backend of `kind` rooted at `root`
#[must_use]
pub fn open(kind: BackendKind, root: &Path) -> Box<dyn ResourceBackend> {
    match kind {
        BackendKind::Legacy => Box::new(LegacyBackend::new(root)),
        BackendKind::Unified => Box::new(UnifiedBackend::new(root)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_unified_by_controllers_file() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(detect(root.path()), BackendKind::Legacy);

        std::fs::write(root.path().join(CONTROLLERS_FILE), "memory").unwrap();
        assert_eq!(detect(root.path()), BackendKind::Unified);
    }

    #[test]
    fn open_matches_kind() {
        let root = Path::new("/tmp");
        assert_eq!(open(BackendKind::Legacy, root).kind(), BackendKind::Legacy);
        assert_eq!(open(BackendKind::Unified, root).kind(), BackendKind::Unified);
    }
}
