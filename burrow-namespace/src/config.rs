//! Namespace configuration

use nix::sched::CloneFlags;
use serde::{Deserialize, Serialize};

/// How mount events propagate out of the new mount namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountPropagation {
    /// Remount `/` recursively private before re-executing
    #[default]
    Private,
    /// Keep whatever propagation the host uses
    Inherit,
}

/// Namespaces a freshly spawned child joins
///
/// A running process never changes its set; only the child created by the
/// launcher gets these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSet {
    /// Enable UTS namespace (hostname)
    pub uts: bool,

    /// Enable PID namespace
    pub pid: bool,

    /// Enable mount namespace
    pub mount: bool,

    /// Propagation applied inside the new mount namespace
    pub propagation: MountPropagation,
}

impl Default for NamespaceSet {
    fn default() -> Self {
        Self {
            uts: true,
            pid: true,
            mount: true,
            propagation: MountPropagation::Private,
        }
    }
}

impl NamespaceSet {
    /// UTS, PID and mount with private propagation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// No namespaces at all
    #[must_use]
    pub const fn none() -> Self {
        Self {
            uts: false,
            pid: false,
            mount: false,
            propagation: MountPropagation::Inherit,
        }
    }

    /// Enable UTS namespace
    #[must_use]
    pub const fn with_uts(mut self, enable: bool) -> Self {
        self.uts = enable;
        self
    }

    /// Enable PID namespace
    #[must_use]
    pub const fn with_pid(mut self, enable: bool) -> Self {
        self.pid = enable;
        self
    }

    /// Enable mount namespace
    #[must_use]
    pub const fn with_mount(mut self, enable: bool) -> Self {
        self.mount = enable;
        self
    }

    /// Set the mount propagation policy
    #[must_use]
    pub const fn with_propagation(mut self, propagation: MountPropagation) -> Self {
        self.propagation = propagation;
        self
    }

    /// Whether `/` must be remounted private in the child
    ///
    /// Only meaningful with a mount namespace; without one the remount would
    /// hit the host.
    #[must_use]
    pub const fn needs_private_remount(&self) -> bool {
        self.mount && matches!(self.propagation, MountPropagation::Private)
    }

    /// Convert to clone flags for clone(2)
    #[must_use]
    pub fn to_clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();

        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }

        flags
    }

    /// Check if any namespaces are enabled
    #[must_use]
    pub const fn has_any(&self) -> bool {
        self.uts || self.pid || self.mount
    }

    /// Get list of enabled namespace names, as they appear under `/proc/<pid>/ns`
    #[must_use]
    pub fn enabled_namespaces(&self) -> Vec<&'static str> {
        let mut namespaces = Vec::new();

        if self.uts {
            namespaces.push("uts");
        }
        if self.pid {
            namespaces.push("pid");
        }
        if self.mount {
            namespaces.push("mnt");
        }

        namespaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set() {
        let set = NamespaceSet::default();
        assert!(set.uts && set.pid && set.mount);
        assert_eq!(set.propagation, MountPropagation::Private);
        assert!(set.needs_private_remount());
    }

    #[test]
    fn test_clone_flags_conversion() {
        let flags = NamespaceSet::new().to_clone_flags();

        assert_eq!(
            flags,
            CloneFlags::CLONE_NEWUTS | CloneFlags::CLONE_NEWPID | CloneFlags::CLONE_NEWNS
        );
        assert!(!flags.contains(CloneFlags::CLONE_NEWNET));
    }

    #[test]
    fn test_private_remount_needs_mount_namespace() {
        let set = NamespaceSet::new().with_mount(false);
        assert!(!set.needs_private_remount());
        assert!(!set.to_clone_flags().contains(CloneFlags::CLONE_NEWNS));
    }

    #[test]
    fn test_enabled_namespaces() {
        let set = NamespaceSet::none().with_pid(true);

        assert_eq!(set.enabled_namespaces(), vec!["pid"]);
        assert!(NamespaceSet::none().enabled_namespaces().is_empty());
        assert!(!NamespaceSet::none().has_any());
    }
}
