//! Pseudo-filesystems mounted inside the jail

use nix::mount::MsFlags;
use std::fmt;

/// A kernel-backed virtual filesystem the jail provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoFs {
    /// Process information tree at `/proc`
    Proc,
    /// Kernel and device information tree at `/sys`
    Sys,
}

impl PseudoFs {
    /// Mount order; teardown walks it backwards
    pub const MOUNT_ORDER: [Self; 2] = [Self::Proc, Self::Sys];

    /// Mount source name
    #[must_use]
    pub const fn source(self) -> &'static str {
        match self {
            Self::Proc => "proc",
            Self::Sys => "sys",
        }
    }

    /// Filesystem type passed to `mount(2)`
    #[must_use]
    pub const fn fstype(self) -> &'static str {
        match self {
            Self::Proc => "proc",
            Self::Sys => "sysfs",
        }
    }

    /// Mount point, relative to the switched root
    #[must_use]
    pub const fn target(self) -> &'static str {
        match self {
            Self::Proc => "/proc",
            Self::Sys => "/sys",
        }
    }

    /// Mount flags; nothing inside may be executed or act as a device
    #[must_use]
    pub const fn flags(self) -> MsFlags {
        MsFlags::MS_NOSUID
            .union(MsFlags::MS_NODEV)
            .union(MsFlags::MS_NOEXEC)
    }
}

impl fmt::Display for PseudoFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target())
    }
}
