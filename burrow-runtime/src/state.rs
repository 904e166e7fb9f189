//! Bootstrap state machine

use std::fmt;
use burrow_core::ErrorKind;

/// Where a bootstrap currently stands
///
/// The happy path is `Init → HostnameSet → RootSwitched → Mounted →
/// ResourceLimited → Running → Unmounted`. `Exited` means the command ran
/// but the pseudo-filesystems could not be unmounted. Any failure ends in
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapState {
    /// Nothing done yet
    Init,
    /// Hostname applied to the UTS namespace
    HostnameSet,
    /// Process confined to the new root
    RootSwitched,
    /// `/proc` and `/sys` mounted
    Mounted,
    /// Process enrolled in its resource group
    ResourceLimited,
    /// User command started
    Running,
    /// Command finished and pseudo-filesystems removed
    Unmounted,
    /// Command finished, teardown incomplete
    Exited,
    /// Bootstrap or command failed
    Failed(ErrorKind),
}

impl BootstrapState {
    /// Whether no further transition may happen
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Check a transition against the fixed step order
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::HostnameSet)
                | (Self::HostnameSet, Self::RootSwitched)
                | (Self::RootSwitched, Self::Mounted)
                | (Self::Mounted, Self::ResourceLimited)
                | (Self::ResourceLimited, Self::Running)
                | (Self::Running, Self::Unmounted | Self::Exited)
                | (
                    Self::Init
                        | Self::HostnameSet
                        | Self::RootSwitched
                        | Self::Mounted
                        | Self::ResourceLimited
                        | Self::Running
                        | Self::Unmounted
                        | Self::Exited,
                    Self::Failed(_)
                )
        )
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::HostnameSet => write!(f, "hostname-set"),
            Self::RootSwitched => write!(f, "root-switched"),
            Self::Mounted => write!(f, "mounted"),
            Self::ResourceLimited => write!(f, "resource-limited"),
            Self::Running => write!(f, "running"),
            Self::Unmounted => write!(f, "unmounted"),
            Self::Exited => write!(f, "exited"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}
