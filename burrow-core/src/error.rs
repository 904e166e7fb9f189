//! Error types for Burrow

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Exit status used when isolation setup fails before the user command runs
pub const SETUP_FAILURE_EXIT: i32 = 125;

/// Exit status when the user command exists but cannot be executed
pub const COMMAND_NOT_EXECUTABLE_EXIT: i32 = 126;

/// Exit status when the user command cannot be found
pub const COMMAND_NOT_FOUND_EXIT: i32 = 127;

/// Burrow error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Caller lacks the privilege needed to create namespaces
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that was denied
        operation: String,
    },

    /// The namespaced child could not be spawned or waited on
    #[error("Failed to launch child: {message}")]
    ChildLaunchFailed {
        /// Error message
        message: String,
    },

    /// `sethostname(2)` was rejected
    #[error("Failed to set hostname: {message}")]
    HostnameSetFailed {
        /// Error message
        message: String,
    },

    /// The root switch could not be completed
    #[error("Failed to switch root: {message}")]
    RootSwitchFailed {
        /// Error message
        message: String,
    },

    /// A pseudo-filesystem could not be mounted
    #[error("Failed to mount pseudo-filesystem: {message}")]
    PseudoMountFailed {
        /// Error message
        message: String,
    },

    /// Resource group creation, configuration or enrollment failed
    #[error("Resource group error: {message}")]
    ResourceGroupFailed {
        /// Error message
        message: String,
    },

    /// The user command failed to start or exited non-zero
    #[error("Command failed with exit code {code}: {message}")]
    ChildCommandFailed {
        /// Exit status to propagate
        code: i32,
        /// Error message
        message: String,
    },

    /// One or more teardown steps failed
    #[error("Teardown failed: {}", failures.join("; "))]
    TeardownFailed {
        /// Every failure observed during teardown
        failures: Vec<String>,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// The launch deadline expired and the child was killed
    #[error("Deadline of {after:?} exceeded, child killed")]
    DeadlineExceeded {
        /// Configured deadline
        after: Duration,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// Launch configuration could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Task join error
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Discriminant of [`Error`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::PermissionDenied`]
    PermissionDenied,
    /// See [`Error::ChildLaunchFailed`]
    ChildLaunchFailed,
    /// See [`Error::HostnameSetFailed`]
    HostnameSetFailed,
    /// See [`Error::RootSwitchFailed`]
    RootSwitchFailed,
    /// See [`Error::PseudoMountFailed`]
    PseudoMountFailed,
    /// See [`Error::ResourceGroupFailed`]
    ResourceGroupFailed,
    /// See [`Error::ChildCommandFailed`]
    ChildCommandFailed,
    /// See [`Error::TeardownFailed`]
    TeardownFailed,
    /// See [`Error::InvalidConfig`]
    InvalidConfig,
    /// See [`Error::DeadlineExceeded`]
    DeadlineExceeded,
    /// I/O, system, serialization or task failures
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PermissionDenied => "permission_denied",
            Self::ChildLaunchFailed => "child_launch_failed",
            Self::HostnameSetFailed => "hostname_set_failed",
            Self::RootSwitchFailed => "root_switch_failed",
            Self::PseudoMountFailed => "pseudo_mount_failed",
            Self::ResourceGroupFailed => "resource_group_failed",
            Self::ChildCommandFailed => "child_command_failed",
            Self::TeardownFailed => "teardown_failed",
            Self::InvalidConfig => "invalid_config",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Shorthand for a [`Error::ResourceGroupFailed`]
    pub fn resource_group(message: impl Into<String>) -> Self {
        Self::ResourceGroupFailed {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::InvalidConfig`]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Payload-free kind of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::ChildLaunchFailed { .. } => ErrorKind::ChildLaunchFailed,
            Self::HostnameSetFailed { .. } => ErrorKind::HostnameSetFailed,
            Self::RootSwitchFailed { .. } => ErrorKind::RootSwitchFailed,
            Self::PseudoMountFailed { .. } => ErrorKind::PseudoMountFailed,
            Self::ResourceGroupFailed { .. } => ErrorKind::ResourceGroupFailed,
            Self::ChildCommandFailed { .. } => ErrorKind::ChildCommandFailed,
            Self::TeardownFailed { .. } => ErrorKind::TeardownFailed,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::Io(_) | Self::System(_) | Self::Serialization(_) | Self::TaskJoin(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Process exit status this error should produce
    ///
    /// The user command's own status is passed through untouched; every
    /// isolation failure collapses to [`SETUP_FAILURE_EXIT`].
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ChildCommandFailed { code, .. } => *code,
            _ => SETUP_FAILURE_EXIT,
        }
    }
}

/// Result type alias for Burrow operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_propagates_its_code() {
        let err = Error::ChildCommandFailed {
            code: 7,
            message: "exited".to_string(),
        };
        assert_eq!(err.exit_code(), 7);
        assert_eq!(err.kind(), ErrorKind::ChildCommandFailed);
    }

    #[test]
    fn setup_failures_share_one_exit_code() {
        let errors = [
            Error::PermissionDenied {
                operation: "launch".to_string(),
            },
            Error::RootSwitchFailed {
                message: "missing".to_string(),
            },
            Error::resource_group("rejected"),
        ];

        for err in errors {
            assert_eq!(err.exit_code(), SETUP_FAILURE_EXIT);
        }
    }

    #[test]
    fn teardown_lists_every_failure() {
        let err = Error::TeardownFailed {
            failures: vec!["/sys: EBUSY".to_string(), "/proc: EINVAL".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("/sys: EBUSY"));
        assert!(text.contains("/proc: EINVAL"));
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(ErrorKind::RootSwitchFailed.to_string(), "root_switch_failed");
    }
}
