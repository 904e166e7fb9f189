//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

/// Per-process counter appended to generated group ids
static GROUP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Resource group identifier with validation
///
/// Generated ids look like `burrow-<pid>-<nanos>-<seq>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    /// Maximum length for group IDs
    pub const MAX_LENGTH: usize = 64;

    /// Prefix of every generated id
    pub const PREFIX: &'static str = "burrow";

    /// Create a new `GroupId` with validation
    ///
    /// # Errors
    /// Returns error if ID is invalid (empty, too long, or contains invalid characters)
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Generate an id unique across concurrent launches on this host
    ///
    /// Combines the calling pid, a nanosecond timestamp and a process-local
    /// sequence number, so two calls within the same clock tick still differ.
    #[must_use]
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seq = GROUP_SEQUENCE.fetch_add(1, Ordering::Relaxed);

        Self(format!(
            "{}-{}-{nanos}-{seq}",
            Self::PREFIX,
            ProcessId::current()
        ))
    }

    /// Validate a group ID
    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::invalid_config("Group ID cannot be empty"));
        }

        if id.len() > Self::MAX_LENGTH {
            return Err(Error::invalid_config(format!(
                "Group ID too long (max {} chars)",
                Self::MAX_LENGTH
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::invalid_config(
                "Group ID can only contain alphanumeric, dash, and underscore",
            ));
        }

        Ok(())
    }

    /// Trailing sequence component of a generated id
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.0.rsplit('-').next()?.parse().ok()
    }

    /// Get the group ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for GroupId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<GroupId> for String {
    fn from(id: GroupId) -> Self {
        id.0
    }
}

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        nix::unistd::getpid().into()
    }

    /// Convert to `nix::unistd::Pid`
    #[must_use]
    pub const fn as_nix_pid(self) -> nix::unistd::Pid {
        nix::unistd::Pid::from_raw(self.0)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        Self::from_raw(pid.0)
    }
}

/// What to run and where
///
/// Immutable once built; the launcher and bootstrapper only borrow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    command: String,
    args: Vec<String>,
    rootfs: PathBuf,
}

impl LaunchRequest {
    /// Build a request
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the command or root path is empty
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        rootfs: impl Into<PathBuf>,
    ) -> Result<Self> {
        let command = command.into();
        let rootfs = rootfs.into();

        if command.is_empty() {
            return Err(Error::invalid_config("Command cannot be empty"));
        }
        if rootfs.as_os_str().is_empty() {
            return Err(Error::invalid_config("Root filesystem path cannot be empty"));
        }

        Ok(Self {
            command,
            args,
            rootfs,
        })
    }

    /// Build a request from a `[command, args...]` vector
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `argv` is empty
    pub fn from_argv(argv: &[String], rootfs: impl Into<PathBuf>) -> Result<Self> {
        let (command, args) = argv
            .split_first()
            .ok_or_else(|| Error::invalid_config("Command cannot be empty"))?;
        Self::new(command.clone(), args.to_vec(), rootfs)
    }

    /// Program to execute
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Arguments passed to the program
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Prepared root filesystem
    #[must_use]
    pub fn rootfs(&self) -> &Path {
        &self.rootfs
    }

    /// Command followed by its arguments
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.command.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_id_validation() {
        assert!(GroupId::new("valid-id_123").is_ok());
        assert!(GroupId::new("").is_err());
        assert!(GroupId::new("a".repeat(65)).is_err());
        assert!(GroupId::new("invalid id").is_err());
        assert!(GroupId::new("invalid/id").is_err());
    }

    #[test]
    fn test_generated_ids_are_valid() {
        let id = GroupId::generate();
        assert!(GroupId::new(id.as_str()).is_ok());
        assert!(id.as_str().starts_with("burrow-"));
        assert!(id.as_str().contains(&ProcessId::current().to_string()));
    }

    #[test]
    fn test_generated_ids_carry_increasing_sequence() {
        let first = GroupId::generate();
        let second = GroupId::generate();

        assert_ne!(first, second);
        assert!(second.sequence() > first.sequence());
    }

    #[test]
    fn test_group_id_serde() {
        let id = GroupId::new("test-123").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: GroupId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_process_id() {
        let pid = ProcessId::from_raw(123);
        assert_eq!(pid.as_raw(), 123);

        let nix_pid = pid.as_nix_pid();
        assert_eq!(nix_pid.as_raw(), 123);
    }

    #[test]
    fn test_launch_request_from_argv() {
        let argv = vec!["echo".to_string(), "hi".to_string()];
        let request = LaunchRequest::from_argv(&argv, "/srv/rootfs").unwrap();

        assert_eq!(request.command(), "echo");
        assert_eq!(request.args(), ["hi".to_string()]);
        assert_eq!(request.rootfs(), Path::new("/srv/rootfs"));
        assert_eq!(request.argv(), argv);
    }

    #[test]
    fn test_launch_request_rejects_empty_command() {
        assert!(LaunchRequest::from_argv(&[], "/srv/rootfs").is_err());
        assert!(LaunchRequest::new("", Vec::new(), "/srv/rootfs").is_err());
        assert!(LaunchRequest::new("sh", Vec::new(), "").is_err());
    }
}
