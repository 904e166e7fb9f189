//! Launch configuration shared by the launcher and the bootstrapper
//!
//! The launcher builds a [`LaunchConfig`] from its command line and hands it
//! to the re-executed child as a single JSON argument.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, ResourceLimits, Result};

/// Environment variable naming the in-jail path of the host directory
pub const HOST_DIR_ENV: &str = "BURROW_HOST_DIR";

/// Hostname given to the container when none is requested
pub const DEFAULT_HOSTNAME: &str = "container";

/// Kernel limit for a hostname (`HOST_NAME_MAX`)
pub const MAX_HOSTNAME_LENGTH: usize = 64;

/// Host side of the unified cgroup hierarchy
pub const UNIFIED_HIERARCHY: &str = "/sys/fs/cgroup";

/// Host side of the legacy memory controller hierarchy
pub const LEGACY_MEMORY_HIERARCHY: &str = "/sys/fs/cgroup/memory";

/// Where the host directory appears inside the jail
pub const DEFAULT_JAIL_HOST_DIR: &str = "/host_info";

/// Resource group backend flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// cgroup v1 style per-controller attribute files
    Legacy,
    /// cgroup v2 unified hierarchy
    Unified,
}

impl BackendKind {
    /// Host hierarchy conventionally used by this backend
    #[must_use]
    pub const fn default_hierarchy(self) -> &'static str {
        match self {
            Self::Legacy => LEGACY_MEMORY_HIERARCHY,
            Self::Unified => UNIFIED_HIERARCHY,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Unified => f.write_str("unified"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "unified" => Ok(Self::Unified),
            other => Err(Error::invalid_config(format!(
                "Unknown cgroup backend: {other}"
            ))),
        }
    }
}

/// A host directory exposed inside the jail through a bind mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBind {
    /// Directory on the host
    pub source: PathBuf,
    /// Absolute path inside the new root
    pub jail_path: PathBuf,
}

impl HostBind {
    /// Create a bind of `source` at `jail_path`
    pub fn new(source: impl Into<PathBuf>, jail_path: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            jail_path: jail_path.into(),
        }
    }

    /// Host-side location of the mount point under `rootfs`
    #[must_use]
    pub fn target_under(&self, rootfs: &Path) -> PathBuf {
        rootfs.join(self.jail_path.strip_prefix("/").unwrap_or(&self.jail_path))
    }
}

/// Everything the isolated child needs besides the user command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Hostname set inside the UTS namespace
    pub hostname: String,
    /// Prepared root filesystem
    pub rootfs: PathBuf,
    /// Host directory holding the resource group hierarchy
    pub host_bind: HostBind,
    /// Resource group backend
    pub backend: BackendKind,
    /// Limits applied to the process tree
    pub limits: ResourceLimits,
    /// Optional overall deadline
    pub timeout: Option<Duration>,
}

impl LaunchConfig {
    /// Configuration with defaults for everything but the root filesystem
    pub fn new(rootfs: impl Into<PathBuf>) -> Self {
        let backend = BackendKind::Unified;
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            rootfs: rootfs.into(),
            host_bind: HostBind::new(backend.default_hierarchy(), DEFAULT_JAIL_HOST_DIR),
            backend,
            limits: ResourceLimits::default(),
            timeout: None,
        }
    }

    /// Set the hostname
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the backend, resetting the host bind to its conventional hierarchy
    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self.host_bind.source = PathBuf::from(backend.default_hierarchy());
        self
    }

    /// Expose a different host directory
    #[must_use]
    pub fn with_host_dir(mut self, source: impl Into<PathBuf>) -> Self {
        self.host_bind.source = source.into();
        self
    }

    /// Set the limits
    #[must_use]
    pub const fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set an overall deadline
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check values that can be verified without touching the system
    ///
    /// Resource limits are deliberately left to the resource limiter.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for an empty or oversized hostname, an
    /// empty root path or a relative jail path
    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty() {
            return Err(Error::invalid_config("Hostname cannot be empty"));
        }
        if self.hostname.len() > MAX_HOSTNAME_LENGTH {
            return Err(Error::invalid_config(format!(
                "Hostname too long (max {MAX_HOSTNAME_LENGTH} bytes)"
            )));
        }
        if self.rootfs.as_os_str().is_empty() {
            return Err(Error::invalid_config("Root filesystem path cannot be empty"));
        }
        if !self.host_bind.jail_path.is_absolute() {
            return Err(Error::invalid_config(format!(
                "Jail path must be absolute: {}",
                self.host_bind.jail_path.display()
            )));
        }
        Ok(())
    }

    /// Encode for the child command line
    ///
    /// # Errors
    /// Returns [`Error::Serialization`] if encoding fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the child command line
    ///
    /// # Errors
    /// Returns [`Error::Serialization`] if the payload is malformed
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
