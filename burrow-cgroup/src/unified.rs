//! Unified hierarchy (cgroup v2) backend
//!
//! Groups are configured through a structured [`ResourceDescriptor`] instead
//! of raw attribute writes, and kernel rejections are translated into
//! messages naming the controller or value at fault.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use burrow_core::{
    BackendKind, CpuWeight, Error, GroupId, MemorySize, ProcessId, ResourceLimits, Result,
};

use crate::backend::ResourceBackend;
use crate::hierarchy;

/// Lists controllers available in a group
pub const CONTROLLERS_FILE: &str = "cgroup.controllers";

/// Controllers delegated to child groups
pub const SUBTREE_CONTROL_FILE: &str = "cgroup.subtree_control";

/// Memory ceiling attribute
pub const MEMORY_MAX_FILE: &str = "memory.max";

/// CPU weight attribute
pub const CPU_WEIGHT_FILE: &str = "cpu.weight";

/// Validated resources for one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceDescriptor {
    /// Memory ceiling
    pub memory_max: Option<MemorySize>,
    /// CPU weight
    pub cpu_weight: Option<CpuWeight>,
}

impl ResourceDescriptor {
    /// Controllers that must be enabled to apply this descriptor
    #[must_use]
    pub fn required_controllers(&self) -> Vec<&'static str> {
        let mut controllers = Vec::new();
        if self.memory_max.is_some() {
            controllers.push("memory");
        }
        if self.cpu_weight.is_some() {
            controllers.push("cpu");
        }
        controllers
    }
}

impl TryFrom<&ResourceLimits> for ResourceDescriptor {
    type Error = Error;

    fn try_from(limits: &ResourceLimits) -> Result<Self> {
        Ok(Self {
            memory_max: limits.memory_ceiling()?,
            cpu_weight: limits.weight()?,
        })
    }
}

/// Backend driving the unified hierarchy
#[derive(Debug, Clone)]
pub struct UnifiedBackend {
    root: PathBuf,
}

impl UnifiedBackend {
    /// Create a backend rooted at `root` (the parent of every burrow group)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Hierarchy root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a group
    #[must_use]
    pub fn group_path(&self, id: &GroupId) -> PathBuf {
        hierarchy::group_dir(&self.root, id)
    }

    /// Apply a descriptor to an existing group
    ///
    /// # Errors
    /// Returns [`Error::ResourceGroupFailed`] describing the rejected attribute
    pub async fn apply(&self, id: &GroupId, descriptor: &ResourceDescriptor) -> Result<()> {
        let dir = self.group_path(id);

        if let Some(memory) = descriptor.memory_max {
            debug!(group = %id, limit = %memory, "Setting memory.max");
            write_structured(&dir, MEMORY_MAX_FILE, "memory", &memory.as_bytes().to_string())
                .await?;
        }

        if let Some(weight) = descriptor.cpu_weight {
            debug!(group = %id, weight = weight.as_u64(), "Setting cpu.weight");
            write_structured(&dir, CPU_WEIGHT_FILE, "cpu", &weight.as_u64().to_string()).await?;
        }

        Ok(())
    }

    /// Make sure the root exposes and delegates the controllers we need
    async fn enable_controllers(&self, needed: &[&str]) -> Result<()> {
        let available_file = self.root.join(CONTROLLERS_FILE);
        let available = fs::read_to_string(&available_file).await.map_err(|e| {
            Error::resource_group(format!(
                "Unified hierarchy not found at {}: {e}",
                self.root.display()
            ))
        })?;

        if let Some(missing) = needed
            .iter()
            .find(|c| !available.split_whitespace().any(|a| a == **c))
        {
            return Err(Error::resource_group(format!(
                "Controller '{missing}' is not available in {}",
                self.root.display()
            )));
        }

        let control_file = self.root.join(SUBTREE_CONTROL_FILE);
        let current = fs::read_to_string(&control_file).await.unwrap_or_default();

        let to_enable: Vec<String> = needed
            .iter()
            .filter(|c| !current.split_whitespace().any(|e| e == **c))
            .map(|c| format!("+{c}"))
            .collect();

        if to_enable.is_empty() {
            debug!("All required controllers already enabled");
            return Ok(());
        }

        let to_enable = to_enable.join(" ");
        debug!(root = %self.root.display(), controllers = %to_enable, "Enabling controllers");

        if let Err(e) = fs::write(&control_file, &to_enable).await {
            // Delegation may be managed higher up; a missing controller shows
            // up as a structured error when its attribute is written.
            debug!(error = %e, "Could not enable controllers");
        }

        Ok(())
    }
}

/// Write an attribute, naming the controller on failure
async fn write_structured(dir: &Path, file: &str, controller: &str, value: &str) -> Result<()> {
    fs::write(dir.join(file), value).await.map_err(|e| {
        let reason = match e.kind() {
            io::ErrorKind::NotFound => {
                format!("{controller} controller is not enabled for this group")
            }
            io::ErrorKind::PermissionDenied => format!("permission denied writing {file}"),
            io::ErrorKind::InvalidInput => format!("kernel rejected {file}={value}"),
            _ => format!("writing {file} failed: {e}"),
        };
        Error::resource_group(reason)
    })
}

#[async_trait]
impl ResourceBackend for UnifiedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Unified
    }

    async fn create_group(&self, id: &GroupId, limits: &ResourceLimits) -> Result<()> {
        let descriptor = ResourceDescriptor::try_from(limits)?;

        hierarchy::ensure_root(&self.root).await?;
        self.enable_controllers(&descriptor.required_controllers())
            .await?;

        let dir = hierarchy::create_group_dir(&self.root, id).await?;

        if let Err(e) = self.apply(id, &descriptor).await {
            // Leave no half-configured group behind
            hierarchy::discard(&self.root, id).await;
            return Err(e);
        }

        info!(group = %id, path = %dir.display(), "Unified group created");
        Ok(())
    }

    async fn enroll(&self, id: &GroupId, pid: ProcessId) -> Result<()> {
        hierarchy::enroll(&self.group_path(id), pid).await?;
        debug!(group = %id, pid = pid.as_raw(), "Process enrolled");
        Ok(())
    }

    async fn destroy(&self, id: &GroupId) -> Result<()> {
        hierarchy::remove_group(&self.root, id).await?;
        info!(group = %id, "Unified group destroyed");
        Ok(())
    }
}
