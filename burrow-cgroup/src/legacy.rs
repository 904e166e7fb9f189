//! Legacy (cgroup v1 style) backend
//!
//! Each group is a directory under the memory controller hierarchy holding
//! attribute files that are written directly: the memory ceiling, the
//! notify-on-release flag, and the member list. The `cpu` controller lives in
//! a separate hierarchy that is not exposed to the jail, so CPU weights are
//! refused here.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use burrow_core::{BackendKind, Error, GroupId, ProcessId, ResourceLimits, Result};

use crate::backend::ResourceBackend;
use crate::hierarchy;

/// Memory ceiling attribute
pub const MEMORY_LIMIT_FILE: &str = "memory.limit_in_bytes";

/// Release notification flag
pub const NOTIFY_ON_RELEASE_FILE: &str = "notify_on_release";

/// Backend writing legacy attribute files under a hierarchy root
#[derive(Debug, Clone)]
pub struct LegacyBackend {
    root: PathBuf,
}

impl LegacyBackend {
    /// Create a backend rooted at `root` (typically the memory controller mount)
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
}

#[async_trait]
impl ResourceBackend for LegacyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Legacy
    }

    async fn create_group(&self, id: &GroupId, limits: &ResourceLimits) -> Result<()> {
        let memory = limits.memory_ceiling()?;
        if limits.weight()?.is_some() {
            return Err(Error::resource_group(
                "CPU weight requires the unified backend; the legacy memory hierarchy has no cpu controller",
            ));
        }

        hierarchy::ensure_root(&self.root).await?;

        let mut attributes = Vec::with_capacity(2);
        if let Some(memory) = memory {
            debug!(group = %id, limit = %memory, "Setting memory ceiling");
            attributes.push((MEMORY_LIMIT_FILE, memory.as_bytes().to_string()));
        }
        attributes.push((NOTIFY_ON_RELEASE_FILE, "1".to_string()));

        let dir = hierarchy::create_configured(&self.root, id, &attributes).await?;

        info!(group = %id, path = %dir.display(), "Legacy group created");
        Ok(())
    }

    async fn enroll(&self, id: &GroupId, pid: ProcessId) -> Result<()> {
        hierarchy::enroll(&self.group_path(id), pid).await?;
        debug!(group = %id, pid = pid.as_raw(), "Process enrolled");
        Ok(())
    }

    async fn destroy(&self, id: &GroupId) -> Result<()> {
        hierarchy::remove_group(&self.root, id).await?;
        info!(group = %id, "Legacy group destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn writes_attribute_files() {
        let root = tempfile::tempdir().unwrap();
        let backend = LegacyBackend::new(root.path());
        let id = GroupId::generate();
        let limits = ResourceLimits::unlimited().with_memory_mb(64);

        backend.create_group(&id, &limits).await.unwrap();
        backend.enroll(&id, ProcessId::from_raw(77)).await.unwrap();

        let dir = backend.group_path(&id);
        assert_eq!(
            fs::read_to_string(dir.join(MEMORY_LIMIT_FILE)).unwrap(),
            (64 * 1024 * 1024).to_string()
        );
        assert_eq!(fs::read_to_string(dir.join(NOTIFY_ON_RELEASE_FILE)).unwrap(), "1");
        assert!(!dir.join("cpu.shares").exists());
        assert_eq!(fs::read_to_string(dir.join("cgroup.procs")).unwrap(), "77");
    }

    #[tokio::test]
    async fn rejects_non_positive_memory_before_touching_disk() {
        let root = tempfile::tempdir().unwrap();
        let backend = LegacyBackend::new(root.path());
        let id = GroupId::generate();

        let err = backend
            .create_group(&id, &ResourceLimits::unlimited().with_memory_bytes(-1))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), burrow_core::ErrorKind::ResourceGroupFailed);
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn cpu_weight_is_refused_before_any_write() {
        let root = tempfile::tempdir().unwrap();
        let backend = LegacyBackend::new(root.path());

        let err = backend
            .create_group(
                &GroupId::generate(),
                &ResourceLimits::default().with_cpu_weight(100),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), burrow_core::ErrorKind::ResourceGroupFailed);
        assert!(err.to_string().contains("unified"));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_hierarchy_fails() {
        let backend = LegacyBackend::new("/nonexistent/burrow/hierarchy");
        let err = backend
            .create_group(&GroupId::generate(), &ResourceLimits::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Hierarchy unavailable"));
    }
}
