//! Handle to a live resource group

use tracing::{debug, info, warn};
use burrow_core::{GroupId, ProcessId, ResourceLimits, Result};

use crate::backend::ResourceBackend;

/// A created group that the caller must [`destroy`](Self::destroy)
///
/// Creation validates limits before the backend is touched, generates a
/// collision-free id, creates the group, and enrolls the given process.
pub struct ResourceGroup<'a, B: ResourceBackend + ?Sized> {
    backend: &'a B,
    id: GroupId,
    active: bool,
}

impl<'a, B: ResourceBackend + ?Sized> ResourceGroup<'a, B> {
    /// Create a group with `limits` and enroll `pid`
    ///
    /// If enrollment fails the half-built group is removed again.
    ///
    /// # Errors
    /// Returns [`burrow_core::Error::ResourceGroupFailed`] on invalid limits
    /// or any backend failure
    pub async fn create(backend: &'a B, limits: &ResourceLimits, pid: ProcessId) -> Result<Self> {
        limits.validate()?;

        let id = GroupId::generate();
        debug!(group = %id, backend = %backend.kind(), "Creating resource group");

        backend.create_group(&id, limits).await?;

        if let Err(e) = backend.enroll(&id, pid).await {
            if let Err(cleanup) = backend.destroy(&id).await {
                warn!(group = %id, error = %cleanup, "Could not remove group after failed enrollment");
            }
            return Err(e);
        }

        info!(group = %id, pid = pid.as_raw(), "Process enrolled in resource group");

        Ok(Self {
            backend,
            id,
            active: true,
        })
    }

    /// Group identifier
    #[must_use]
    pub const fn id(&self) -> &GroupId {
        &self.id
    }

    /// Remove the group from its hierarchy
    ///
    /// # Errors
    /// Returns the backend error if removal fails
    pub async fn destroy(mut self) -> Result<()> {
        self.active = false;
        self.backend.destroy(&self.id).await
    }
}

impl<B: ResourceBackend + ?Sized> Drop for ResourceGroup<'_, B> {
    /// Async removal cannot run here; report the leak instead
    fn drop(&mut self) {
        if self.active {
            warn!(group = %self.id, "Resource group dropped without being destroyed");
        }
    }
}

impl<B: ResourceBackend + ?Sized> std::fmt::Debug for ResourceGroup<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGroup")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
