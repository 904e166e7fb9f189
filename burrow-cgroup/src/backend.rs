//! Resource backend trait for pluggable implementations

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use burrow_core::{BackendKind, Error, GroupId, ProcessId, ResourceLimits, Result};

/// Trait for resource group backends
///
/// This allows for different implementations:
/// - [`LegacyBackend`](crate::LegacyBackend) - cgroup v1 attribute files
/// - [`UnifiedBackend`](crate::UnifiedBackend) - cgroup v2 unified hierarchy
/// - [`MockBackend`] - Testing without filesystem
///
/// Every implementation validates `limits` before its first write.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    /// Which hierarchy flavor this backend drives
    fn kind(&self) -> BackendKind;

    /// Create a group and apply its limits
    ///
    /// # Errors
    /// Returns [`Error::ResourceGroupFailed`] if the limits are invalid, the
    /// hierarchy is unavailable, or a write is rejected
    async fn create_group(&self, id: &GroupId, limits: &ResourceLimits) -> Result<()>;

    /// Add a process to a group
    ///
    /// # Errors
    /// Returns [`Error::ResourceGroupFailed`] if the process cannot be added
    async fn enroll(&self, id: &GroupId, pid: ProcessId) -> Result<()>;

    /// Remove a group
    ///
    /// # Errors
    /// Returns [`Error::ResourceGroupFailed`] if the group cannot be removed
    async fn destroy(&self, id: &GroupId) -> Result<()>;
}

#[async_trait]
impl<T: ResourceBackend + ?Sized> ResourceBackend for Box<T> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    async fn create_group(&self, id: &GroupId, limits: &ResourceLimits) -> Result<()> {
        (**self).create_group(id, limits).await
    }

    async fn enroll(&self, id: &GroupId, pid: ProcessId) -> Result<()> {
        (**self).enroll(id, pid).await
    }

    async fn destroy(&self, id: &GroupId) -> Result<()> {
        (**self).destroy(id).await
    }
}

/// Operation a [`MockBackend`] can be told to reject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Fail `create_group`
    Create,
    /// Fail `enroll`
    Enroll,
    /// Fail `destroy`
    Destroy,
}

/// Mock backend for testing (doesn't touch filesystem)
///
/// # Example
/// ```
/// use burrow_cgroup::{MockBackend, ResourceBackend};
/// use burrow_core::{GroupId, ProcessId, ResourceLimits};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let backend = MockBackend::new();
/// let id = GroupId::generate();
///
/// backend.create_group(&id, &ResourceLimits::default()).await.unwrap();
/// backend.enroll(&id, ProcessId::from_raw(123)).await.unwrap();
/// assert!(backend.has_member(&id, ProcessId::from_raw(123)).await);
///
/// backend.destroy(&id).await.unwrap();
/// assert!(backend.was_destroyed(&id).await);
/// # });
/// ```
#[derive(Clone)]
pub struct MockBackend {
    kind: BackendKind,
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    groups: HashMap<GroupId, MockGroup>,
    created: Vec<(GroupId, ResourceLimits)>,
    destroyed: Vec<GroupId>,
    writes: usize,
    fail_on: Option<MockFailure>,
}

struct MockGroup {
    limits: ResourceLimits,
    members: Vec<ProcessId>,
}

impl MockBackend {
    /// Create a new mock backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            kind: BackendKind::Unified,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create a mock that rejects one operation
    #[must_use]
    pub fn failing(failure: MockFailure) -> Self {
        Self {
            kind: BackendKind::Unified,
            state: Arc::new(Mutex::new(MockState {
                fail_on: Some(failure),
                ..MockState::default()
            })),
        }
    }

    /// Number of groups currently alive
    pub async fn group_count(&self) -> usize {
        self.state.lock().await.groups.len()
    }

    /// Number of simulated attribute writes (limits and memberships)
    pub async fn writes(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Check if a process is a member of a group
    pub async fn has_member(&self, id: &GroupId, pid: ProcessId) -> bool {
        self.state
            .lock()
            .await
            .groups
            .get(id)
            .is_some_and(|g| g.members.contains(&pid))
    }

    /// Limits a live group was created with
    pub async fn limits(&self, id: &GroupId) -> Option<ResourceLimits> {
        self.state.lock().await.groups.get(id).map(|g| g.limits)
    }

    /// Every group ever created with its limits, in creation order
    pub async fn created(&self) -> Vec<(GroupId, ResourceLimits)> {
        self.state.lock().await.created.clone()
    }

    /// Ids of every destroyed group, in destruction order
    pub async fn destroyed(&self) -> Vec<GroupId> {
        self.state.lock().await.destroyed.clone()
    }

    /// Check if a group was destroyed
    pub async fn was_destroyed(&self, id: &GroupId) -> bool {
        self.state.lock().await.destroyed.contains(id)
    }

    fn injected(state: &MockState, op: MockFailure) -> Result<()> {
        if state.fail_on == Some(op) {
            return Err(Error::resource_group(format!("Mock: injected {op:?} failure")));
        }
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl ResourceBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn create_group(&self, id: &GroupId, limits: &ResourceLimits) -> Result<()> {
        limits.validate()?;

        let mut state = self.state.lock().await;
        Self::injected(&state, MockFailure::Create)?;

        if state.groups.contains_key(id) {
            return Err(Error::resource_group(format!("Group {id} already exists")));
        }

        state.writes += usize::from(limits.memory_max.is_some())
            + usize::from(limits.cpu_weight.is_some());
        state.created.push((id.clone(), *limits));
        state.groups.insert(
            id.clone(),
            MockGroup {
                limits: *limits,
                members: Vec::new(),
            },
        );

        tracing::debug!(group = %id, "Mock: Created group");

        Ok(())
    }

    async fn enroll(&self, id: &GroupId, pid: ProcessId) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::injected(&state, MockFailure::Enroll)?;

        let group = state
            .groups
            .get_mut(id)
            .ok_or_else(|| Error::resource_group(format!("Unknown group {id}")))?;

        if !group.members.contains(&pid) {
            group.members.push(pid);
        }
        state.writes += 1;

        tracing::debug!(group = %id, pid = pid.as_raw(), "Mock: Enrolled process");

        Ok(())
    }

    async fn destroy(&self, id: &GroupId) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::injected(&state, MockFailure::Destroy)?;

        if let Some(group) = state.groups.remove(id) {
            tracing::debug!(
                group = %id,
                processes_removed = group.members.len(),
                "Mock: Destroyed group"
            );
            state.destroyed.push(id.clone());
        }

        Ok(())
    }
}
