//! In-memory jail for exercising callers without privilege

use std::sync::{Arc, Mutex, MutexGuard};
use burrow_core::{Error, Result};

use crate::jail::Jail;
use crate::pseudo::PseudoFs;

/// One recorded jail operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JailOp {
    /// `set_hostname`
    SetHostname(String),
    /// `switch_root`
    SwitchRoot,
    /// A single pseudo mount
    Mount(PseudoFs),
    /// A single pseudo unmount
    Unmount(PseudoFs),
}

/// Mock jail recording every operation (doesn't touch the system)
///
/// Clones share state, so a test can keep one handle while a bootstrapper
/// owns the other.
#[derive(Debug, Clone, Default)]
pub struct MockJail {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    ops: Vec<JailOp>,
    mounted: Vec<PseudoFs>,
    switched: bool,
    fail_at: Option<JailOp>,
    fail_unmount: Vec<PseudoFs>,
}

impl MockJail {
    /// Create a jail where everything succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when `op` is attempted; the failed op is still recorded
    #[must_use]
    pub fn failing_at(self, op: JailOp) -> Self {
        self.lock().fail_at = Some(op);
        self
    }

    /// Fail to unmount `fs` during teardown
    #[must_use]
    pub fn failing_unmount(self, fs: PseudoFs) -> Self {
        self.lock().fail_unmount.push(fs);
        self
    }

    /// Every operation attempted so far
    #[must_use]
    pub fn ops(&self) -> Vec<JailOp> {
        self.lock().ops.clone()
    }

    /// Whether any mount was attempted
    #[must_use]
    pub fn attempted_mount(&self) -> bool {
        self.lock()
            .ops
            .iter()
            .any(|op| matches!(op, JailOp::Mount(_)))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(state: &mut MockState, op: JailOp) -> bool {
        let fail = state.fail_at.as_ref() == Some(&op);
        state.ops.push(op);
        fail
    }
}

impl Jail for MockJail {
    fn set_hostname(&mut self, hostname: &str) -> Result<()> {
        let mut state = self.lock();
        if Self::record(&mut state, JailOp::SetHostname(hostname.to_string())) {
            return Err(Error::HostnameSetFailed {
                message: "Mock: injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn switch_root(&mut self) -> Result<()> {
        let mut state = self.lock();
        if Self::record(&mut state, JailOp::SwitchRoot) {
            return Err(Error::RootSwitchFailed {
                message: "Mock: injected failure".to_string(),
            });
        }
        state.switched = true;
        Ok(())
    }

    fn mount_pseudo(&mut self) -> Result<()> {
        let mut state = self.lock();
        if !state.switched {
            return Err(Error::PseudoMountFailed {
                message: "root has not been switched".to_string(),
            });
        }

        for fs in PseudoFs::MOUNT_ORDER {
            if Self::record(&mut state, JailOp::Mount(fs)) {
                return Err(Error::PseudoMountFailed {
                    message: format!("Mock: injected failure on {fs}"),
                });
            }
            state.mounted.push(fs);
        }
        Ok(())
    }

    fn unmount_pseudo(&mut self) -> Result<()> {
        let mut state = self.lock();
        let mut failures = Vec::new();

        for fs in std::mem::take(&mut state.mounted).into_iter().rev() {
            state.ops.push(JailOp::Unmount(fs));
            if state.fail_unmount.contains(&fs) {
                failures.push(format!("{fs}: Mock: injected failure"));
                state.mounted.insert(0, fs);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::TeardownFailed { failures })
        }
    }

    fn mounted(&self) -> Vec<PseudoFs> {
        self.lock().mounted.clone()
    }
}
