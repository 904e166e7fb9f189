//! Ordered bootstrap of the isolated child

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use burrow_cgroup::{ResourceBackend, ResourceGroup};
use burrow_core::error::{COMMAND_NOT_EXECUTABLE_EXIT, COMMAND_NOT_FOUND_EXIT};
use burrow_core::{
    Error, GroupId, LaunchConfig, LaunchRequest, ProcessId, Result, HOST_DIR_ENV,
};
use burrow_jail::Jail;

use crate::state::BootstrapState;

/// Result of a bootstrap whose user command exited zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOutcome {
    /// Exit status of the user command
    pub exit_code: i32,
    /// Resource group the command ran in
    pub group: GroupId,
    /// Teardown failures, logged and otherwise ignored
    pub teardown_failures: Vec<String>,
}

/// Drives the jail and the resource limiter in a fixed order
///
/// One bootstrapper serves exactly one launch and owns its jail.
pub struct Bootstrapper<J: Jail> {
    config: LaunchConfig,
    jail: J,
    host_dir: Option<PathBuf>,
    state: BootstrapState,
    history: Vec<BootstrapState>,
}

impl<J: Jail> Bootstrapper<J> {
    /// Create a bootstrapper; the host directory is read from `BURROW_HOST_DIR`
    pub fn new(config: LaunchConfig, jail: J) -> Self {
        let host_dir = std::env::var_os(HOST_DIR_ENV).map(PathBuf::from);
        Self::with_host_dir(config, jail, host_dir)
    }

    /// Create a bootstrapper with an explicit host directory
    pub fn with_host_dir(config: LaunchConfig, jail: J, host_dir: Option<PathBuf>) -> Self {
        Self {
            config,
            jail,
            host_dir,
            state: BootstrapState::Init,
            history: vec![BootstrapState::Init],
        }
    }

    /// Current state
    pub const fn state(&self) -> BootstrapState {
        self.state
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[BootstrapState] {
        &self.history
    }

    /// The jail being driven
    pub const fn jail(&self) -> &J {
        &self.jail
    }

    /// Run every step, then the user command, then teardown
    ///
    /// `open_backend` receives the in-jail host directory once the root has
    /// been switched and returns the backend to create the group with.
    ///
    /// # Errors
    /// Returns the first setup failure, or [`Error::ChildCommandFailed`]
    /// carrying the status the process should exit with
    pub async fn run<B, F>(
        &mut self,
        request: &LaunchRequest,
        open_backend: F,
    ) -> Result<BootstrapOutcome>
    where
        B: ResourceBackend,
        F: FnOnce(&Path) -> B,
    {
        let host_dir = match self.host_dir.clone() {
            Some(dir) => dir,
            None => {
                return Err(self.fail(Error::invalid_config(format!(
                    "{HOST_DIR_ENV} is not set"
                ))));
            }
        };

        let hostname = self.config.hostname.clone();
        if let Err(e) = self.jail.set_hostname(&hostname) {
            return Err(self.fail(e));
        }
        self.advance(BootstrapState::HostnameSet);

        if let Err(e) = self.jail.switch_root() {
            return Err(self.fail(e));
        }
        self.advance(BootstrapState::RootSwitched);

        // Mounts that already succeeded go away with the mount namespace
        if let Err(e) = self.jail.mount_pseudo() {
            return Err(self.fail(e));
        }
        self.advance(BootstrapState::Mounted);

        let backend = open_backend(&host_dir);
        let group =
            match ResourceGroup::create(&backend, &self.config.limits, ProcessId::current()).await
            {
                Ok(group) => group,
                Err(e) => return Err(self.fail(e)),
            };
        self.advance(BootstrapState::ResourceLimited);

        self.advance(BootstrapState::Running);
        let status = run_command(request).await;

        let teardown_failures = match self.jail.unmount_pseudo() {
            Ok(()) => {
                self.advance(BootstrapState::Unmounted);
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Teardown incomplete");
                self.advance(BootstrapState::Exited);
                match e {
                    Error::TeardownFailed { failures } => failures,
                    other => vec![other.to_string()],
                }
            }
        };

        let group_id = group.id().clone();
        if let Err(e) = group.destroy().await {
            warn!(group = %group_id, error = %e, "Could not destroy resource group");
        }

        match status {
            Ok(exit_code) => Ok(BootstrapOutcome {
                exit_code,
                group: group_id,
                teardown_failures,
            }),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn advance(&mut self, next: BootstrapState) {
        debug_assert!(self.state.can_transition_to(next), "{} -> {next}", self.state);
        debug!(from = %self.state, to = %next, "Bootstrap step");
        self.state = next;
        self.history.push(next);
    }

    fn fail(&mut self, err: Error) -> Error {
        match &err {
            Error::ChildCommandFailed { code, message } => {
                info!(code, %message, "Command failed");
            }
            other => error!(state = %self.state, error = %other, "Bootstrap failed"),
        }
        self.advance(BootstrapState::Failed(err.kind()));
        err
    }
}

impl<J: Jail + std::fmt::Debug> std::fmt::Debug for Bootstrapper<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("jail", &self.jail)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Run the user command with inherited streams and map its status
async fn run_command(request: &LaunchRequest) -> Result<i32> {
    info!(command = request.command(), args = ?request.args(), "Running command");

    let status = Command::new(request.command())
        .args(request.args())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| spawn_failure(request.command(), &e))?;

    exit_code(status).map_err(|code| Error::ChildCommandFailed {
        code,
        message: format!("{} exited with {status}", request.command()),
    })
}

fn spawn_failure(command: &str, err: &io::Error) -> Error {
    let code = match err.kind() {
        io::ErrorKind::NotFound => COMMAND_NOT_FOUND_EXIT,
        _ => COMMAND_NOT_EXECUTABLE_EXIT,
    };
    Error::ChildCommandFailed {
        code,
        message: format!("{command}: {err}"),
    }
}

/// `Ok(0)` on success, otherwise the status the process should exit with
fn exit_code(status: ExitStatus) -> std::result::Result<i32, i32> {
    match (status.code(), status.signal()) {
        (Some(0), _) => Ok(0),
        (Some(code), _) => Err(code),
        (None, Some(signal)) => Err(128 + signal),
        (None, None) => Err(COMMAND_NOT_EXECUTABLE_EXIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_maps_above_128() {
        // SIGKILL in the low seven bits of a raw wait status
        assert_eq!(exit_code(ExitStatus::from_raw(9)), Err(137));
        assert_eq!(exit_code(ExitStatus::from_raw(0)), Ok(0));
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), Err(3));
    }

    #[test]
    fn missing_binary_is_127() {
        let err = spawn_failure("nope", &io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.exit_code(), COMMAND_NOT_FOUND_EXIT);

        let err = spawn_failure("nope", &io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.exit_code(), COMMAND_NOT_EXECUTABLE_EXIT);
    }
}
