//! Two-phase launch: clone into fresh namespaces and re-execute
//!
//! The child never continues the parent's program. Right after `clone(2)` it
//! fixes mount propagation and replaces itself with `/proc/self/exe` running
//! the internal child sub-mode, so nothing but the argument vector and the
//! environment crosses the namespace boundary.

#![allow(unsafe_code)]

use nix::errno::Errno;
use nix::mount::{mount, MsFlags};
use nix::sched::clone;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{execve, geteuid, Pid};
use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use burrow_core::error::SETUP_FAILURE_EXIT;
use burrow_core::{Error, LaunchConfig, LaunchRequest, ProcessId, Result, HOST_DIR_ENV};

use crate::config::NamespaceSet;

/// The running binary, resolved by the kernel
pub const SELF_EXE: &str = "/proc/self/exe";

/// Sub-mode marker the re-executed binary dispatches on
pub const CHILD_MARKER: &str = "child";

/// `argv[0]` of the re-executed binary
pub const PROGRAM_NAME: &str = "burrow";

const STACK_SIZE: usize = 1024 * 1024;

/// What the cloned child executes
///
/// `argv` is `[PROGRAM_NAME, marker, args...]`; the environment is the
/// parent's with `env` entries overriding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    program: PathBuf,
    marker: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl ChildEntry {
    /// Re-execute the current binary in sub-mode `marker`
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from(SELF_EXE),
            marker: marker.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Entry that runs the bootstrapper for `request` under `config`
    ///
    /// # Errors
    /// Returns [`Error::Serialization`] if the configuration cannot be encoded
    pub fn bootstrap(config: &LaunchConfig, request: &LaunchRequest) -> Result<Self> {
        Ok(Self::new(CHILD_MARKER)
            .arg("--config")
            .arg(config.to_json()?)
            .arg("--")
            .args(request.argv())
            .env(
                HOST_DIR_ENV,
                config.host_bind.jail_path.to_string_lossy().into_owned(),
            ))
    }

    /// Execute a different binary
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child, replacing an earlier value
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.into()));
        self
    }

    /// Binary the child executes
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument vector, `argv[0]` included
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        [PROGRAM_NAME.to_string(), self.marker.clone()]
            .into_iter()
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Value this entry sets for `key`, if any
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Everything `execve(2)` needs, converted before cloning
    fn exec_image(&self) -> Result<ExecImage> {
        let path = cstring(self.program.as_os_str().as_bytes())?;

        let argv = self
            .argv()
            .iter()
            .map(|a| cstring(a.as_bytes()))
            .collect::<Result<Vec<_>>>()?;

        let inherited = std::env::vars_os().filter(|(k, _)| {
            !self
                .env
                .iter()
                .any(|(key, _)| OsStr::new(key) == k.as_os_str())
        });
        let mut envp = Vec::new();
        for (k, v) in inherited {
            envp.push(env_pair(k.as_bytes(), v.as_bytes())?);
        }
        for (k, v) in &self.env {
            envp.push(env_pair(k.as_bytes(), v.as_bytes())?);
        }

        Ok(ExecImage { path, argv, envp })
    }
}

struct ExecImage {
    path: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
}

fn cstring(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|e| Error::ChildLaunchFailed {
        message: format!("argument contains a NUL byte: {e}"),
    })
}

fn env_pair(key: &[u8], value: &[u8]) -> Result<CString> {
    let mut pair = Vec::with_capacity(key.len() + value.len() + 1);
    pair.extend_from_slice(key);
    pair.push(b'=');
    pair.extend_from_slice(value);
    cstring(&pair)
}

/// Spawns one child into a fresh namespace set and waits for it
#[derive(Debug, Clone, Default)]
pub struct Launcher {
    namespaces: NamespaceSet,
    deadline: Option<Duration>,
}

impl Launcher {
    /// Create a launcher for `namespaces`
    #[must_use]
    pub const fn new(namespaces: NamespaceSet) -> Self {
        Self {
            namespaces,
            deadline: None,
        }
    }

    /// Kill the child if it outlives `deadline`
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Namespaces the child will join
    #[must_use]
    pub const fn namespaces(&self) -> &NamespaceSet {
        &self.namespaces
    }

    /// Fail unless the effective user is root
    ///
    /// # Errors
    /// Returns [`Error::PermissionDenied`] for any other user
    pub fn check_privilege() -> Result<()> {
        let euid = geteuid();
        if euid.is_root() {
            Ok(())
        } else {
            Err(Error::PermissionDenied {
                operation: format!("creating namespaces requires root (euid {euid})"),
            })
        }
    }

    /// Spawn `entry`, block until it exits, and return its exit status
    ///
    /// A child killed by signal `n` yields `128 + n`.
    ///
    /// # Errors
    /// Returns [`Error::PermissionDenied`] before anything else is attempted,
    /// [`Error::ChildLaunchFailed`] if clone or wait fail, or
    /// [`Error::DeadlineExceeded`] after killing a child that ran too long
    pub async fn launch(&self, entry: &ChildEntry) -> Result<i32> {
        Self::check_privilege()?;

        let pid = self.spawn(entry)?;
        self.wait(pid).await
    }

    /// Clone a child into the namespace set and re-execute `entry` there
    ///
    /// # Errors
    /// Returns [`Error::ChildLaunchFailed`] if the arguments cannot be passed
    /// to `execve(2)` or `clone(2)` fails
    pub fn spawn(&self, entry: &ChildEntry) -> Result<ProcessId> {
        let image = entry.exec_image()?;
        let private = self.namespaces.needs_private_remount();
        let flags = self.namespaces.to_clone_flags();

        info!(
            namespaces = ?self.namespaces.enabled_namespaces(),
            program = %entry.program().display(),
            "Spawning isolated child"
        );

        let mut stack = vec![0u8; STACK_SIZE];
        let callback = Box::new(move || child_main(&image, private));

        // SAFETY: without CLONE_VM the child runs on a copy of this address
        // space, and child_main only issues mount(2) and execve(2) on data
        // prepared before the clone.
        let pid = unsafe { clone(callback, &mut stack, flags, Some(libc::SIGCHLD)) }.map_err(
            |e| Error::ChildLaunchFailed {
                message: format!("clone failed: {e}"),
            },
        )?;

        debug!(pid = pid.as_raw(), "Child spawned");
        Ok(ProcessId::from(pid))
    }

    /// Wait for `pid`, racing the deadline if one is set
    ///
    /// # Errors
    /// Returns [`Error::ChildLaunchFailed`] if waiting fails or
    /// [`Error::DeadlineExceeded`] once the child has been killed
    pub async fn wait(&self, pid: ProcessId) -> Result<i32> {
        let pid = pid.as_nix_pid();
        let mut waiter = tokio::task::spawn_blocking(move || wait_for_exit(pid));

        let Some(after) = self.deadline else {
            return waiter.await?;
        };

        tokio::select! {
            joined = &mut waiter => joined?,
            () = tokio::time::sleep(after) => {
                warn!(pid = pid.as_raw(), ?after, "Deadline exceeded, killing child");

                // PID 1 of its namespace; the kernel takes the whole tree down
                if let Err(e) = kill(pid, Signal::SIGKILL) {
                    warn!(pid = pid.as_raw(), error = %e, "Could not kill child");
                }

                match waiter.await {
                    Ok(Ok(code)) => debug!(code, "Killed child reaped"),
                    Ok(Err(e)) => warn!(error = %e, "Could not reap killed child"),
                    Err(e) => warn!(error = %e, "Wait task failed"),
                }

                Err(Error::DeadlineExceeded { after })
            }
        }
    }
}

/// Runs in the cloned child; only returns if `execve(2)` did not happen
fn child_main(image: &ExecImage, private: bool) -> isize {
    if private
        && mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_REC | MsFlags::MS_PRIVATE,
            None::<&str>,
        )
        .is_err()
    {
        return SETUP_FAILURE_EXIT as isize;
    }

    // Only returns on failure
    let _ = execve(&image.path, &image.argv, &image.envp);
    SETUP_FAILURE_EXIT as isize
}

fn wait_for_exit(pid: Pid) -> Result<i32> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                info!(pid = pid.as_raw(), code, "Child exited");
                return Ok(code);
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                warn!(pid = pid.as_raw(), ?signal, "Child terminated by signal");
                return Ok(128 + signal as i32);
            }
            Ok(status) => debug!(?status, "Child status changed"),
            Err(Errno::EINTR) => {}
            Err(e) => {
                return Err(Error::ChildLaunchFailed {
                    message: format!("wait for {pid} failed: {e}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_entry_layout() {
        let config = LaunchConfig::new("/srv/rootfs");
        let request =
            LaunchRequest::new("echo", vec!["hi".to_string()], "/srv/rootfs").unwrap();

        let entry = ChildEntry::bootstrap(&config, &request).unwrap();
        let argv = entry.argv();

        assert_eq!(entry.program(), Path::new(SELF_EXE));
        assert_eq!(&argv[..3], &["burrow", "child", "--config"]);
        assert_eq!(LaunchConfig::from_json(&argv[3]).unwrap(), config);
        assert_eq!(&argv[4..], &["--", "echo", "hi"]);
        assert_eq!(entry.env_value(HOST_DIR_ENV), Some("/host_info"));
    }

    #[test]
    fn test_env_value_is_set_once() {
        let entry = ChildEntry::new("child")
            .env("BURROW_TEST_KEY", "a")
            .env("BURROW_TEST_KEY", "b");
        let image = entry.exec_image().unwrap();

        let pairs: Vec<_> = image
            .envp
            .iter()
            .filter(|p| p.to_bytes().starts_with(b"BURROW_TEST_KEY="))
            .collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].to_bytes(), b"BURROW_TEST_KEY=b");
        assert_eq!(entry.env_value("BURROW_TEST_KEY"), Some("b"));
    }

    #[test]
    fn test_parent_environment_is_inherited() {
        let image = ChildEntry::new("child").exec_image().unwrap();
        let inherited = std::env::vars_os().count();
        assert_eq!(image.envp.len(), inherited);
    }

    #[test]
    fn test_nul_in_argument_is_rejected() {
        let entry = ChildEntry::new("child").arg("bad\0arg");
        assert!(matches!(
            entry.exec_image(),
            Err(Error::ChildLaunchFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_non_root_is_denied_before_spawning() {
        if geteuid().is_root() {
            return;
        }

        let entry = ChildEntry::new("child").with_program("/nonexistent");
        let err = Launcher::default().launch(&entry).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }
}
