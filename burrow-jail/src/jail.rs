//! Root switch and pseudo-filesystem lifecycle

use nix::mount::{mount, umount, MsFlags};
use nix::unistd::{chdir, chroot, sethostname};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use burrow_core::{Error, HostBind, Result};

use crate::pseudo::PseudoFs;

/// Operations that confine the calling process
///
/// Callers drive these in order: hostname, root switch, pseudo mounts, and
/// finally teardown. Implementations must refuse to mount before the root
/// has been switched.
pub trait Jail: Send {
    /// Set the hostname of the current UTS namespace
    ///
    /// # Errors
    /// Returns [`Error::HostnameSetFailed`]
    fn set_hostname(&mut self, hostname: &str) -> Result<()>;

    /// Make the new root `/` and move the working directory there
    ///
    /// # Errors
    /// Returns [`Error::RootSwitchFailed`]
    fn switch_root(&mut self) -> Result<()>;

    /// Mount every [`PseudoFs`] in [`PseudoFs::MOUNT_ORDER`]
    ///
    /// Mounts that succeeded before a failure stay mounted.
    ///
    /// # Errors
    /// Returns [`Error::PseudoMountFailed`]
    fn mount_pseudo(&mut self) -> Result<()>;

    /// Unmount in reverse order, attempting every mount
    ///
    /// # Errors
    /// Returns one [`Error::TeardownFailed`] listing every failure
    fn unmount_pseudo(&mut self) -> Result<()>;

    /// Pseudo-filesystems currently mounted, in mount order
    fn mounted(&self) -> Vec<PseudoFs>;
}

/// Jail backed by `chroot(2)` and `mount(2)`
#[derive(Debug)]
pub struct FilesystemJail {
    new_root: PathBuf,
    host_bind: Option<HostBind>,
    mounted: Vec<PseudoFs>,
    switched: bool,
}

impl FilesystemJail {
    /// Create a jail rooted at `new_root`
    pub fn new(new_root: impl Into<PathBuf>) -> Self {
        Self {
            new_root: new_root.into(),
            host_bind: None,
            mounted: Vec::new(),
            switched: false,
        }
    }

    /// Bind-mount a host directory into the new root before switching
    #[must_use]
    pub fn with_host_bind(mut self, bind: HostBind) -> Self {
        self.host_bind = Some(bind);
        self
    }

    /// Root this jail switches into
    #[must_use]
    pub fn new_root(&self) -> &Path {
        &self.new_root
    }

    /// Whether the root switch has happened
    #[must_use]
    pub const fn is_switched(&self) -> bool {
        self.switched
    }

    fn check_root(&self) -> Result<()> {
        match std::fs::metadata(&self.new_root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(root_switch_failed(format!(
                "{} is not a directory",
                self.new_root.display()
            ))),
            Err(e) => Err(root_switch_failed(format!(
                "{}: {e}",
                self.new_root.display()
            ))),
        }
    }

    fn bind_host_dir(&self, bind: &HostBind) -> Result<()> {
        let target = bind.target_under(&self.new_root);

        // The root filesystem is never modified; the mount point ships with it
        match std::fs::metadata(&target) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(root_switch_failed(format!(
                    "mount point {} is not a directory",
                    target.display()
                )));
            }
            Err(e) => {
                return Err(root_switch_failed(format!(
                    "mount point {} missing in root filesystem: {e}",
                    target.display()
                )));
            }
        }

        mount(
            Some(bind.source.as_path()),
            target.as_path(),
            None::<&str>,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(|e| {
            root_switch_failed(format!(
                "bind {} -> {}: {e}",
                bind.source.display(),
                target.display()
            ))
        })?;

        info!(
            source = %bind.source.display(),
            mount_point = %target.display(),
            "Host directory bound into new root"
        );
        Ok(())
    }
}

impl Jail for FilesystemJail {
    fn set_hostname(&mut self, hostname: &str) -> Result<()> {
        debug!(hostname, "Setting hostname");

        sethostname(hostname).map_err(|e| Error::HostnameSetFailed {
            message: format!("{hostname}: {e}"),
        })
    }

    fn switch_root(&mut self) -> Result<()> {
        if self.switched {
            return Err(root_switch_failed("root already switched".to_string()));
        }

        self.check_root()?;

        if let Some(bind) = &self.host_bind {
            self.bind_host_dir(bind)?;
        }

        chroot(self.new_root.as_path())
            .map_err(|e| root_switch_failed(format!("chroot {}: {e}", self.new_root.display())))?;
        chdir("/").map_err(|e| root_switch_failed(format!("chdir /: {e}")))?;

        self.switched = true;
        info!(new_root = %self.new_root.display(), "Root switched");
        Ok(())
    }

    fn mount_pseudo(&mut self) -> Result<()> {
        if !self.switched {
            return Err(Error::PseudoMountFailed {
                message: "root has not been switched".to_string(),
            });
        }

        for fs in PseudoFs::MOUNT_ORDER {
            if self.mounted.contains(&fs) {
                continue;
            }

            mount(
                Some(fs.source()),
                fs.target(),
                Some(fs.fstype()),
                fs.flags(),
                None::<&str>,
            )
            .map_err(|e| Error::PseudoMountFailed {
                message: format!("{fs}: {e}"),
            })?;

            debug!(mount_point = fs.target(), fstype = fs.fstype(), "Mounted");
            self.mounted.push(fs);
        }

        Ok(())
    }

    fn unmount_pseudo(&mut self) -> Result<()> {
        let mut failures = Vec::new();

        for fs in std::mem::take(&mut self.mounted).into_iter().rev() {
            match umount(fs.target()) {
                Ok(()) => debug!(mount_point = fs.target(), "Unmounted"),
                Err(e) => {
                    warn!(mount_point = fs.target(), error = %e, "Unmount failed");
                    failures.push(format!("{fs}: {e}"));
                    self.mounted.insert(0, fs);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::TeardownFailed { failures })
        }
    }

    fn mounted(&self) -> Vec<PseudoFs> {
        self.mounted.clone()
    }
}

fn root_switch_failed(message: String) -> Error {
    Error::RootSwitchFailed { message }
}
