//! Filesystem helpers shared by the cgroup backends

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use burrow_core::{Error, GroupId, ProcessId, Result};

/// Membership file present in every group of both hierarchies
pub const PROCS_FILE: &str = "cgroup.procs";

/// Directory of `id` under `root`
pub fn group_dir(root: &Path, id: &GroupId) -> PathBuf {
    root.join(id.as_str())
}

/// Fail unless `root` is an existing directory
pub async fn ensure_root(root: &Path) -> Result<()> {
    match fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::resource_group(format!(
            "Hierarchy root is not a directory: {}",
            root.display()
        ))),
        Err(e) => Err(Error::resource_group(format!(
            "Hierarchy unavailable at {}: {e}",
            root.display()
        ))),
    }
}

/// Create the directory for a new group, refusing to reuse an existing one
pub async fn create_group_dir(root: &Path, id: &GroupId) -> Result<PathBuf> {
    let dir = group_dir(root, id);

    debug!(path = %dir.display(), "Creating group directory");

    fs::create_dir(&dir).await.map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            Error::resource_group(format!("Group {id} already exists"))
        } else {
            Error::resource_group(format!(
                "Failed to create group directory {}: {e}",
                dir.display()
            ))
        }
    })?;

    Ok(dir)
}

/// Write one attribute file
pub async fn write_attribute(dir: &Path, name: &str, value: &str) -> Result<()> {
    let path = dir.join(name);

    debug!(file = %path.display(), value, "Writing group attribute");

    fs::write(&path, value).await.map_err(|e| {
        Error::resource_group(format!("Failed to write {}: {e}", path.display()))
    })
}

/// Create a group and write `attributes` in order
///
/// If any write fails the directory is removed again, so a rejected
/// attribute never leaves a group behind in the hierarchy.
pub async fn create_configured(
    root: &Path,
    id: &GroupId,
    attributes: &[(&str, String)],
) -> Result<PathBuf> {
    let dir = create_group_dir(root, id).await?;

    for (name, value) in attributes {
        if let Err(e) = write_attribute(&dir, name, value).await {
            discard(root, id).await;
            return Err(e);
        }
    }

    Ok(dir)
}

/// Remove a half-built group, logging instead of failing
pub async fn discard(root: &Path, id: &GroupId) {
    if let Err(cleanup) = remove_group(root, id).await {
        warn!(group = %id, error = %cleanup, "Could not remove half-built group");
    }
}

/// Record `pid` as a member of the group at `dir`
pub async fn enroll(dir: &Path, pid: ProcessId) -> Result<()> {
    if !fs::try_exists(dir).await.unwrap_or(false) {
        return Err(Error::resource_group(format!(
            "Group directory missing: {}",
            dir.display()
        )));
    }
    write_attribute(dir, PROCS_FILE, &pid.as_raw().to_string()).await
}

/// Move members back to the parent, then remove the group directory
///
/// A kernel group directory only disappears through `rmdir(2)` once empty.
/// A plain directory standing in for a hierarchy still holds the attribute
/// files we wrote, so it is removed recursively instead.
pub async fn remove_group(root: &Path, id: &GroupId) -> Result<()> {
    let dir = group_dir(root, id);

    if !fs::try_exists(&dir).await.unwrap_or(false) {
        debug!(path = %dir.display(), "Group already gone");
        return Ok(());
    }

    evacuate(root, &dir).await;

    match fs::remove_dir(&dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => {
            fs::remove_dir_all(&dir).await.map_err(|e| {
                Error::resource_group(format!("Failed to remove {}: {e}", dir.display()))
            })?;
        }
        Err(e) => {
            return Err(Error::resource_group(format!(
                "Failed to remove {}: {e}",
                dir.display()
            )));
        }
    }

    debug!(path = %dir.display(), "Group removed");
    Ok(())
}

async fn evacuate(root: &Path, dir: &Path) {
    let parent_procs = root.join(PROCS_FILE);
    if !fs::try_exists(&parent_procs).await.unwrap_or(false) {
        return;
    }

    let Ok(members) = fs::read_to_string(dir.join(PROCS_FILE)).await else {
        return;
    };

    for pid in members.split_whitespace() {
        if let Err(e) = fs::write(&parent_procs, pid).await {
            // The process may have exited in the meantime
            warn!(pid, error = %e, "Could not move process to parent group");
        }
    }
}
