use burrow_core::{ErrorKind, HostBind};
use burrow_jail::*;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Check if running as root
fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

fn read_table(view: &mut fs::File) -> String {
    let mut table = String::new();
    view.read_to_string(&mut table).unwrap();
    table
}

/// Switch into `rootfs`, mount and unmount the pseudo filesystems, and panic
/// unless the mount table ends up where it started
fn pseudo_mount_round_trip(rootfs: &Path) {
    nix::sched::unshare(nix::sched::CloneFlags::CLONE_NEWNS).unwrap();
    nix::mount::mount(
        None::<&str>,
        "/",
        None::<&str>,
        nix::mount::MsFlags::MS_REC | nix::mount::MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .unwrap();

    // The new root has no /proc of its own, so every view is opened up front
    let mut views: Vec<fs::File> = (0..3)
        .map(|_| fs::File::open("/proc/self/mountinfo").unwrap())
        .collect();

    let mut jail = FilesystemJail::new(rootfs);
    jail.switch_root().unwrap();
    let before = read_table(&mut views[0]);

    jail.mount_pseudo().unwrap();
    let during = read_table(&mut views[1]);
    assert_eq!(jail.mounted(), PseudoFs::MOUNT_ORDER.to_vec());
    assert_eq!(during.lines().count(), before.lines().count() + 2);
    assert!(during.contains(" /proc "));
    assert!(during.contains(" /sys "));

    jail.unmount_pseudo().unwrap();
    let after = read_table(&mut views[2]);
    assert!(jail.mounted().is_empty());
    assert_eq!(after, before);
}

#[test]
fn test_missing_root_leaves_no_trace() {
    let mut jail = FilesystemJail::new("/nonexistent/burrow/rootfs")
        .with_host_bind(HostBind::new("/sys/fs/cgroup", "/host_info"));

    let err = jail.switch_root().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RootSwitchFailed);

    // Pseudo mounts are refused after a failed switch
    let err = jail.mount_pseudo().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PseudoMountFailed);
    assert!(jail.mounted().is_empty());
}

#[test]
fn test_mock_records_full_sequence() {
    let mut jail = MockJail::new();

    jail.set_hostname("container").unwrap();
    jail.switch_root().unwrap();
    jail.mount_pseudo().unwrap();
    jail.unmount_pseudo().unwrap();

    assert_eq!(jail.ops().first(), Some(&JailOp::SetHostname("container".to_string())));
    assert_eq!(jail.ops().len(), 6);
}

#[test]
#[ignore] // Requires root; runs in a throwaway child so the test runner keeps its root
fn test_pseudo_mount_round_trip_restores_mount_table() {
    if !is_root() {
        return;
    }

    let rootfs = tempfile::tempdir().unwrap();
    fs::create_dir(rootfs.path().join("proc")).unwrap();
    fs::create_dir(rootfs.path().join("sys")).unwrap();

    // SAFETY: the child only performs syscalls and exits
    match unsafe { nix::unistd::fork() }.unwrap() {
        nix::unistd::ForkResult::Child => {
            let root = rootfs.path();
            let outcome = std::panic::catch_unwind(|| pseudo_mount_round_trip(root));
            std::process::exit(if outcome.is_ok() { 0 } else { 1 });
        }
        nix::unistd::ForkResult::Parent { child } => {
            let status = nix::sys::wait::waitpid(child, None).unwrap();
            assert_eq!(status, nix::sys::wait::WaitStatus::Exited(child, 0));
        }
    }
}
