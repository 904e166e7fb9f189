use burrow_cgroup::*;
use burrow_core::{ErrorKind, ProcessId};
use std::fs;
use std::path::Path;

/// Check if running as root
fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[tokio::test]
async fn test_legacy_group_lifecycle_on_plain_hierarchy() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let backend = LegacyBackend::new(root.path());

    let group = ResourceGroup::create(&backend, &ResourceLimits::default(), ProcessId::current())
        .await
        .unwrap();
    let dir = backend.group_path(group.id());

    assert_eq!(
        fs::read_to_string(dir.join(legacy::MEMORY_LIMIT_FILE)).unwrap(),
        ResourceLimits::DEFAULT_MEMORY.as_bytes().to_string()
    );
    assert_eq!(
        fs::read_to_string(dir.join(hierarchy::PROCS_FILE)).unwrap(),
        ProcessId::current().to_string()
    );

    group.destroy().await.unwrap();
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_concurrent_groups_never_collide() {
    let root = tempfile::tempdir().unwrap();
    let backend = LegacyBackend::new(root.path());
    let limits = ResourceLimits::default();

    let mut groups = Vec::new();
    for _ in 0..32 {
        groups.push(
            ResourceGroup::create(&backend, &limits, ProcessId::current())
                .await
                .unwrap(),
        );
    }

    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 32);

    for group in groups {
        group.destroy().await.unwrap();
    }
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_invalid_memory_rejected_by_every_backend() {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join(unified::CONTROLLERS_FILE), "memory cpu").unwrap();

    let backends: Vec<Box<dyn ResourceBackend>> = vec![
        Box::new(LegacyBackend::new(root.path())),
        Box::new(UnifiedBackend::new(root.path())),
        Box::new(MockBackend::new()),
    ];

    for backend in &backends {
        for bytes in [0, -4096] {
            let limits = ResourceLimits::unlimited().with_memory_bytes(bytes);
            let err = ResourceGroup::create(backend, &limits, ProcessId::current())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ResourceGroupFailed);
        }
    }

    // Only the controllers file we wrote is present
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_probe_selects_backend() {
    let root = tempfile::tempdir().unwrap();
    assert_eq!(probe::detect(root.path()), BackendKind::Legacy);

    fs::write(root.path().join(unified::CONTROLLERS_FILE), "memory").unwrap();
    let kind = probe::detect(root.path());
    assert_eq!(kind, BackendKind::Unified);
    assert_eq!(probe::open(kind, root.path()).kind(), BackendKind::Unified);
}

#[tokio::test]
#[ignore] // Requires root and a unified hierarchy
async fn test_real_unified_group() {
    if !is_root() || probe::detect(Path::new("/sys/fs/cgroup")) != BackendKind::Unified {
        return;
    }

    let backend = UnifiedBackend::new("/sys/fs/cgroup");
    let limits = ResourceLimits::unlimited().with_memory_mb(64);

    // Enroll a short-lived child rather than the test runner itself
    let mut child = std::process::Command::new("sleep").arg("5").spawn().unwrap();
    #[allow(clippy::cast_possible_wrap)]
    let pid = ProcessId::from_raw(child.id() as i32);

    let group = ResourceGroup::create(&backend, &limits, pid).await.unwrap();
    let members = fs::read_to_string(backend.group_path(group.id()).join("cgroup.procs")).unwrap();
    assert!(members.contains(&pid.to_string()));

    child.kill().unwrap();
    child.wait().unwrap();
    group.destroy().await.unwrap();
}
