use burrow_core::*;
use std::collections::HashSet;
use std::time::Duration;

#[test]
fn test_group_id_validation() {
    // Valid IDs
    assert!(GroupId::new("test").is_ok());
    assert!(GroupId::new("burrow-123-456-0").is_ok());
    assert!(GroupId::new("ABC-123_xyz").is_ok());

    // Invalid IDs - empty
    assert!(GroupId::new("").is_err());

    // Invalid IDs - too long
    assert!(GroupId::new("a".repeat(65)).is_err());

    // Invalid IDs - bad characters
    assert!(GroupId::new("test@123").is_err());
    assert!(GroupId::new("test/path").is_err());
    assert!(GroupId::new("../escape").is_err());
    assert!(GroupId::new("test.dot").is_err());
}

#[test]
fn test_group_ids_unique_within_one_tick() {
    let ids: Vec<GroupId> = (0..1000).map(|_| GroupId::generate()).collect();
    let unique: HashSet<&GroupId> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());

    // The trailing sequence is strictly increasing even if the clock is not
    let sequences: Vec<u64> = ids.iter().filter_map(GroupId::sequence).collect();
    assert_eq!(sequences.len(), ids.len());
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_group_ids_unique_across_threads() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| (0..100).map(|_| GroupId::generate()).collect::<Vec<_>>()))
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id));
        }
    }
}

#[test]
fn test_launch_config_round_trip() {
    let config = LaunchConfig::new("/srv/rootfs")
        .with_hostname("sandbox")
        .with_backend(BackendKind::Legacy)
        .with_limits(ResourceLimits::unlimited().with_memory_mb(64).with_cpu_weight(50))
        .with_timeout(Duration::from_secs(5));

    let json = config.to_json().unwrap();
    let decoded = LaunchConfig::from_json(&json).unwrap();

    assert_eq!(decoded, config);
    assert!(json.contains("\"legacy\""));
}

#[test]
fn test_launch_config_rejects_garbage() {
    let err = LaunchConfig::from_json("{not json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.exit_code(), error::SETUP_FAILURE_EXIT);
}

#[test]
fn test_limits_validation_boundary() {
    assert!(ResourceLimits::default().validate().is_ok());
    assert!(ResourceLimits::unlimited().validate().is_ok());
    assert!(ResourceLimits::unlimited().with_memory_bytes(1).validate().is_ok());

    let zero = ResourceLimits::unlimited().with_memory_bytes(0).validate();
    assert_eq!(zero.unwrap_err().kind(), ErrorKind::ResourceGroupFailed);

    let negative = ResourceLimits::unlimited().with_memory_mb(-5).validate();
    assert_eq!(negative.unwrap_err().kind(), ErrorKind::ResourceGroupFailed);

    let weight = ResourceLimits::unlimited().with_cpu_weight(0).validate();
    assert_eq!(weight.unwrap_err().kind(), ErrorKind::ResourceGroupFailed);
}

#[test]
fn test_memory_size_conversions() {
    let size = MemorySize::from_mb(512);

    assert_eq!(size.as_bytes(), 536_870_912);
    assert_eq!(size.as_mb(), 512.0);
    assert_eq!(size.as_gb(), 0.5);
}
