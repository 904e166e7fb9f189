//! Launcher side of `burrow run`

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, info};
use burrow_core::{LaunchConfig, LaunchRequest, ResourceLimits};
use burrow_namespace::{ChildEntry, Launcher, NamespaceSet};

use crate::cli::RunArgs;

pub async fn execute(args: RunArgs) -> Result<i32> {
    info!("Starting burrow launcher");

    // Nothing is probed or spawned for an unprivileged caller
    Launcher::check_privilege()?;

    let request = LaunchRequest::from_argv(&args.command, &args.rootfs)?;
    let config = build_config(&args)?;

    info!(
        rootfs = %config.rootfs.display(),
        hostname = %config.hostname,
        backend = %config.backend,
        host_dir = %config.host_bind.source.display(),
        "Launch configured"
    );
    debug!(command = ?request.argv(), limits = ?config.limits, "Launch request");

    let entry = ChildEntry::bootstrap(&config, &request)?;
    let code = Launcher::new(NamespaceSet::new())
        .with_deadline(config.timeout)
        .launch(&entry)
        .await?;

    info!(code, "Isolated process exited");
    Ok(code)
}

fn build_config(args: &RunArgs) -> Result<LaunchConfig> {
    let mut limits = ResourceLimits::unlimited().with_memory_mb(args.memory_mb);
    if let Some(weight) = args.cpu_weight {
        limits = limits.with_cpu_weight(weight);
    }
    limits.validate().context("Invalid resource limits")?;

    let mut config = LaunchConfig::new(&args.rootfs)
        .with_hostname(&args.hostname)
        .with_backend(args.cgroup_backend.resolve())
        .with_limits(limits);

    if let Some(dir) = &args.host_dir {
        config = config.with_host_dir(dir);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    config.validate()?;
    Ok(config)
}
