//! Child side of the launch, running inside the fresh namespaces

use anyhow::{Context, Result};
use tracing::debug;
use burrow_cgroup::probe;
use burrow_core::{Error, LaunchConfig, LaunchRequest};
use burrow_jail::FilesystemJail;
use burrow_runtime::Bootstrapper;

use crate::cli::ChildArgs;

pub async fn execute(args: ChildArgs) -> Result<i32> {
    let config =
        LaunchConfig::from_json(&args.config).context("Malformed launch configuration")?;
    let request = LaunchRequest::from_argv(&args.command, &config.rootfs)?;

    debug!(pid = std::process::id(), "Child bootstrap starting");

    let jail = FilesystemJail::new(&config.rootfs).with_host_bind(config.host_bind.clone());
    let backend = config.backend;
    let mut bootstrapper = Bootstrapper::new(config, jail);

    match bootstrapper
        .run(&request, |root| probe::open(backend, root))
        .await
    {
        Ok(outcome) => Ok(outcome.exit_code),
        // Already logged by the bootstrapper
        Err(Error::ChildCommandFailed { code, .. }) => Ok(code),
        Err(e) => Err(e.into()),
    }
}
