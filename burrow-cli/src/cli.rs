//! CLI argument definitions

use burrow_core::config::DEFAULT_HOSTNAME;
use burrow_core::BackendKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "burrow")]
#[command(about = "Minimal process-isolation launcher", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command in an isolated environment
    Run(RunArgs),

    /// Bootstrap inside fresh namespaces (internal)
    #[command(hide = true)]
    Child(ChildArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Prepared root filesystem; must contain the /host_info mount point
    #[arg(long)]
    pub rootfs: PathBuf,

    /// Hostname inside the isolated environment
    #[arg(long, default_value = DEFAULT_HOSTNAME)]
    pub hostname: String,

    /// Memory ceiling in MB
    #[arg(long, default_value_t = 512, allow_negative_numbers = true)]
    pub memory_mb: i64,

    /// Relative CPU weight (1-10000, unified cgroup backend only)
    #[arg(long)]
    pub cpu_weight: Option<u64>,

    /// Host directory holding the cgroup hierarchy (default: probed)
    #[arg(long)]
    pub host_dir: Option<PathBuf>,

    /// Resource group backend
    #[arg(long, value_enum, default_value_t = BackendChoice::Auto)]
    pub cgroup_backend: BackendChoice,

    /// Kill the isolated process tree after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Command to run
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Args)]
pub struct ChildArgs {
    /// Launch configuration as JSON
    #[arg(long)]
    pub config: String,

    /// Command to run
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// Probe the host
    Auto,
    /// Per-controller hierarchies
    Legacy,
    /// Single unified hierarchy
    Unified,
}

impl BackendChoice {
    /// Concrete backend, probing the host for `Auto`
    pub fn resolve(self) -> BackendKind {
        match self {
            Self::Auto => burrow_cgroup::probe::detect_host(),
            Self::Legacy => BackendKind::Legacy,
            Self::Unified => BackendKind::Unified,
        }
    }
}
