//! Burrow CLI
//!
//! `burrow run` launches a command inside fresh namespaces; the hidden
//! `burrow child` sub-mode is what the launcher re-executes.

use burrow_core::error::SETUP_FAILURE_EXIT;
use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

mod child;
mod cli;
mod run;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Child(args) => child::execute(args).await,
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(exit_code(&e));
        }
    }
}

/// Logs go to stderr; stdout belongs to the user command
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<burrow_core::Error>()
        .map_or(SETUP_FAILURE_EXIT, burrow_core::Error::exit_code)
}
