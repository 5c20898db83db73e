//! `brctl`, operator tool for the backup and restore orchestration of one tenant.
//!
//! Reads the same configuration as the services and talks to the shared coordination
//! store and database directly.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use config::Environment;
use telemetry::tracing::init_tracing;

use crate::configuration::load_backup_restore_config;
use crate::core::run_command;
use crate::error::{CliError, CliResult};

mod configuration;
mod core;
mod error;

#[derive(Debug, Parser)]
#[command(name = "brctl", version, about = "Inspect and control backup and restore operations")]
struct Args {
    /// Tenant to act on, overriding `tenant_id` from the configuration
    #[arg(long, global = true)]
    tenant: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum Command {
    /// Print whether an operation runs, whether a rollback is possible and whether restores are allowed
    Status,
    /// Ask the running operation to stop at its next checkpoint
    Cancel,
    /// Move the backup schema back into the public schema
    Rollback,
    /// Print the log lines of the latest operation
    Logs {
        /// Print one line per entry instead of JSON
        #[arg(long)]
        plain: bool,
    },
    /// Clear the running and shutdown flags left behind by a crashed process
    ClearStale,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let args = Args::parse();

    let mut config = load_backup_restore_config()?;
    if let Some(tenant) = args.tenant {
        config.tenant_id = tenant;
    }
    let environment = Environment::load().map_err(CliError::config)?;

    let _log_flusher =
        init_tracing(env!("CARGO_BIN_NAME"), Some(&config.tenant_id)).map_err(CliError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_command(config, environment, args.command))
}
