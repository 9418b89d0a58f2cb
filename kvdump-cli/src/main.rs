//! kvdump - dump and restore etcd key ranges
//!
//! Keys processed by `dump` and `restore` are listed on stdout; logs go to
//! stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::*;
use config::CliConfig;

#[derive(Parser)]
#[command(name = "kvdump")]
#[command(about = "Dump and restore etcd key ranges")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "kvdump.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump K/V with prefix
    Dump(DumpArgs),
    /// Restore K/V from file
    Restore(RestoreArgs),
    /// Check a snapshot file and print its contents
    Verify(VerifyArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("kvdump={},kvdump_core={}", log_level, log_level))
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = CliConfig::load(&cli.config)?;

    let result = match cli.command {
        Commands::Dump(args) => execute_dump(args, &config).await,
        Commands::Restore(args) => execute_restore(args, &config).await,
        Commands::Verify(args) => execute_verify(args).await,
    };

    match result {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            Err(e)
        }
    }
}
