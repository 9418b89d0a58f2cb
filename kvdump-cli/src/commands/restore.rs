use anyhow::{Context, Result};
use clap::Args;
use kvdump_core::{restore, EtcdConnector, RestoreOptions};
use std::path::PathBuf;
use tracing::info;

use crate::config::CliConfig;

#[derive(Args)]
pub struct RestoreArgs {
    /// etcd address
    #[arg(short, long)]
    pub address: Option<String>,

    /// Restore from FILE
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// etcd user as username:password
    #[arg(short, long)]
    pub user: Option<String>,

    /// Don't list keys as they are restored
    #[arg(short, long)]
    pub silent: bool,
}

pub async fn execute_restore(args: RestoreArgs, config: &CliConfig) -> Result<()> {
    if args.file.as_os_str().is_empty() {
        anyhow::bail!("file shouldn't be empty");
    }
    let connection = config.connection(args.address.as_deref(), args.user.as_deref())?;
    let options = RestoreOptions::new(&args.file).with_verbose(!args.silent);

    let mut stdout = std::io::stdout();
    let report = restore(&EtcdConnector::new(), &connection, &options, &mut stdout)
        .await
        .with_context(|| {
            format!(
                "Failed to restore {} to {}",
                args.file.display(),
                connection.address
            )
        })?;

    info!(
        "Restored {} keys (snapshot revision {})",
        report.records, report.source_revision
    );
    Ok(())
}
