use anyhow::{Context, Result};
use clap::Args;
use kvdump_core::{dump, DumpOptions, EtcdConnector};
use std::path::PathBuf;
use tracing::info;

use crate::config::CliConfig;

#[derive(Args)]
pub struct DumpArgs {
    /// etcd address
    #[arg(short, long)]
    pub address: Option<String>,

    /// etcd user as username:password
    #[arg(short, long)]
    pub user: Option<String>,

    /// Key prefix
    #[arg(short, long, default_value = "/")]
    pub prefix: String,

    /// Output to FILE
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Don't list keys as they are dumped
    #[arg(short, long)]
    pub silent: bool,
}

pub async fn execute_dump(args: DumpArgs, config: &CliConfig) -> Result<()> {
    if args.prefix.is_empty() {
        anyhow::bail!("prefix shouldn't be empty");
    }
    let connection = config.connection(args.address.as_deref(), args.user.as_deref())?;

    let mut options = DumpOptions::new(args.prefix).with_verbose(!args.silent);
    if let Some(output) = args.output {
        options = options.with_output(output);
    }

    let mut stdout = std::io::stdout();
    let (_, report) = dump(&EtcdConnector::new(), &connection, &options, &mut stdout)
        .await
        .with_context(|| format!("Failed to dump {:?} from {}", options.prefix, connection.address))?;

    match report.output {
        Some((path, size)) => info!(
            "Saved {} keys ({} bytes) to {}",
            report.records,
            size,
            path.display()
        ),
        None => info!("Found {} keys, no output file given", report.records),
    }

    Ok(())
}
