use anyhow::{Context, Result};
use clap::Args;
use kvdump_core::snapshot::{self, Snapshot};
use std::io::Write;
use std::path::PathBuf;

#[derive(Args)]
pub struct VerifyArgs {
    /// Snapshot FILE to check
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Also list every key in the snapshot
    #[arg(long)]
    pub keys: bool,
}

pub async fn execute_verify(args: VerifyArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let snapshot = snapshot::decode_validated(&bytes)
        .with_context(|| format!("{} is not a valid snapshot", args.file.display()))?;

    let mut stdout = std::io::stdout();
    print_summary(&mut stdout, &args.file, bytes.len(), &snapshot, args.keys)?;
    Ok(())
}

fn print_summary<W: Write>(
    out: &mut W,
    path: &std::path::Path,
    file_size: usize,
    snapshot: &Snapshot,
    list_keys: bool,
) -> Result<()> {
    let header = &snapshot.header;
    writeln!(out, "✓ Snapshot file is valid")?;
    writeln!(out, "  File: {}", path.display())?;
    writeln!(out, "  Format version: {}", header.version)?;
    writeln!(
        out,
        "  Created: {}",
        header.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out, "  Prefix: {}", header.prefix_str())?;
    writeln!(out, "  Revision: {}", header.revision)?;
    writeln!(out, "  Records: {}", snapshot.len())?;
    writeln!(
        out,
        "  Size: {} bytes ({} bytes of records)",
        file_size,
        snapshot.payload_bytes()
    )?;

    if list_keys {
        writeln!(out)?;
        for record in snapshot.records()? {
            writeln!(out, "{}", record.key_str())?;
        }
    }
    Ok(())
}
