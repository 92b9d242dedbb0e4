//! # Snapshot Command Implementation
//!
//! Records the commit every installed plugin has checked out. The snapshot
//! is printed as JSON, or written to `--output` for a later
//! `plugsync checkout <FILE>`.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use plugsync::output::emoji;
use plugsync::snapshot;

use super::Context;

/// Record the current commit of every plugin
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Write the snapshot to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the `snapshot` command.
pub async fn execute(args: SnapshotArgs, ctx: &Context) -> Result<()> {
    let (session, notifier) = ctx.session()?;
    let snap = session.snapshot().await;
    notifier.finish();

    match args.output {
        Some(path) => {
            snapshot::write(&path, &snap)
                .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
            println!(
                "{} Saved {} plugin(s) to {}",
                emoji(&ctx.output, "💾", "[SAVED]"),
                snap.len(),
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&snap)?),
    }
    Ok(())
}
