//! # Checkout Command Implementation
//!
//! Checks plugins out to one of:
//!
//! - a snapshot or target file (`plugsync checkout FILE`),
//! - the latest rollback snapshot (`--rollback`),
//! - explicit targets (`--set name=ref`, repeatable),
//! - every plugin's declared target (no arguments).
//!
//! Unless the file being applied is itself a rollback snapshot, the current
//! state is saved to the rollback directory first.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use plugsync::checkout::{CheckoutRequest, TargetMap, TargetValue};
use plugsync::error::Error;
use plugsync::output::emoji;
use plugsync::snapshot;
use plugsync::suggestions;

use super::Context;

/// Check plugins out to a snapshot, explicit targets or their declared targets
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Snapshot or target file to apply.
    #[arg(value_name = "FILE", conflicts_with_all = ["rollback", "set"])]
    pub file: Option<PathBuf>,

    /// Apply the most recent rollback snapshot.
    #[arg(long, conflicts_with = "set")]
    pub rollback: bool,

    /// Check out NAME to REF. Use `true` for the default branch.
    #[arg(long, value_name = "NAME=REF", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,
}

fn parse_assignment(input: &str) -> std::result::Result<(String, String), String> {
    match input.split_once('=') {
        Some((name, target)) if !name.is_empty() && !target.is_empty() => {
            Ok((name.to_string(), target.to_string()))
        }
        _ => Err(format!("expected NAME=REF, got '{}'", input)),
    }
}

/// Execute the `checkout` command.
pub async fn execute(args: CheckoutArgs, ctx: &Context) -> Result<()> {
    let (mut session, notifier) = ctx.session()?;

    let request = if let Some(file) = args.file {
        CheckoutRequest::File(file)
    } else if args.rollback {
        let latest = snapshot::list_rollbacks(session.rollback_dir())?.pop();
        match latest {
            Some(path) => CheckoutRequest::File(path),
            None => anyhow::bail!(
                "No rollback snapshots in {}",
                session.rollback_dir().display()
            ),
        }
    } else if !args.set.is_empty() {
        let known = session.names();
        let mut targets = TargetMap::new();
        for (name, target) in args.set {
            if !known.contains(&name.as_str()) {
                return Err(suggestions::unknown_plugin(&name, &known));
            }
            let value = if target == "true" {
                TargetValue::DefaultBranch
            } else {
                TargetValue::Ref(target)
            };
            targets.insert(name, value);
        }
        CheckoutRequest::Map(targets)
    } else {
        CheckoutRequest::Declared
    };

    let source = match &request {
        CheckoutRequest::File(path) => Some(path.clone()),
        _ => None,
    };
    let report = match session.checkout(request).await {
        Ok(report) => report,
        Err(error @ Error::SnapshotParse { .. }) => {
            let path = source.unwrap_or_default();
            return Err(suggestions::snapshot_unusable(&path, &error));
        }
        Err(other) => return Err(other.into()),
    };
    notifier.finish();

    if let Some(path) = &report.rollback {
        println!(
            "{} Saved rollback snapshot to {}",
            emoji(&ctx.output, "💾", "[SAVED]"),
            path.display()
        );
    }
    if report.applied.is_empty() && report.failed.is_empty() {
        println!("{} Nothing to check out", emoji(&ctx.output, "✅", "[OK]"));
    }
    for (name, target) in &report.applied {
        println!("{} {} -> {}", emoji(&ctx.output, "🔄", "[MOVED]"), name, target);
    }
    if !report.failed.is_empty() {
        for name in &report.failed {
            println!("{} {}", emoji(&ctx.output, "❌", "[FAIL]"), name);
        }
        anyhow::bail!("{} plugin(s) failed to check out", report.failed.len());
    }
    Ok(())
}
