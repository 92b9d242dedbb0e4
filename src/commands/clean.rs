//! # Clean Command Implementation
//!
//! Deletes directories under the plugin root that belong to no declared
//! plugin. `--dry-run` only lists them. Without `--force` the command asks
//! first, and refuses outright when there is no terminal to ask on.

use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};

use plugsync::output::emoji;
use plugsync::suggestions;

use super::Context;

/// Delete plugin directories that are no longer declared
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Only list what would be deleted.
    #[arg(long)]
    pub dry_run: bool,

    /// Delete without asking for confirmation.
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the `clean` command.
pub fn execute(args: CleanArgs, ctx: &Context) -> Result<()> {
    let (session, _notifier) = ctx.session()?;
    let candidates = session.clean_candidates()?;

    if candidates.is_empty() {
        println!("{} Nothing to clean", emoji(&ctx.output, "✅", "[OK]"));
        return Ok(());
    }
    for path in &candidates {
        println!("{} {}", emoji(&ctx.output, "🗑️ ", "[DELETE]"), path.display());
    }
    if args.dry_run {
        return Ok(());
    }

    if !args.force {
        if !console::Term::stdout().is_term() {
            return Err(suggestions::clean_needs_force());
        }
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete {} directories?", candidates.len()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }

    let deleted = session.clean()?;
    println!("Deleted {} directories", deleted.len());
    Ok(())
}
