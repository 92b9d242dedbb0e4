//! # Install Command Implementation
//!
//! Clones every declared plugin whose directory does not exist yet and checks
//! out its declared target. Plugins that are already present are untouched.

use anyhow::Result;
use clap::Args;

use plugsync::output::emoji;

use super::Context;

/// Clone plugins that are declared but not present yet
#[derive(Args, Debug)]
pub struct InstallArgs {}

/// Execute the `install` command.
pub async fn execute(_args: InstallArgs, ctx: &Context) -> Result<()> {
    let (mut session, notifier) = ctx.session()?;
    let missing = session
        .specs()
        .iter()
        .filter(|spec| !spec.path.exists())
        .count();

    let installed = session.install().await?;
    notifier.finish();

    if missing == 0 {
        println!("{} All plugins are installed", emoji(&ctx.output, "✅", "[OK]"));
        return Ok(());
    }
    for name in &installed {
        println!("{} {}", emoji(&ctx.output, "📦", "[NEW]"), name);
    }
    if installed.len() < missing {
        anyhow::bail!(
            "{} of {} plugin(s) could not be installed",
            missing - installed.len(),
            missing
        );
    }
    Ok(())
}
