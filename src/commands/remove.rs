//! # Remove Command Implementation
//!
//! Deletes the directory of each named plugin, firing its delete hooks. The
//! manifest is left alone: a plugin still declared there comes back on the
//! next `install`.

use anyhow::Result;
use clap::Args;

use plugsync::output::emoji;
use plugsync::suggestions;

use super::Context;

/// Delete plugins by name
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Plugins to remove.
    #[arg(value_name = "NAME", required = true)]
    pub names: Vec<String>,
}

/// Execute the `remove` command.
pub fn execute(args: RemoveArgs, ctx: &Context) -> Result<()> {
    let (mut session, _notifier) = ctx.session()?;

    {
        let known = session.names();
        if let Some(name) = args.names.iter().find(|n| !known.contains(&n.as_str())) {
            return Err(suggestions::unknown_plugin(name, &known));
        }
    }

    for name in &args.names {
        let spec = session.remove(name)?;
        println!(
            "{} Removed {} ({})",
            emoji(&ctx.output, "🗑️ ", "[DELETE]"),
            spec.name,
            spec.path.display()
        );
    }
    println!("hint: Remove the entries from the manifest too, or 'install' brings them back");
    Ok(())
}
