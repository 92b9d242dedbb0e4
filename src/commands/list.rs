//! # List Command Implementation
//!
//! Prints the declared plugins in manifest order with their source, checkout
//! target and whether they are installed.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use plugsync::output::emoji;
use plugsync::spec::PluginSpec;

use super::Context;

/// List declared plugins
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print the list as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Entry<'a> {
    name: &'a str,
    source: &'a str,
    path: String,
    checkout: Option<String>,
    track: Option<&'a str>,
    installed: bool,
}

impl<'a> From<&'a PluginSpec> for Entry<'a> {
    fn from(spec: &'a PluginSpec) -> Self {
        Self {
            name: &spec.name,
            source: &spec.source,
            path: spec.path.display().to_string(),
            checkout: spec.checkout.as_ref().map(ToString::to_string),
            track: spec.track.as_deref(),
            installed: spec.is_installed(),
        }
    }
}

/// Execute the `list` command.
pub fn execute(args: ListArgs, ctx: &Context) -> Result<()> {
    let (session, _notifier) = ctx.session()?;
    let entries: Vec<Entry> = session.specs().iter().map(Entry::from).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No plugins declared in {}", ctx.manifest.display());
        return Ok(());
    }
    for entry in &entries {
        let marker = if entry.installed {
            emoji(&ctx.output, "✅", "[OK]")
        } else {
            emoji(&ctx.output, "⬜", "[MISSING]")
        };
        let target = entry.checkout.as_deref().unwrap_or("<default branch>");
        println!("{} {} ({}) @ {}", marker, entry.name, entry.source, target);
    }
    Ok(())
}
