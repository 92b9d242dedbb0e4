//! # Update Command Implementation
//!
//! This module implements the `update` subcommand, which runs the update
//! pipeline over the installed plugins.
//!
//! ## Functionality
//!
//! - **Preview**: Fetches upstream changes and shows, per plugin, the commits
//!   a checkout would bring in. With `--offline` nothing is fetched and the
//!   preview is computed from local data.
//!
//! - **Interactive Confirmation**: Before moving any plugin it asks for
//!   confirmation. This can be bypassed with the `--yes` flag; without a
//!   terminal the command only previews.
//!
//! - **JSON Output**: `--json` prints the computed state of each plugin as
//!   plain data instead of the summary.

use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};
use serde::Serialize;

use plugsync::git;
use plugsync::output::{emoji, status_label, OutputConfig};
use plugsync::phases::UpdateOptions;
use plugsync::session::Session;
use plugsync::spec::{PluginSpec, SyncState, NO_COMMITS};
use plugsync::suggestions;

use super::Context;

/// Fetch upstream changes and check plugins out to their targets
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Plugins to update. Defaults to all declared plugins.
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Do not fetch; preview from what is already downloaded.
    #[arg(long)]
    pub offline: bool,

    /// Check out without asking for confirmation.
    #[arg(short, long)]
    pub yes: bool,

    /// Print the state of each plugin as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PluginReport<'a> {
    name: &'a str,
    #[serde(flatten)]
    state: &'a SyncState,
}

/// Execute the `update` command.
pub async fn execute(args: UpdateArgs, ctx: &Context) -> Result<()> {
    let (mut session, notifier) = ctx.session()?;
    check_names(&session, &args.names)?;

    let options = UpdateOptions {
        download: !args.offline,
        apply: args.yes && !args.offline,
    };
    session.update(&args.names, options).await?;
    notifier.finish();

    let selected = |spec: &&PluginSpec| args.names.is_empty() || args.names.contains(&spec.name);

    if !options.apply && !args.offline {
        let pending = session
            .specs()
            .iter()
            .filter(selected)
            .filter(|spec| spec.state.error.is_none() && spec.state.has_checkout_change())
            .count();
        if !args.json {
            print_summary(&ctx.output, session.specs().iter().filter(selected));
        }
        if pending > 0 && confirm(pending)? {
            session.apply_updates().await;
            notifier.finish();
        }
    }

    if args.json {
        let reports: Vec<PluginReport> = session
            .specs()
            .iter()
            .filter(selected)
            .map(|spec| PluginReport {
                name: &spec.name,
                state: &spec.state,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else if options.apply || session.specs().iter().any(|s| s.state.status.is_some()) {
        print_results(&ctx.output, session.specs().iter().filter(selected));
    } else if args.offline {
        print_summary(&ctx.output, session.specs().iter().filter(selected));
    }

    let failed = session
        .specs()
        .iter()
        .filter(selected)
        .filter(|spec| spec.state.error.is_some())
        .count();
    if failed > 0 {
        anyhow::bail!("{} plugin(s) failed to update", failed);
    }
    Ok(())
}

fn check_names(session: &Session, names: &[String]) -> Result<()> {
    let known = session.names();
    match names.iter().find(|name| !known.contains(&name.as_str())) {
        Some(name) => Err(suggestions::unknown_plugin(name, &known)),
        None => Ok(()),
    }
}

fn confirm(pending: usize) -> Result<bool> {
    if !console::Term::stdout().is_term() {
        println!("\nRun with --yes to check out {} plugin(s).", pending);
        return Ok(false);
    }
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Check out {} plugin(s)?", pending))
        .default(false)
        .interact()?;
    Ok(answer)
}

fn print_summary<'a>(out: &OutputConfig, specs: impl Iterator<Item = &'a PluginSpec>) {
    for spec in specs {
        println!("{} {}", spec.name, status_label(out, &spec.state));
        if spec.state.checkout_log != NO_COMMITS {
            let lines: Vec<String> =
                spec.state.checkout_log.lines().map(str::to_string).collect();
            let added = git::added_commits(&lines).len();
            println!(
                "   {} {} new, {} dropped",
                emoji(out, "📝", "[LOG]"),
                added,
                lines.len() - added
            );
            for line in &lines {
                println!("     {}", line);
            }
        }
        if spec.state.pending_log != NO_COMMITS {
            let count = spec.state.pending_log.lines().count();
            println!(
                "   {} {} more on '{}' beyond the checkout target",
                emoji(out, "⏳", "[TRACK]"),
                count,
                spec.track.as_deref().unwrap_or_default()
            );
        }
    }
}

fn print_results<'a>(out: &OutputConfig, specs: impl Iterator<Item = &'a PluginSpec>) {
    for spec in specs {
        println!("{} {}", spec.name, status_label(out, &spec.state));
    }
}
