//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks the
//! `plugsync.yaml` manifest without touching any plugin.
//!
//! ## Functionality
//!
//! - **Manifest Validation**: Parses the manifest and validates every plugin
//!   entry field by field.
//! - **Normalization**: Normalizes each entry as a session would, catching
//!   names that cannot become directories.
//! - **Duplicates**: Warns about plugins declared twice; only the first
//!   declaration is used.
//!
//! This command is a safe, read-only operation that does not modify any files.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use plugsync::notify::LogNotifier;
use plugsync::output::emoji;
use plugsync::session::Session;
use plugsync::spec::normalize;

use super::Context;

/// Validate the manifest without touching any plugin
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let out = &ctx.output;
    println!(
        "{} Validating manifest: {}",
        emoji(out, "🔍", "[SCAN]"),
        ctx.manifest.display()
    );

    let manifest = match ctx.load_manifest() {
        Ok(manifest) => manifest,
        Err(e) => {
            println!("{} Manifest is invalid", emoji(out, "❌", "[ERR]"));
            return Err(e);
        }
    };

    let mut warnings = 0;
    let mut seen = HashSet::new();
    let plugin_dir = manifest.settings.plugin_dir();
    for entry in &manifest.plugins {
        let spec = normalize(&entry.source, entry.options.clone(), &plugin_dir)?;
        if !seen.insert(spec.name.clone()) {
            println!(
                "{} '{}' is declared more than once; the first declaration wins",
                emoji(out, "⚠️ ", "[WARN]"),
                spec.name
            );
            warnings += 1;
        }
    }

    let session = Session::from_manifest(&manifest, Arc::new(LogNotifier))?;
    let settings = session.scheduler().settings();

    println!("\n{} Manifest Summary:", emoji(out, "📊", "[INFO]"));
    println!("   Plugins: {}", session.specs().len());
    println!("   Plugin directory: {}", session.plugin_root().display());
    println!("   Rollback directory: {}", session.rollback_dir().display());
    println!("   Concurrency: {}", settings.concurrency);
    println!("   Timeout per job: {}s", settings.timeout_per_job.as_secs());

    if args.strict && warnings > 0 {
        anyhow::bail!("Validation failed with {} warning(s)", warnings);
    }
    println!("\n{} Manifest is valid", emoji(out, "✅", "[OK]"));
    Ok(())
}
