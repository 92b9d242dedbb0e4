//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `plugsync` command-line tool. Each subcommand is defined in its own file to
//! keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the shared
//!   [`Context`] built from the global flags.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use plugsync::config::{self, Manifest};
use plugsync::output::{OutputConfig, ProgressNotifier};
use plugsync::session::Session;
use plugsync::suggestions;

pub mod checkout;
pub mod clean;
pub mod completions;
pub mod install;
pub mod list;
pub mod remove;
pub mod snapshot;
pub mod update;
pub mod validate;

/// Values from the global flags shared by every command.
#[derive(Debug)]
pub struct Context {
    pub manifest: PathBuf,
    pub plugin_dir: Option<PathBuf>,
    pub output: OutputConfig,
    pub quiet: bool,
}

impl Context {
    /// Load the manifest, applying the `--plugin-dir` override.
    pub fn load_manifest(&self) -> Result<Manifest> {
        if !self.manifest.exists() {
            return Err(suggestions::manifest_not_found(&self.manifest));
        }
        let mut manifest = config::from_file(&self.manifest)
            .with_context(|| format!("Failed to load manifest from {}", self.manifest.display()))?;
        if let Some(dir) = &self.plugin_dir {
            manifest.settings.plugin_dir = Some(dir.clone());
        }
        Ok(manifest)
    }

    /// Build a session whose notifications go to a progress spinner.
    pub fn session(&self) -> Result<(Session, Arc<ProgressNotifier>)> {
        let manifest = self.load_manifest()?;
        let notifier = Arc::new(ProgressNotifier::new(&self.output, self.quiet));
        let session = Session::from_manifest(&manifest, notifier.clone())
            .with_context(|| format!("Invalid plugin in {}", self.manifest.display()))?;
        Ok((session, notifier))
    }
}
