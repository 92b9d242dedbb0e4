//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use plugsync::config::DEFAULT_MANIFEST;
use plugsync::output::OutputConfig;

use crate::commands::{self, Context};

/// plugsync - Keep a directory of git-managed plugins in sync
#[derive(Parser, Debug)]
#[command(name = "plugsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Path to the plugsync.yaml manifest
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = "PLUGSYNC_CONFIG",
        default_value = DEFAULT_MANIFEST
    )]
    config: PathBuf,

    /// Directory holding the plugin checkouts (overrides the manifest)
    #[arg(long, global = true, value_name = "DIR", env = "PLUGSYNC_PLUGIN_DIR")]
    plugin_dir: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Only print warnings, errors and results
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch upstream changes and check plugins out to their targets
    Update(commands::update::UpdateArgs),

    /// Clone plugins that are declared but not present yet
    Install(commands::install::InstallArgs),

    /// Record the current commit of every plugin
    Snapshot(commands::snapshot::SnapshotArgs),

    /// Check plugins out to a snapshot, explicit targets or their declared targets
    Checkout(commands::checkout::CheckoutArgs),

    /// Delete plugin directories that are no longer declared
    Clean(commands::clean::CleanArgs),

    /// Delete plugins by name
    Remove(commands::remove::RemoveArgs),

    /// List declared plugins
    List(commands::list::ListArgs),

    /// Validate the manifest without touching any plugin
    Validate(commands::validate::ValidateArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.as_str()),
        )
        .format_timestamp(None)
        .init();

        let ctx = Context {
            manifest: self.config,
            plugin_dir: self.plugin_dir,
            output: OutputConfig::from_env_and_flag(&self.color),
            quiet: self.quiet,
        };

        match self.command {
            Commands::Update(args) => commands::update::execute(args, &ctx).await,
            Commands::Install(args) => commands::install::execute(args, &ctx).await,
            Commands::Snapshot(args) => commands::snapshot::execute(args, &ctx).await,
            Commands::Checkout(args) => commands::checkout::execute(args, &ctx).await,
            Commands::Clean(args) => commands::clean::execute(args, &ctx),
            Commands::Remove(args) => commands::remove::execute(args, &ctx),
            Commands::List(args) => commands::list::execute(args, &ctx),
            Commands::Validate(args) => commands::validate::execute(args, &ctx),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
