//! Development automation tasks for plugsync.
//!
//! ```bash
//! cargo xtask integration [FILTER] [--serial]  # git-backed test suites
//! cargo xtask sandbox target/sandbox           # local upstreams + manifest
//! cargo xtask bench [--baseline NAME]          # manifest parsing benchmarks
//! cargo xtask coverage [--fail-under N]        # lcov report via tarpaulin
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Plugins the sandbox creates, with the tags each upstream carries.
const SANDBOX_PLUGINS: &[(&str, &[&str])] = &[
    ("telescope", &["v0.1.0", "v0.2.0"]),
    ("lualine", &["v1.0.0"]),
    ("treesitter", &[]),
];

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development automation tasks for plugsync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the integration tests, which build local git repositories
    Integration {
        /// Only run tests whose name contains this filter
        filter: Option<String>,
        /// Run the tests with a single thread
        #[arg(long)]
        serial: bool,
    },
    /// Create local upstream repositories and a manifest pointing at them
    Sandbox {
        /// Directory to create; must not exist yet
        dir: PathBuf,
    },
    /// Run the criterion benchmarks
    Bench {
        /// Save results under this baseline name
        #[arg(long)]
        baseline: Option<String>,
    },
    /// Write an lcov coverage report with cargo-tarpaulin
    Coverage {
        /// Minimum coverage threshold (0-100)
        #[arg(long)]
        fail_under: Option<u8>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace_root = workspace_root()?;
    env::set_current_dir(&workspace_root).with_context(|| {
        format!(
            "Failed to change to workspace root: {}",
            workspace_root.display()
        )
    })?;

    match cli.command {
        Commands::Integration { filter, serial } => run_integration(filter.as_deref(), serial),
        Commands::Sandbox { dir } => run_sandbox(&dir),
        Commands::Bench { baseline } => run_bench(baseline.as_deref()),
        Commands::Coverage { fail_under } => run_coverage(fail_under),
    }
}

fn workspace_root() -> Result<PathBuf> {
    let output = Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("Failed to run 'cargo locate-project'")?;

    if !output.status.success() {
        bail!("Failed to locate workspace root");
    }

    let manifest = String::from_utf8(output.stdout).context("Invalid UTF-8 in cargo output")?;
    PathBuf::from(manifest.trim())
        .parent()
        .map(Path::to_path_buf)
        .context("Failed to get parent directory of Cargo.toml")
}

/// Run the test suites gated behind the `integration-tests` feature.
fn run_integration(filter: Option<&str>, serial: bool) -> Result<()> {
    require_git()?;

    let mut args = vec!["test", "--features", "integration-tests"];
    if let Some(filter) = filter {
        args.push(filter);
    }
    if serial {
        args.extend(["--", "--test-threads=1"]);
    }

    println!("Running integration tests...");
    if !run_cargo(&args)?.success() {
        bail!("Integration tests failed");
    }
    Ok(())
}

/// Build a throwaway plugin setup for trying the binary by hand.
fn run_sandbox(dir: &Path) -> Result<()> {
    require_git()?;
    if dir.exists() {
        bail!("{} already exists", dir.display());
    }
    let dir = env::current_dir()?.join(dir);

    let mut manifest = format!(
        "settings:\n  plugin_dir: {}\n  rollback_dir: {}\nplugins:\n",
        dir.join("plugins").display(),
        dir.join("rollback").display()
    );
    for (name, tags) in SANDBOX_PLUGINS {
        let upstream = dir.join("upstream").join(name);
        create_upstream(&upstream, name, tags)?;
        manifest.push_str(&format!("  - source: {}\n", upstream.display()));
        if let Some(tag) = tags.first() {
            manifest.push_str(&format!("    checkout: {}\n    track: main\n", tag));
        }
    }

    let manifest_path = dir.join("plugsync.yaml");
    fs::write(&manifest_path, manifest)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    println!("Sandbox ready in {}", dir.display());
    println!();
    println!("Try:");
    println!("  export PLUGSYNC_CONFIG={}", manifest_path.display());
    println!("  cargo run -- install");
    println!("  cargo run -- update --offline");
    Ok(())
}

/// An upstream on `main` with one commit per tag plus one untagged commit.
fn create_upstream(path: &Path, name: &str, tags: &[&str]) -> Result<()> {
    fs::create_dir_all(path)?;
    git(path, &["init", "--quiet"])?;
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    git(path, &["config", "user.name", "xtask"])?;
    git(path, &["config", "user.email", "xtask@localhost"])?;

    for (i, tag) in tags.iter().enumerate() {
        fs::write(path.join("init.lua"), format!("return {}\n", i))?;
        git(path, &["add", "init.lua"])?;
        git(path, &["commit", "--quiet", "-m", &format!("{} {}", name, tag)])?;
        git(path, &["tag", tag])?;
    }
    fs::write(path.join("init.lua"), "return 'head'\n")?;
    git(path, &["add", "init.lua"])?;
    git(path, &["commit", "--quiet", "-m", &format!("{} work in progress", name)])?;
    Ok(())
}

fn run_bench(baseline: Option<&str>) -> Result<()> {
    let mut args = vec!["bench", "--bench", "manifest_parsing"];
    if let Some(baseline) = baseline {
        args.extend(["--", "--save-baseline", baseline]);
    }
    if !run_cargo(&args)?.success() {
        bail!("Benchmarks failed");
    }
    println!("Reports: target/criterion/report/index.html");
    Ok(())
}

fn run_coverage(fail_under: Option<u8>) -> Result<()> {
    if !is_command_available("cargo-tarpaulin") {
        bail!("cargo-tarpaulin not found; install with: cargo install cargo-tarpaulin");
    }

    let threshold = fail_under.map(|t| t.to_string());
    let mut args = vec!["tarpaulin", "--workspace", "--exclude", "xtask", "--out", "Lcov"];
    // The git-backed suites only count when they can run
    if is_command_available("git") {
        args.extend(["--features", "integration-tests"]);
    }
    if let Some(threshold) = &threshold {
        args.extend(["--fail-under", threshold.as_str()]);
    }

    println!("Running coverage...");
    if !run_cargo(&args)?.success() {
        bail!("Coverage failed");
    }
    println!("Coverage report: target/tarpaulin/lcov.info");
    Ok(())
}

fn require_git() -> Result<()> {
    if !is_command_available("git") {
        bail!("git is not installed; plugsync drives every plugin through it");
    }
    Ok(())
}

fn git(dir: &Path, args: &[&str]) -> Result<()> {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .context("Failed to run git")?;
    if !status.success() {
        bail!("git {} failed in {}", args.join(" "), dir.display());
    }
    Ok(())
}

fn is_command_available(cmd: &str) -> bool {
    Command::new(cmd)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn run_cargo(args: &[&str]) -> Result<ExitStatus> {
    Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))
}
