//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance,
//! including color and emoji support based on terminal capabilities and
//! user preferences, and a progress notifier for long-running git batches.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use plugsync::output::{OutputConfig, ProgressNotifier};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! let notifier = ProgressNotifier::new(&config, quiet);
//! ```

use std::env;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::notify::{Level, Notifier};
use crate::spec::{SyncState, SyncStatus};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// - `--color=always`: Force colors on (overrides NO_COLOR)
    /// - `--color=never`: Force colors off
    /// - `--color=auto`: Detect based on environment
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        console::set_colors_enabled(use_color);
        console::set_colors_enabled_stderr(use_color);

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stderr().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain text otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Short label for a plugin's state after an update or checkout.
pub fn status_label(config: &OutputConfig, state: &SyncState) -> String {
    if let Some(error) = &state.error {
        let first = error.lines().next().unwrap_or_default();
        return format!("{} {}", emoji(config, "❌", "[FAIL]"), first);
    }
    match &state.status {
        Some(SyncStatus::NoChanges) => format!("{} up to date", emoji(config, "✅", "[OK]")),
        Some(SyncStatus::CheckedOut) => format!("{} checked out", emoji(config, "🔄", "[MOVED]")),
        Some(SyncStatus::Failed(message)) => {
            let first = message.lines().next().unwrap_or_default();
            format!("{} {}", emoji(config, "❌", "[FAIL]"), first)
        }
        None if state.has_checkout_change() => {
            format!("{} update available", emoji(config, "📦", "[NEW]"))
        }
        None => format!("{} up to date", emoji(config, "✅", "[OK]")),
    }
}

/// Notifier that draws a spinner on stderr and prints warnings and errors
/// above it.
pub struct ProgressNotifier {
    bar: ProgressBar,
    config: OutputConfig,
}

impl ProgressNotifier {
    /// Create a notifier. A `quiet` notifier only prints warnings and errors.
    pub fn new(config: &OutputConfig, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new_spinner()
        };
        if let Ok(spinner) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(spinner);
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            config: config.clone(),
        }
    }

    /// Remove the spinner line.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Notifier for ProgressNotifier {
    fn notify(&self, message: &str, level: Level) {
        match level {
            Level::Info => self.bar.set_message(message.to_string()),
            Level::Warning => {
                let prefix = emoji(&self.config, "⚠️ ", "[WARN]");
                let line = format!("{} {}", prefix, message);
                self.bar.suspend(|| eprintln!("{}", style(line).yellow()));
            }
            Level::Error => {
                let prefix = emoji(&self.config, "❌", "[ERROR]");
                let line = format!("{} {}", prefix, message);
                self.bar.suspend(|| eprintln!("{}", style(line).red()));
            }
        }
    }
}
