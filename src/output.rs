//! # Output Configuration
//!
//! Controls how summaries and resolution reports look on the terminal.
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
//! use release_tree::output::{OutputConfig, render_report};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("{}", render_report(&config, &report));
//! ```

use std::env;

use console::style;

use crate::repository::ResolutionReport;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
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
        console::Term::stdout().features().colors_supported()
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

/// Returns the emoji when colors are enabled, else the plain alternative.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// A release summary under a heading. Labels are left as computed so the
/// columns stay aligned.
pub fn render_summary(config: &OutputConfig, heading: &str, summary: &str) -> String {
    let heading = if config.use_color {
        style(heading).bold().to_string()
    } else {
        heading.to_string()
    };
    format!("{}\n{}", heading, summary)
}

/// One line per repository: name, role and what was checked out.
/// Repositories left on their default branch are flagged.
pub fn render_report(config: &OutputConfig, report: &ResolutionReport) -> String {
    let width = report
        .repositories
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0);
    report
        .repositories
        .iter()
        .map(|r| {
            let marker = if r.resolution.is_fallback() {
                emoji(config, "⚠️ ", "[WARN]")
            } else {
                emoji(config, "✅", "[OK]")
            };
            let resolution = r.resolution.to_string();
            let resolution = if config.use_color && r.resolution.is_fallback() {
                style(resolution).yellow().to_string()
            } else {
                resolution
            };
            format!(
                "{} {:<width$} {:<7} {}",
                marker,
                r.name,
                r.kind.to_string(),
                resolution,
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
