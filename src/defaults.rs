//! Default values for release-tree configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Remote alias used when neither `--remote` nor the configuration names one.
pub const DEFAULT_REMOTE_ALIAS: &str = "origin";

/// Repositories are processed one at a time unless asked otherwise.
pub const DEFAULT_JOBS: usize = 1;

/// Returns the user-level configuration file, if the platform has a
/// configuration directory.
///
/// - Linux: `~/.config/release-tree/config.yaml` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/release-tree/config.yaml`
/// - Windows: `{FOLDERID_RoamingAppData}\release-tree\config.yaml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("release-tree").join("config.yaml"))
}

/// Returns the directory a tree is cloned into when `clone` is not given one.
///
/// The current directory, falling back to `.` when it cannot be read.
pub fn default_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Makes `path` absolute against the current directory and folds `.` and
/// `..` lexically, so that `file_name` and `parent` name real directories
/// (`--root .` is the current directory, not an empty name). Symlinks are
/// not resolved.
pub fn absolute_root(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut folded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other),
        }
    }
    Ok(folded)
}
