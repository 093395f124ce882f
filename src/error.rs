//! # Error Handling
//!
//! This module defines the centralized error type for `release-tree`. It uses
//! `thiserror` to build a single `Error` enum covering every failure mode of
//! the orchestrator, with enough context in each variant to produce a single
//! clear diagnostic line at the top-level entry point.
//!
//! ## Taxonomy
//!
//! - **Configuration errors** (`RemoteAliasNotFound`, `ConfigParse`,
//!   `InvalidOtherVersions`): fatal, never retried.
//! - **Data errors** (`MalformedVersion`, `Descriptor`, `ReleaseLog`): fatal,
//!   never guessed or auto-corrected.
//! - **Command failures** (`CommandFailed`): only raised once the retry budget
//!   of a network operation is exhausted, or immediately for local commands.
//! - **Run aborts** (`PartialRunAbort`): wraps the first fatal error of a
//!   repository-set pass together with the list of repositories that had
//!   already reached their target, to help a manual resume.
//!
//! A label missing on one repository is deliberately *not* an error: it is
//! reported as a fallback resolution and logged as a warning.

use thiserror::Error;

/// Main error type for release-tree operations
#[derive(Error, Debug)]
pub enum Error {
    /// The requested remote alias is not configured on the root repository.
    #[error("Remote alias '{alias}' not found (configured remotes: {})", if available.is_empty() { "none".to_string() } else { available.join(", ") })]
    RemoteAliasNotFound {
        alias: String,
        /// Aliases that are configured, for the diagnostic
        available: Vec<String>,
    },

    /// Neither the release label nor the default branch exist in a repository.
    #[error("Repository '{repository}' has neither '{label}' nor its default branch '{default_branch}'")]
    BranchNotFound {
        repository: String,
        label: String,
        default_branch: String,
    },

    /// A version string could not be parsed or incremented.
    #[error("Malformed version '{version}': {message}")]
    MalformedVersion { version: String, message: String },

    /// An external command exited with a non-zero status.
    ///
    /// For network operations this is only raised after every retry attempt
    /// failed.
    #[error("Command failed with exit code {code} after {attempts} attempt(s): {command}{}", if output.trim().is_empty() { String::new() } else { format!("\n{}", output.trim_end()) })]
    CommandFailed {
        command: String,
        code: i32,
        attempts: u32,
        output: String,
    },

    /// A repository could not reach its target during a repository-set pass.
    #[error("Release aborted on '{failed}' ({} repositories already updated: {}): {source}", succeeded.len(), if succeeded.is_empty() { "none".to_string() } else { succeeded.join(", ") })]
    PartialRunAbort {
        failed: String,
        succeeded: Vec<String>,
        #[source]
        source: Box<Error>,
    },

    /// The project descriptor (`pom.xml`) could not be read or interpreted.
    #[error("Descriptor error in {path}: {message}")]
    Descriptor { path: String, message: String },

    /// The release log file could not be decoded.
    #[error("Release log error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ReleaseLog {
        message: String,
        /// One-based line number, when the error is tied to a line
        line: Option<usize>,
    },

    /// The configuration file could not be parsed.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The `--arv` value (other versions to replace) is malformed.
    #[error("Could not parse other versions parameter '{value}': {message}")]
    InvalidOtherVersions { value: String, message: String },

    /// Work was skipped because another repository already failed.
    #[error("Cancelled: {context}")]
    Cancelled { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// The worker pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Process exit status for this error.
    ///
    /// A failed external command propagates its own exit code; every other
    /// fatal condition exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::CommandFailed { code, .. } if *code != 0 => *code,
            Error::PartialRunAbort { source, .. } => source.exit_code(),
            _ => 1,
        }
    }

    /// Shorthand for a malformed version error.
    pub fn malformed_version(version: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MalformedVersion {
            version: version.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a release log error tied to a line.
    pub fn release_log(line: usize, message: impl Into<String>) -> Self {
        Error::ReleaseLog {
            message: message.into(),
            line: Some(line),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
