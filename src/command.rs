//! External command execution.
//!
//! The orchestrator never talks to a VCS directly: it builds argument vectors
//! and hands them to a `CommandRunner`. The default runner spawns the program
//! with `std::process::Command` (no shell), in an explicit working directory,
//! and captures stdout and stderr together.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};

/// A program invocation: argument vector plus working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I, cwd: &Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.to_path_buf(),
        }
    }

    /// `git <args>` in `cwd`.
    pub fn git<I, S>(args: I, cwd: &Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("git", args, cwd)
    }

    /// `hg <args>` in `cwd`, for addons still on the legacy VCS.
    pub fn hg<I, S>(args: I, cwd: &Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("hg", args, cwd)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Exit code and combined output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub code: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            code: 0,
            output: output.into(),
        }
    }

    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        Self {
            code,
            output: output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Non-empty trimmed output lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Converts a non-zero exit into `Error::CommandFailed`.
    pub fn check(self, spec: &CommandSpec, attempts: u32) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                command: spec.to_string(),
                code: self.code,
                attempts,
                output: self.output,
            })
        }
    }
}

/// Trait for running external commands - allows mocking in tests
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion.
    ///
    /// A non-zero exit is reported through `CommandOutput::code`, not as an
    /// error; `Err` means the program could not be started at all.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as child processes of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!("[{}] $ {}", spec.cwd.display(), spec);
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .output()
            .map_err(|e| Error::CommandFailed {
                command: spec.to_string(),
                code: 1,
                attempts: 1,
                output: format!("could not start '{}': {}", spec.program, e),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        // Killed by a signal: no code, report a generic failure.
        let code = output.status.code().unwrap_or(1);
        Ok(CommandOutput {
            code,
            output: combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_arguments_with_spaces() {
        let spec = CommandSpec::git(["commit", "-m", "Release 5.6"], Path::new("."));
        assert_eq!(spec.to_string(), "git commit -m 'Release 5.6'");
    }

    #[test]
    fn test_check_success_passes_through() {
        let spec = CommandSpec::git(["status"], Path::new("."));
        let output = CommandOutput::success("clean").check(&spec, 1).unwrap();
        assert_eq!(output.output, "clean");
    }

    #[test]
    fn test_check_failure_carries_code() {
        let spec = CommandSpec::git(["fetch", "origin"], Path::new("."));
        let err = CommandOutput::failure(128, "fatal: no route")
            .check(&spec, 3)
            .unwrap_err();
        match err {
            Error::CommandFailed {
                command,
                code,
                attempts,
                output,
            } => {
                assert_eq!(command, "git fetch origin");
                assert_eq!(code, 128);
                assert_eq!(attempts, 3);
                assert_eq!(output, "fatal: no route");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_lines_skips_blank() {
        let output = CommandOutput::success("  a \n\n b\n");
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_system_runner_missing_program() {
        let spec = CommandSpec::new("release-tree-no-such-program", ["x"], Path::new("."));
        let err = SystemCommandRunner.run(&spec).unwrap_err();
        assert!(err.to_string().contains("could not start"));
    }
}
