//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use release_tree::output::OutputConfig;

use crate::commands;

/// Release Tree - Release a root repository together with its module and
/// addon repositories, then set the next snapshot version
#[derive(Parser, Debug)]
#[command(name = "release-tree")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prepare the release: update the tree, store the parameters in the
    /// release log, then version, commit and tag every repository
    Prepare(commands::prepare::PrepareArgs),

    /// Perform the release: push branches and tags. Parameters are read from
    /// the release log when none is given
    Perform(commands::perform::PerformArgs),

    /// Create a maintenance branch from an existing release tag
    Maintenance(commands::maintenance::MaintenanceArgs),

    /// Clone or update the whole tree on a branch or tag
    Clone(commands::clone::CloneArgs),

    /// Show the release that would be prepared, without changing anything
    Summary(commands::summary::SummaryArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Prepare(args) => commands::prepare::execute(args, &output),
            Commands::Perform(args) => commands::perform::execute(args, &output),
            Commands::Maintenance(args) => commands::maintenance::execute(args, &output),
            Commands::Clone(args) => commands::clone::execute(args, &output),
            Commands::Summary(args) => commands::summary::execute(args, &output),
        }
    }
}

/// `RUST_LOG` wins over `--log-level`. Log lines go to stderr.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A logger may already be installed when running under a test harness.
    let _ = env_logger::Builder::from_env(env)
        .format_target(false)
        .format_timestamp(None)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_prepare_flags() {
        let cli = Cli::try_parse_from([
            "release-tree",
            "prepare",
            "-r",
            "upstream",
            "-f",
            "-b",
            "8.10",
            "-m",
            "8.10.1-SNAPSHOT",
            "--arv",
            "1.0-SNAPSHOT/1.0",
            "--mc",
            "NXP-1",
            "--dryrun",
        ])
        .unwrap();
        match cli.command {
            Commands::Prepare(args) => {
                assert_eq!(args.tree.remote.as_deref(), Some("upstream"));
                assert!(args.release.is_final);
                assert_eq!(args.release.branch, "8.10");
                assert_eq!(args.release.maintenance, "8.10.1-SNAPSHOT");
                assert_eq!(args.release.msg_commit, "NXP-1");
                assert!(args.release.dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_policy() {
        let cli =
            Cli::try_parse_from(["release-tree", "summary", "--policy", "auto_minor"]).unwrap();
        match cli.command {
            Commands::Summary(args) => {
                assert_eq!(
                    args.release.policy,
                    release_tree::version::IncrementPolicy::AutoMinor
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(Cli::try_parse_from(["release-tree", "summary", "--policy", "auto_any"]).is_err());
    }
}
