//! # CLI Command Implementations
//!
//! Each subcommand of `release-tree` lives in its own file with:
//! - an `Args` struct derived with `clap`;
//! - an `execute` function that calls into the `release_tree` library.
//!
//! Options shared by several commands are defined here: `TreeArgs` locates
//! the tree and tunes how it is processed, `ReleaseArgs` carries the release
//! parameters. `Context` wires the library seams from them.

pub mod clone;
pub mod maintenance;
pub mod perform;
pub mod prepare;
pub mod summary;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::Args;

use release_tree::command::{CommandRunner, SystemCommandRunner};
use release_tree::config::ReleaseTreeConfig;
use release_tree::defaults;
use release_tree::discovery::{ModuleDiscovery, PomDiscovery};
use release_tree::orchestrator::{LoggingRewriter, ReleaseOrchestrator};
use release_tree::output::{render_report, OutputConfig};
use release_tree::path_scope::PathShorteningScope;
use release_tree::release_info::{
    Maintenance, OtherVersions, ReleaseInfo, VersionChoice, AUTO,
};
use release_tree::remote::{Remote, RemoteRef};
use release_tree::repository::{
    DefaultGitOperations, DefaultLegacyOperations, GitOperations, LegacyOperations,
    RepositorySet, ResolutionReport,
};
use release_tree::retry::{CancellationFlag, RetryRunner, ThreadSleeper};
use release_tree::version::IncrementPolicy;

/// Where the tree is and how to process it
#[derive(Args, Debug, Clone, Default)]
pub struct TreeArgs {
    /// Root repository directory (defaults to current directory)
    #[arg(long, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Git alias of the remote URL (default: configured alias, else 'origin')
    #[arg(short = 'r', long = "remote", value_name = "ALIAS")]
    pub remote: Option<String>,

    /// Path to config file
    #[arg(long, value_name = "PATH", env = "RELEASE_TREE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of repositories processed concurrently
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Write the per-repository resolution report as JSON
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

/// Release parameters
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArgs {
    /// Branch to release ('auto' = the current branch)
    #[arg(short = 'b', long, default_value = AUTO)]
    pub branch: String,

    /// Released version, the SCM tag being 'release-<TAG>' ('auto' = current
    /// version minus '-SNAPSHOT' for a final release, else date-based)
    #[arg(short = 't', long, default_value = AUTO)]
    pub tag: String,

    /// Version post-release ('auto' = current one increased for a final
    /// release, else unchanged)
    #[arg(short = 'n', long = "next", default_value = AUTO)]
    pub next_snapshot: String,

    /// Maintenance version; the maintenance branch is deleted after release
    /// unless one is given
    #[arg(short = 'm', long, default_value = AUTO)]
    pub maintenance: String,

    /// Final release
    #[arg(short = 'f', long = "final")]
    pub is_final: bool,

    /// Increment policy for the next snapshot of a final release
    /// (auto_last, auto_patch, auto_minor, auto_major)
    #[arg(long, default_value = "auto_last")]
    pub policy: IncrementPolicy,

    /// Skip tests execution
    #[arg(long = "skip-tests", alias = "skipTests")]
    pub skip_tests: bool,

    /// Skip integration tests execution
    #[arg(long = "skip-its", alias = "skipITs")]
    pub skip_its: bool,

    /// Comma-separated additional build profiles
    #[arg(short = 'p', long, default_value = "")]
    pub profiles: String,

    /// Other versions to replace: '[files:props:]old/new[/next],...'
    #[arg(long = "arv", alias = "also-replace-version", value_name = "VERSIONS")]
    pub other_versions: Option<String>,

    /// Message put in front of commit messages
    #[arg(long = "mc", alias = "msg-commit", default_value = "")]
    pub msg_commit: String,

    /// Message put in front of tag messages (default: the commit one)
    #[arg(long = "mt", alias = "msg-tag", default_value = "")]
    pub msg_tag: String,

    /// Dry run: nothing is pushed
    #[arg(long = "dryrun", alias = "dry-run")]
    pub dry_run: bool,
}

impl Default for ReleaseArgs {
    fn default() -> Self {
        Self {
            branch: AUTO.to_string(),
            tag: AUTO.to_string(),
            next_snapshot: AUTO.to_string(),
            maintenance: AUTO.to_string(),
            is_final: false,
            policy: IncrementPolicy::default(),
            skip_tests: false,
            skip_its: false,
            profiles: String::new(),
            other_versions: None,
            msg_commit: String::new(),
            msg_tag: String::new(),
            dry_run: false,
        }
    }
}

impl ReleaseArgs {
    /// Whether any release parameter differs from its default. The dry-run
    /// switch does not count.
    pub fn overrides_defaults(&self) -> bool {
        Self {
            dry_run: false,
            ..self.clone()
        } != Self::default()
    }

    /// Builds the release parameters for `branch`.
    pub fn to_info(&self, remote_alias: &str, branch: &str) -> Result<ReleaseInfo> {
        let mut info = ReleaseInfo::new(remote_alias, branch);
        info.tag = VersionChoice::parse(&self.tag);
        info.next_snapshot = VersionChoice::parse(&self.next_snapshot);
        info.maintenance = Maintenance::parse(&self.maintenance);
        info.is_final = self.is_final;
        info.auto_increment_policy = self.policy;
        info.skip_tests = self.skip_tests;
        info.skip_its = self.skip_its;
        info.profiles = self.profiles.clone();
        if let Some(other) = &self.other_versions {
            info.other_versions = OtherVersions::parse(other)?;
        }
        info.msg_commit = self.msg_commit.clone();
        info.msg_tag = self.msg_tag.clone();
        info.dry_run = self.dry_run;
        Ok(info)
    }
}

/// Library seams wired for one command run.
pub struct Context {
    root: PathBuf,
    config: ReleaseTreeConfig,
    output: OutputConfig,
    cancel: CancellationFlag,
    git: Arc<dyn GitOperations>,
    legacy: Arc<dyn LegacyOperations>,
    discovery: Arc<dyn ModuleDiscovery>,
    scope: PathShorteningScope,
    remote_alias: String,
    jobs: usize,
    report: Option<PathBuf>,
}

impl Context {
    pub fn new(tree: &TreeArgs, output: &OutputConfig) -> Result<Self> {
        let given = tree.root.clone().unwrap_or_else(defaults::default_root);
        let root = defaults::absolute_root(&given)
            .with_context(|| format!("Failed to resolve root directory {}", given.display()))?;
        let config = ReleaseTreeConfig::load(&root, tree.config.as_deref())?;
        let cancel = CancellationFlag::new();
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        let retry = RetryRunner::new(
            runner.clone(),
            Arc::new(ThreadSleeper),
            config.retry,
            cancel.clone(),
        );
        let scope = PathShorteningScope::acquire(&root, runner)?;
        Ok(Self {
            remote_alias: config.remote_alias(tree.remote.as_deref()),
            jobs: config.jobs(tree.jobs),
            report: tree.report.clone(),
            root,
            config,
            output: output.clone(),
            cancel,
            git: Arc::new(DefaultGitOperations::new(retry.clone())),
            legacy: Arc::new(DefaultLegacyOperations::new(retry)),
            discovery: Arc::new(PomDiscovery),
            scope,
        })
    }

    /// Root as given; the release log lives next to it.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root as worked in, possibly through a shortened path.
    pub fn work_root(&self) -> &Path {
        self.scope.path()
    }

    pub fn remote_alias(&self) -> &str {
        &self.remote_alias
    }

    pub fn git(&self) -> &dyn GitOperations {
        self.git.as_ref()
    }

    pub fn discovery(&self) -> &dyn ModuleDiscovery {
        self.discovery.as_ref()
    }

    /// Root descriptor in the working root.
    pub fn descriptor(&self) -> PathBuf {
        self.work_root().join(self.config.layout().descriptor)
    }

    /// Resolves `alias` against the root's remotes, or against `url` when the
    /// root is not cloned yet.
    pub fn remote(&self, alias: &str, url: Option<&str>) -> Result<RemoteRef> {
        let remotes = match url {
            Some(url) => vec![Remote::new(alias, url)],
            None => self.git.remotes(self.work_root())?,
        };
        Ok(RemoteRef::resolve(alias, &remotes)?
            .with_legacy_base(self.config.legacy_base_url.clone()))
    }

    /// `branch`, or the root's current branch for `auto`.
    pub fn branch(&self, branch: &str) -> Result<String> {
        if branch != AUTO {
            return Ok(branch.to_string());
        }
        match self.git.current_branch(self.work_root())? {
            Some(current) => Ok(current),
            None => bail!(
                "Couldn't guess branch name from {}, use -b",
                self.root.display()
            ),
        }
    }

    pub fn repository_set(&self, remote: RemoteRef) -> RepositorySet {
        RepositorySet::new(
            self.work_root(),
            remote,
            self.git.clone(),
            self.legacy.clone(),
            self.discovery.clone(),
        )
        .with_resolution(self.config.default_branch.clone(), self.config.integration)
        .with_layout(self.config.layout())
        .with_jobs(self.jobs)
        .with_cancellation(self.cancel.clone())
    }

    pub fn orchestrator(&self, remote: RemoteRef) -> ReleaseOrchestrator {
        ReleaseOrchestrator::new(self.repository_set(remote), Arc::new(LoggingRewriter))
            .with_log_root(&self.root)
    }

    /// Prints the report and writes it as JSON when asked to.
    pub fn emit_report(&self, report: &ResolutionReport) -> Result<()> {
        println!("{}", render_report(&self.output, report));
        if let Some(path) = &self.report {
            std::fs::write(path, report.to_json()?)?;
            log::info!("Resolution report written to {}", path.display());
        }
        Ok(())
    }
}
