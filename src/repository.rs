//! # Repository Set Management
//!
//! This module provides the `RepositorySet`, the run-wide view of a release
//! tree: the root repository, the modules listed in its descriptor and the
//! addons listed in the addons descriptor, each living in its own working
//! directory.
//!
//! ## Design
//!
//! VCS access goes through two traits so the whole pass can run against an
//! in-memory double in tests:
//!
//! - **`GitOperations`**: everything the orchestrator does to a git working
//!   copy (clone, fetch, ref listing, checkout, tag, push).
//! - **`LegacyOperations`**: the reduced surface needed for addons still on
//!   Mercurial (clone, pull, update to a label).
//!
//! `DefaultGitOperations` and `DefaultLegacyOperations` wrap the system
//! `git`/`hg` binaries through a shared `RetryRunner`.
//!
//! ## Ordering and concurrency
//!
//! The root is always processed first since its descriptor names the
//! modules. Modules are then processed, then addons. With `jobs > 1` the
//! repositories of one stage are processed on a bounded rayon pool; each
//! worker only touches its own working directory. The first failure raises
//! the run's `CancellationFlag` so that pending work and retry waits stop
//! early, and surfaces as `Error::PartialRunAbort` listing the repositories
//! that had already reached their target.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::discovery::ModuleDiscovery;
use crate::error::{Error, Result};
use crate::remote::{Remote, RemoteRef};
use crate::resolver::{BranchResolver, IntegrationMode, Resolution};
use crate::retry::{CancellationFlag, RetryRunner};
use crate::{git, hg};

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Whether a working copy exists at `repo`. `.git` is a file in linked
    /// worktrees.
    fn exists(&self, repo: &Path) -> bool {
        repo.join(".git").exists()
    }

    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()>;

    fn fetch(&self, repo: &Path, alias: &str) -> Result<()>;

    fn remotes(&self, repo: &Path) -> Result<Vec<Remote>>;

    /// Tag names published on `alias`.
    fn remote_tags(&self, repo: &Path, alias: &str) -> Result<Vec<String>>;

    /// Branch names published on `alias`, without the alias prefix.
    fn remote_branches(&self, repo: &Path, alias: &str) -> Result<Vec<String>>;

    fn local_branches(&self, repo: &Path) -> Result<Vec<String>>;

    /// The branch `alias/HEAD` points to, if the remote advertises one.
    fn default_branch(&self, repo: &Path, alias: &str) -> Result<Option<String>>;

    /// The checked-out branch; `None` on a detached HEAD.
    fn current_branch(&self, repo: &Path) -> Result<Option<String>>;

    /// Tag HEAD is exactly on, if any.
    fn head_tag(&self, repo: &Path) -> Result<Option<String>>;

    fn checkout_tag(&self, repo: &Path, tag: &str) -> Result<()>;

    fn create_tracking_branch(&self, repo: &Path, alias: &str, branch: &str) -> Result<()>;

    /// Checks out `refname`; `force` discards local modifications.
    fn checkout(&self, repo: &Path, refname: &str, force: bool) -> Result<()>;

    /// Brings the current local branch up to date with `alias/branch`.
    fn integrate(
        &self,
        repo: &Path,
        alias: &str,
        branch: &str,
        mode: IntegrationMode,
    ) -> Result<()>;

    fn create_branch(&self, repo: &Path, branch: &str) -> Result<()>;

    fn delete_branch(&self, repo: &Path, branch: &str) -> Result<()>;

    /// Commits tracked modifications; `false` when there was nothing to commit.
    fn commit_all(&self, repo: &Path, message: &str) -> Result<bool>;

    fn create_tag(&self, repo: &Path, name: &str, message: &str) -> Result<()>;

    fn push(&self, repo: &Path, alias: &str, refname: &str, dry_run: bool) -> Result<()>;
}

/// Trait for legacy (Mercurial) operations - allows mocking in tests
pub trait LegacyOperations: Send + Sync {
    fn exists(&self, repo: &Path) -> bool {
        repo.join(".hg").is_dir()
    }

    /// Whether the working copy at `repo` is a legacy repository.
    fn is_legacy(&self, repo: &Path) -> bool {
        self.exists(repo)
    }

    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()>;

    fn pull(&self, repo: &Path) -> Result<()>;

    /// Updates to `label`; `false` when the label is unknown.
    fn update(&self, repo: &Path, label: &str) -> Result<bool>;
}

/// Default implementation using the system `git`
pub struct DefaultGitOperations {
    retry: RetryRunner,
}

impl DefaultGitOperations {
    pub fn new(retry: RetryRunner) -> Self {
        Self { retry }
    }
}

impl GitOperations for DefaultGitOperations {
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
        git::clone(&self.retry, url, target_dir)
    }

    fn fetch(&self, repo: &Path, alias: &str) -> Result<()> {
        git::fetch(&self.retry, repo, alias)
    }

    fn remotes(&self, repo: &Path) -> Result<Vec<Remote>> {
        git::remotes(&self.retry, repo)
    }

    fn remote_tags(&self, repo: &Path, alias: &str) -> Result<Vec<String>> {
        git::remote_tags(&self.retry, repo, alias)
    }

    fn remote_branches(&self, repo: &Path, alias: &str) -> Result<Vec<String>> {
        git::remote_branches(&self.retry, repo, alias)
    }

    fn local_branches(&self, repo: &Path) -> Result<Vec<String>> {
        git::local_branches(&self.retry, repo)
    }

    fn default_branch(&self, repo: &Path, alias: &str) -> Result<Option<String>> {
        git::default_branch(&self.retry, repo, alias)
    }

    fn current_branch(&self, repo: &Path) -> Result<Option<String>> {
        git::current_branch(&self.retry, repo)
    }

    fn head_tag(&self, repo: &Path) -> Result<Option<String>> {
        git::head_tag(&self.retry, repo)
    }

    fn checkout_tag(&self, repo: &Path, tag: &str) -> Result<()> {
        git::checkout_tag(&self.retry, repo, tag)
    }

    fn create_tracking_branch(&self, repo: &Path, alias: &str, branch: &str) -> Result<()> {
        git::create_tracking_branch(&self.retry, repo, alias, branch)
    }

    fn checkout(&self, repo: &Path, refname: &str, force: bool) -> Result<()> {
        if force {
            git::checkout_force(&self.retry, repo, refname)
        } else {
            git::checkout(&self.retry, repo, refname)
        }
    }

    fn integrate(
        &self,
        repo: &Path,
        alias: &str,
        branch: &str,
        mode: IntegrationMode,
    ) -> Result<()> {
        match mode {
            IntegrationMode::Rebase => git::rebase(&self.retry, repo, alias, branch),
            IntegrationMode::Pull => git::pull(&self.retry, repo, alias, branch),
        }
    }

    fn create_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        git::create_branch(&self.retry, repo, branch)
    }

    fn delete_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        git::delete_branch(&self.retry, repo, branch)
    }

    fn commit_all(&self, repo: &Path, message: &str) -> Result<bool> {
        git::commit_all(&self.retry, repo, message)
    }

    fn create_tag(&self, repo: &Path, name: &str, message: &str) -> Result<()> {
        git::create_tag(&self.retry, repo, name, message)
    }

    fn push(&self, repo: &Path, alias: &str, refname: &str, dry_run: bool) -> Result<()> {
        git::push(&self.retry, repo, alias, refname, dry_run)
    }
}

/// Default implementation using the system `hg`
pub struct DefaultLegacyOperations {
    retry: RetryRunner,
}

impl DefaultLegacyOperations {
    pub fn new(retry: RetryRunner) -> Self {
        Self { retry }
    }
}

impl LegacyOperations for DefaultLegacyOperations {
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
        hg::clone(&self.retry, url, target_dir)
    }

    fn pull(&self, repo: &Path) -> Result<()> {
        hg::pull(&self.retry, repo)
    }

    fn update(&self, repo: &Path, label: &str) -> Result<bool> {
        hg::update(&self.retry, repo, label)
    }
}

/// Role of a repository within the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    Root,
    Module,
    Addon,
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepositoryKind::Root => "root",
            RepositoryKind::Module => "module",
            RepositoryKind::Addon => "addon",
        })
    }
}

/// One repository to bring onto the release label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTarget {
    pub name: String,
    pub kind: RepositoryKind,
    pub label: String,
    pub path: PathBuf,
    /// Hosted on the legacy VCS
    pub legacy: bool,
}

/// Where descriptors and addons live inside the root working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLayout {
    /// Descriptor file name, relative to a repository root
    pub descriptor: String,
    /// Addons directory, relative to the root repository
    pub addons_dir: String,
    /// Addons known to be on the legacy VCS even before their first clone
    pub legacy_addons: Vec<String>,
}

impl Default for TreeLayout {
    fn default() -> Self {
        Self {
            descriptor: "pom.xml".to_string(),
            addons_dir: "addons".to_string(),
            legacy_addons: Vec::new(),
        }
    }
}

/// Outcome of one repository in a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryReport {
    pub name: String,
    pub kind: RepositoryKind,
    pub path: PathBuf,
    pub requested: String,
    pub resolution: Resolution,
    pub legacy: bool,
}

impl RepositoryReport {
    /// The repository as it now stands, labelled with the ref it ended up on.
    pub fn target(&self) -> ModuleTarget {
        ModuleTarget {
            name: self.name.clone(),
            kind: self.kind,
            label: self.resolution.effective_label().to_string(),
            path: self.path.clone(),
            legacy: self.legacy,
        }
    }
}

/// Outcome of a whole `clone_or_update_all` pass, in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub label: String,
    pub repositories: Vec<RepositoryReport>,
}

impl ResolutionReport {
    pub fn get(&self, name: &str) -> Option<&RepositoryReport> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Repositories that did not have the requested label.
    pub fn fallbacks(&self) -> impl Iterator<Item = &RepositoryReport> {
        self.repositories
            .iter()
            .filter(|r| r.resolution.is_fallback())
    }

    /// Every repository as it now stands, in processing order.
    pub fn targets(&self) -> Vec<ModuleTarget> {
        self.repositories.iter().map(RepositoryReport::target).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The root repository plus every module and addon it names.
pub struct RepositorySet {
    root: PathBuf,
    root_name: String,
    remote: RemoteRef,
    git: Arc<dyn GitOperations>,
    legacy: Arc<dyn LegacyOperations>,
    discovery: Arc<dyn ModuleDiscovery>,
    resolver: BranchResolver,
    layout: TreeLayout,
    jobs: usize,
    cancel: CancellationFlag,
}

impl RepositorySet {
    /// Creates a sequential set rooted at `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        remote: RemoteRef,
        git: Arc<dyn GitOperations>,
        legacy: Arc<dyn LegacyOperations>,
        discovery: Arc<dyn ModuleDiscovery>,
    ) -> Self {
        let root = root.into();
        let root_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        let resolver = BranchResolver::new(remote.alias(), None, IntegrationMode::default());
        Self {
            root,
            root_name,
            remote,
            git,
            legacy,
            discovery,
            resolver,
            layout: TreeLayout::default(),
            jobs: 1,
            cancel: CancellationFlag::new(),
        }
    }

    /// Overrides the default branch and how existing branches are updated.
    pub fn with_resolution(
        mut self,
        default_branch: Option<String>,
        integration: IntegrationMode,
    ) -> Self {
        self.resolver = BranchResolver::new(self.remote.alias(), default_branch, integration);
        self
    }

    pub fn with_layout(mut self, layout: TreeLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Number of repositories processed concurrently within a stage.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Shares the run's cancellation flag, normally the one given to the
    /// `RetryRunner` behind the operations.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn remote(&self) -> &RemoteRef {
        &self.remote
    }

    pub fn git(&self) -> &dyn GitOperations {
        self.git.as_ref()
    }

    pub fn discovery(&self) -> &dyn ModuleDiscovery {
        self.discovery.as_ref()
    }

    /// Descriptor of the root repository.
    pub fn root_descriptor(&self) -> PathBuf {
        self.root.join(&self.layout.descriptor)
    }

    fn addons_descriptor(&self) -> PathBuf {
        self.root
            .join(&self.layout.addons_dir)
            .join(&self.layout.descriptor)
    }

    pub fn root_target(&self, label: &str) -> ModuleTarget {
        ModuleTarget {
            name: self.root_name.clone(),
            kind: RepositoryKind::Root,
            label: label.to_string(),
            path: self.root.clone(),
            legacy: false,
        }
    }

    /// Modules listed in the root descriptor, in declaration order.
    ///
    /// Reads the descriptor of the root working copy as currently checked out.
    pub fn module_targets(&self, label: &str) -> Result<Vec<ModuleTarget>> {
        let names = self.discovery.discover(&self.root_descriptor())?;
        Ok(names
            .into_iter()
            .map(|name| ModuleTarget {
                path: self.root.join(&name),
                name,
                kind: RepositoryKind::Module,
                label: label.to_string(),
                legacy: false,
            })
            .collect())
    }

    /// Addons listed in the addons descriptor; none if it does not exist.
    pub fn addon_targets(&self, label: &str) -> Result<Vec<ModuleTarget>> {
        let descriptor = self.addons_descriptor();
        if !self.discovery.has_descriptor(&descriptor) {
            return Ok(Vec::new());
        }
        let addons_dir = self.root.join(&self.layout.addons_dir);
        let names = self.discovery.discover(&descriptor)?;
        Ok(names
            .into_iter()
            .map(|name| {
                let path = addons_dir.join(&name);
                let legacy =
                    self.layout.legacy_addons.contains(&name) || self.legacy.is_legacy(&path);
                ModuleTarget {
                    name,
                    kind: RepositoryKind::Addon,
                    label: label.to_string(),
                    path,
                    legacy,
                }
            })
            .collect())
    }

    /// Root, modules and addons, as currently described on disk.
    pub fn all_targets(&self, label: &str) -> Result<Vec<ModuleTarget>> {
        let mut targets = vec![self.root_target(label)];
        targets.extend(self.module_targets(label)?);
        targets.extend(self.addon_targets(label)?);
        Ok(targets)
    }

    /// Clones or updates every repository and checks out `label` in each.
    ///
    /// Repositories lacking `label` fall back to their default branch with a
    /// warning; this is reported, not an error.
    pub fn clone_or_update_all(&self, label: &str) -> Result<ResolutionReport> {
        let root = self.update_root(label)?;
        self.update_children(label, root)
    }

    /// First step of a pass: the root alone, since it names everything else.
    pub fn update_root(&self, label: &str) -> Result<RepositoryReport> {
        let mut succeeded = Vec::new();
        let mut reports =
            self.for_each(&[self.root_target(label)], &mut succeeded, |t| self.update(t))?;
        reports.pop().ok_or_else(|| Error::Cancelled {
            context: format!("{} was not processed", self.root_name),
        })
    }

    /// Rest of a pass, once `root` is on `label`: modules, then addons.
    pub fn update_children(&self, label: &str, root: RepositoryReport) -> Result<ResolutionReport> {
        let mut succeeded = vec![root.name.clone()];
        let mut repositories = vec![root];

        let modules = self
            .module_targets(label)
            .map_err(|e| abort(&self.root_name, &succeeded, e))?;
        repositories.extend(self.for_each(&modules, &mut succeeded, |t| self.update(t))?);

        let addons = self
            .addon_targets(label)
            .map_err(|e| abort(&self.root_name, &succeeded, e))?;
        repositories.extend(self.for_each(&addons, &mut succeeded, |t| self.update(t))?);

        let report = ResolutionReport {
            label: label.to_string(),
            repositories,
        };
        let fallbacks = report.fallbacks().count();
        if fallbacks > 0 {
            warn!(
                "{} of {} repositories are not on '{}'",
                fallbacks,
                report.repositories.len(),
                label
            );
        }
        Ok(report)
    }

    /// Brings one repository onto its label.
    pub fn update(&self, target: &ModuleTarget) -> Result<RepositoryReport> {
        let resolution = if target.legacy {
            self.update_legacy(target)?
        } else {
            let url = match target.kind {
                RepositoryKind::Root => self.remote.base_url().to_string(),
                _ => self.remote.module_url(&target.name),
            };
            self.resolver.resolve(self.git.as_ref(), target, &url)?
        };
        info!("{}: {}", target.name, resolution);
        Ok(RepositoryReport {
            name: target.name.clone(),
            kind: target.kind,
            path: target.path.clone(),
            requested: target.label.clone(),
            resolution,
            legacy: target.legacy,
        })
    }

    fn update_legacy(&self, target: &ModuleTarget) -> Result<Resolution> {
        let path = target.path.as_path();
        if self.legacy.exists(path) {
            self.legacy.pull(path)?;
        } else {
            self.legacy
                .clone_repo(&self.remote.legacy_url(&target.name), path)?;
        }
        if self.legacy.update(path, &target.label)? {
            return Ok(Resolution::LegacyRevision {
                label: target.label.clone(),
            });
        }
        warn!(
            "{}: '{}' not found in legacy repository, falling back to '{}'",
            target.name,
            target.label,
            hg::DEFAULT_BRANCH
        );
        if !self.legacy.update(path, hg::DEFAULT_BRANCH)? {
            return Err(Error::BranchNotFound {
                repository: target.name.clone(),
                label: target.label.clone(),
                default_branch: hg::DEFAULT_BRANCH.to_string(),
            });
        }
        Ok(Resolution::Fallback {
            requested: target.label.clone(),
            default_branch: hg::DEFAULT_BRANCH.to_string(),
        })
    }

    /// Runs `op` on every target, honoring the configured concurrency.
    ///
    /// Names of targets that succeed are appended to `succeeded`. The first
    /// failure cancels the remaining work and is returned as
    /// `Error::PartialRunAbort`.
    pub fn for_each<T, F>(
        &self,
        targets: &[ModuleTarget],
        succeeded: &mut Vec<String>,
        op: F,
    ) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&ModuleTarget) -> Result<T> + Sync,
    {
        let results: Vec<Result<T>> = if self.jobs <= 1 || targets.len() <= 1 {
            let mut results = Vec::with_capacity(targets.len());
            for target in targets {
                let result = self.guarded(target, &op);
                let failed = result.is_err();
                results.push(result);
                if failed {
                    break;
                }
            }
            results
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()?;
            pool.install(|| {
                targets
                    .par_iter()
                    .map(|target| self.guarded(target, &op))
                    .collect()
            })
        };

        let mut outputs = Vec::with_capacity(results.len());
        let mut first_error: Option<(String, Error)> = None;
        let mut first_cancelled: Option<(String, Error)> = None;
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(value) => {
                    succeeded.push(target.name.clone());
                    outputs.push(value);
                }
                Err(e @ Error::Cancelled { .. }) => {
                    if first_cancelled.is_none() {
                        first_cancelled = Some((target.name.clone(), e));
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some((target.name.clone(), e));
                    }
                }
            }
        }

        match first_error.or(first_cancelled) {
            Some((failed, source)) => Err(abort(&failed, succeeded, source)),
            None => Ok(outputs),
        }
    }

    fn guarded<T, F>(&self, target: &ModuleTarget, op: &F) -> Result<T>
    where
        F: Fn(&ModuleTarget) -> Result<T>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                context: format!("{} skipped after an earlier failure", target.name),
            });
        }
        let result = op(target);
        if result.is_err() {
            self.cancel.cancel();
        }
        result
    }
}

fn abort(failed: &str, succeeded: &[String], source: Error) -> Error {
    match source {
        // Already carries the progress of an inner pass.
        Error::PartialRunAbort { .. } => source,
        source => Error::PartialRunAbort {
            failed: failed.to_string(),
            succeeded: succeeded.to_vec(),
            source: Box::new(source),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGitOperations, MockLegacyOperations, StaticDiscovery};

    const ROOT_URL: &str = "https://host/org/root.git";

    fn remote() -> RemoteRef {
        RemoteRef::resolve("origin", &[Remote::new("origin", ROOT_URL)]).unwrap()
    }

    fn discovery() -> StaticDiscovery {
        StaticDiscovery::new("5.6-SNAPSHOT")
            .with_modules("/work/root/pom.xml", &["mod-a", "mod-b"])
    }

    fn set(git: &Arc<MockGitOperations>, discovery: StaticDiscovery) -> RepositorySet {
        RepositorySet::new(
            "/work/root",
            remote(),
            git.clone(),
            Arc::new(MockLegacyOperations::new()),
            Arc::new(discovery),
        )
    }

    fn tree(git: &MockGitOperations) {
        git.add_remote_repository(ROOT_URL, &[], &["master", "8.10"]);
        git.add_remote_repository("https://host/org/mod-a.git", &[], &["master", "8.10"]);
        git.add_remote_repository("https://host/org/mod-b.git", &[], &["master"]);
    }

    #[test]
    fn test_clone_or_update_all_with_partial_fallback() {
        testing_logger::setup();
        let git = Arc::new(MockGitOperations::new());
        tree(&git);

        let report = set(&git, discovery()).clone_or_update_all("8.10").unwrap();

        let names: Vec<_> = report.repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["root", "mod-a", "mod-b"]);
        assert_eq!(
            report.get("mod-a").unwrap().resolution,
            Resolution::NewTrackingBranch {
                branch: "8.10".to_string()
            }
        );
        assert_eq!(
            report.get("mod-b").unwrap().resolution,
            Resolution::Fallback {
                requested: "8.10".to_string(),
                default_branch: "master".to_string(),
            }
        );
        assert_eq!(report.fallbacks().count(), 1);
        assert_eq!(
            git.current_ref(Path::new("/work/root/mod-b")).as_deref(),
            Some("master")
        );
        testing_logger::validate(|captured_logs| {
            assert!(captured_logs
                .iter()
                .any(|log| log.level == log::Level::Warn && log.body.contains("mod-b")));
        });
    }

    #[test]
    fn test_root_is_processed_before_modules() {
        let git = Arc::new(MockGitOperations::new());
        tree(&git);

        set(&git, discovery()).clone_or_update_all("8.10").unwrap();

        let clones: Vec<_> = git
            .operations()
            .into_iter()
            .filter(|op| op.starts_with("clone"))
            .collect();
        assert_eq!(
            clones,
            vec![
                "clone https://host/org/root.git /work/root",
                "clone https://host/org/mod-a.git /work/root/mod-a",
                "clone https://host/org/mod-b.git /work/root/mod-b",
            ]
        );
    }

    #[test]
    fn test_failure_reports_progress() {
        let git = Arc::new(MockGitOperations::new());
        tree(&git);
        git.fail_url("https://host/org/mod-b.git");

        let err = set(&git, discovery()).clone_or_update_all("8.10").unwrap_err();
        match err {
            Error::PartialRunAbort {
                failed,
                succeeded,
                source,
            } => {
                assert_eq!(failed, "mod-b");
                assert_eq!(succeeded, vec!["root", "mod-a"]);
                assert!(matches!(*source, Error::CommandFailed { .. }));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parallel_pass_matches_sequential() {
        let git = Arc::new(MockGitOperations::new());
        tree(&git);
        let discovery = StaticDiscovery::new("5.6-SNAPSHOT").with_modules(
            "/work/root/pom.xml",
            &["mod-a", "mod-b", "mod-c", "mod-d"],
        );
        git.add_remote_repository("https://host/org/mod-c.git", &["8.10"], &["master"]);
        git.add_remote_repository("https://host/org/mod-d.git", &[], &["master", "8.10"]);

        let report = set(&git, discovery)
            .with_jobs(3)
            .clone_or_update_all("8.10")
            .unwrap();

        let names: Vec<_> = report.repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["root", "mod-a", "mod-b", "mod-c", "mod-d"]);
        assert_eq!(
            report.get("mod-c").unwrap().resolution,
            Resolution::Tag {
                tag: "8.10".to_string()
            }
        );
    }

    #[test]
    fn test_parallel_failure_cancels_and_aborts() {
        let git = Arc::new(MockGitOperations::new());
        tree(&git);
        git.fail_url("https://host/org/mod-a.git");
        let cancel = CancellationFlag::new();

        let err = set(&git, discovery())
            .with_jobs(4)
            .with_cancellation(cancel.clone())
            .clone_or_update_all("8.10")
            .unwrap_err();

        assert!(cancel.is_cancelled());
        match err {
            Error::PartialRunAbort { failed, source, .. } => {
                assert_eq!(failed, "mod-a");
                assert!(matches!(*source, Error::CommandFailed { .. }));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_addons_are_discovered_after_modules() {
        let git = Arc::new(MockGitOperations::new());
        tree(&git);
        git.add_remote_repository("https://host/org/addon-x.git", &[], &["master", "8.10"]);
        let discovery =
            discovery().with_modules("/work/root/addons/pom.xml", &["addon-x", "addon-hg"]);
        let legacy = Arc::new(MockLegacyOperations::new());
        legacy.add_repository("https://hg.host/addon-hg", &["default"]);
        let set = RepositorySet::new(
            "/work/root",
            remote().with_legacy_base(Some("https://hg.host".to_string())),
            git.clone(),
            legacy.clone(),
            Arc::new(discovery),
        )
        .with_layout(TreeLayout {
            legacy_addons: vec!["addon-hg".to_string()],
            ..TreeLayout::default()
        });

        let report = set.clone_or_update_all("8.10").unwrap();

        let addon = report.get("addon-x").unwrap();
        assert_eq!(addon.kind, RepositoryKind::Addon);
        assert_eq!(addon.path, PathBuf::from("/work/root/addons/addon-x"));
        assert_eq!(
            report.get("addon-hg").unwrap().resolution,
            Resolution::Fallback {
                requested: "8.10".to_string(),
                default_branch: "default".to_string(),
            }
        );
        assert_eq!(
            legacy.operations(),
            vec![
                "clone https://hg.host/addon-hg /work/root/addons/addon-hg",
                "update /work/root/addons/addon-hg 8.10",
                "update /work/root/addons/addon-hg default",
            ]
        );
    }

    #[test]
    fn test_report_serializes_to_json() {
        let git = Arc::new(MockGitOperations::new());
        tree(&git);

        let report = set(&git, discovery()).clone_or_update_all("8.10").unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["label"], "8.10");
        assert_eq!(json["repositories"][2]["name"], "mod-b");
        assert_eq!(json["repositories"][2]["resolution"]["kind"], "fallback");
        assert_eq!(
            json["repositories"][2]["resolution"]["default_branch"],
            "master"
        );
    }
}
