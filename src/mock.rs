//! In-memory doubles for the VCS and descriptor seams.
//!
//! `MockGitOperations` simulates a set of hosted repositories and the local
//! clones made from them, and records every mutating call so tests can
//! assert on the sequence of operations. Nothing touches the filesystem.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::discovery::ModuleDiscovery;
use crate::error::{Error, Result};
use crate::remote::Remote;
use crate::repository::{GitOperations, LegacyOperations};
use crate::resolver::IntegrationMode;

const ALIAS: &str = "origin";

#[derive(Debug, Clone, Default)]
struct HostedRepository {
    tags: Vec<String>,
    branches: Vec<String>,
    default_branch: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct LocalClone {
    url: String,
    local_branches: Vec<String>,
    tags: Vec<String>,
    current: Option<String>,
    clean: bool,
}

#[derive(Debug, Default)]
struct GitState {
    hosted: HashMap<String, HostedRepository>,
    clones: HashMap<PathBuf, LocalClone>,
    failing: HashSet<String>,
    operations: Vec<String>,
}

/// Mock git backend for testing without actual git operations
pub struct MockGitOperations {
    state: Mutex<GitState>,
}

impl MockGitOperations {
    /// Create a backend with no hosted repository
    pub fn new() -> Self {
        MockGitOperations {
            state: Mutex::new(GitState::default()),
        }
    }

    /// Host a repository at `url`. `master` is its default branch when present.
    pub fn add_remote_repository(&self, url: &str, tags: &[&str], branches: &[&str]) {
        let default_branch = branches
            .iter()
            .find(|b| **b == "master")
            .map(|b| b.to_string());
        self.lock().hosted.insert(
            url.to_string(),
            HostedRepository {
                tags: owned(tags),
                branches: owned(branches),
                default_branch,
            },
        );
    }

    pub fn set_default_branch(&self, url: &str, branch: Option<&str>) {
        if let Some(repo) = self.lock().hosted.get_mut(url) {
            repo.default_branch = branch.map(str::to_string);
        }
    }

    /// Pretend `path` is an existing clone of `url` with some local branches.
    pub fn add_local_clone(&self, path: impl Into<PathBuf>, url: &str, branches: &[&str]) {
        self.lock().clones.insert(
            path.into(),
            LocalClone {
                url: url.to_string(),
                local_branches: owned(branches),
                current: branches.first().map(|b| b.to_string()),
                ..LocalClone::default()
            },
        );
    }

    /// Make every network operation against `url` fail.
    pub fn fail_url(&self, url: &str) {
        self.lock().failing.insert(url.to_string());
    }

    /// Make the next commits in `path` find nothing to commit.
    pub fn mark_clean(&self, path: &Path) {
        if let Some(clone) = self.lock().clones.get_mut(path) {
            clone.clean = true;
        }
    }

    pub fn current_ref(&self, path: &Path) -> Option<String> {
        self.lock().clones.get(path).and_then(|c| c.current.clone())
    }

    pub fn local_tags(&self, path: &Path) -> Vec<String> {
        self.lock()
            .clones
            .get(path)
            .map(|c| c.tags.clone())
            .unwrap_or_default()
    }

    pub fn hosted_tags(&self, url: &str) -> Vec<String> {
        self.lock()
            .hosted
            .get(url)
            .map(|r| r.tags.clone())
            .unwrap_or_default()
    }

    pub fn hosted_branches(&self, url: &str) -> Vec<String> {
        self.lock()
            .hosted
            .get(url)
            .map(|r| r.branches.clone())
            .unwrap_or_default()
    }

    /// Recorded operations, in call order.
    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }

    fn lock(&self) -> MutexGuard<'_, GitState> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockGitOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl GitState {
    fn record(&mut self, operation: String) {
        self.operations.push(operation);
    }

    fn clone_at(&mut self, repo: &Path) -> Result<&mut LocalClone> {
        self.clones
            .get_mut(repo)
            .ok_or_else(|| failure(format!("git -C {} status", repo.display()), "not a git repository"))
    }

    /// The hosted repository behind the clone at `repo`, if reachable.
    fn upstream(&self, repo: &Path) -> Result<&HostedRepository> {
        let clone = self
            .clones
            .get(repo)
            .ok_or_else(|| failure(format!("git -C {} fetch", repo.display()), "not a git repository"))?;
        self.reachable(&clone.url)
    }

    fn reachable(&self, url: &str) -> Result<&HostedRepository> {
        if self.failing.contains(url) {
            return Err(failure(format!("git ls-remote {}", url), "unable to access"));
        }
        self.hosted
            .get(url)
            .ok_or_else(|| failure(format!("git ls-remote {}", url), "repository not found"))
    }
}

impl GitOperations for MockGitOperations {
    fn exists(&self, repo: &Path) -> bool {
        self.lock().clones.contains_key(repo)
    }

    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
        let mut state = self.lock();
        state.record(format!("clone {} {}", url, target_dir.display()));
        let hosted = state.reachable(url)?.clone();
        let local_branches: Vec<String> = hosted.default_branch.iter().cloned().collect();
        state.clones.insert(
            target_dir.to_path_buf(),
            LocalClone {
                url: url.to_string(),
                current: hosted.default_branch.clone(),
                local_branches,
                ..LocalClone::default()
            },
        );
        Ok(())
    }

    fn fetch(&self, repo: &Path, alias: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(format!("fetch {} {}", repo.display(), alias));
        state.upstream(repo)?;
        Ok(())
    }

    fn remotes(&self, repo: &Path) -> Result<Vec<Remote>> {
        let mut state = self.lock();
        let clone = state.clone_at(repo)?;
        Ok(vec![Remote::new(ALIAS, clone.url.clone())])
    }

    fn remote_tags(&self, repo: &Path, _alias: &str) -> Result<Vec<String>> {
        Ok(self.lock().upstream(repo)?.tags.clone())
    }

    fn remote_branches(&self, repo: &Path, _alias: &str) -> Result<Vec<String>> {
        Ok(self.lock().upstream(repo)?.branches.clone())
    }

    fn local_branches(&self, repo: &Path) -> Result<Vec<String>> {
        Ok(self.lock().clone_at(repo)?.local_branches.clone())
    }

    fn default_branch(&self, repo: &Path, _alias: &str) -> Result<Option<String>> {
        Ok(self.lock().upstream(repo)?.default_branch.clone())
    }

    fn current_branch(&self, repo: &Path) -> Result<Option<String>> {
        let mut state = self.lock();
        let clone = state.clone_at(repo)?;
        Ok(clone
            .current
            .clone()
            .filter(|current| clone.local_branches.contains(current)))
    }

    fn head_tag(&self, repo: &Path) -> Result<Option<String>> {
        let mut state = self.lock();
        let hosted_tags = state.upstream(repo).map(|h| h.tags.clone()).unwrap_or_default();
        let clone = state.clone_at(repo)?;
        Ok(clone
            .current
            .clone()
            .filter(|current| clone.tags.contains(current) || hosted_tags.contains(current)))
    }

    fn checkout_tag(&self, repo: &Path, tag: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(format!("checkout-tag {} {}", repo.display(), tag));
        let hosted = state.upstream(repo)?.tags.contains(&tag.to_string());
        let clone = state.clone_at(repo)?;
        if !hosted && !clone.tags.iter().any(|t| t == tag) {
            return Err(failure(format!("git checkout {}", tag), "unknown revision"));
        }
        clone.current = Some(tag.to_string());
        Ok(())
    }

    fn create_tracking_branch(&self, repo: &Path, alias: &str, branch: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(format!("track {} {}/{}", repo.display(), alias, branch));
        let hosted = state.upstream(repo)?.branches.contains(&branch.to_string());
        if !hosted {
            return Err(failure(
                format!("git checkout -b {} --track {}/{}", branch, alias, branch),
                "not a valid object name",
            ));
        }
        let clone = state.clone_at(repo)?;
        clone.local_branches.push(branch.to_string());
        clone.current = Some(branch.to_string());
        Ok(())
    }

    fn checkout(&self, repo: &Path, refname: &str, force: bool) -> Result<()> {
        let mut state = self.lock();
        let flag = if force { " -f" } else { "" };
        state.record(format!("checkout{} {} {}", flag, repo.display(), refname));
        let clone = state.clone_at(repo)?;
        let known = clone.local_branches.iter().any(|b| b == refname)
            || clone.tags.iter().any(|t| t == refname);
        if !known {
            return Err(failure(format!("git checkout {}", refname), "pathspec did not match"));
        }
        clone.current = Some(refname.to_string());
        Ok(())
    }

    fn integrate(
        &self,
        repo: &Path,
        alias: &str,
        branch: &str,
        mode: IntegrationMode,
    ) -> Result<()> {
        let mut state = self.lock();
        state.record(format!(
            "integrate {} {}/{} {}",
            repo.display(),
            alias,
            branch,
            mode
        ));
        state.upstream(repo)?;
        Ok(())
    }

    fn create_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(format!("branch {} {}", repo.display(), branch));
        let clone = state.clone_at(repo)?;
        if clone.local_branches.iter().any(|b| b == branch) {
            return Err(failure(format!("git checkout -b {}", branch), "already exists"));
        }
        clone.local_branches.push(branch.to_string());
        clone.current = Some(branch.to_string());
        Ok(())
    }

    fn delete_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(format!("delete-branch {} {}", repo.display(), branch));
        let clone = state.clone_at(repo)?;
        if clone.current.as_deref() == Some(branch) {
            return Err(failure(
                format!("git branch -D {}", branch),
                "cannot delete the branch checked out",
            ));
        }
        clone.local_branches.retain(|b| b != branch);
        Ok(())
    }

    fn commit_all(&self, repo: &Path, message: &str) -> Result<bool> {
        let mut state = self.lock();
        let clean = state.clone_at(repo)?.clean;
        if !clean {
            state.record(format!("commit {} {}", repo.display(), message));
        }
        Ok(!clean)
    }

    fn create_tag(&self, repo: &Path, name: &str, message: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(format!("tag {} {} {}", repo.display(), name, message));
        let clone = state.clone_at(repo)?;
        if clone.tags.iter().any(|t| t == name) {
            return Err(failure(format!("git tag -a {}", name), "already exists"));
        }
        clone.tags.push(name.to_string());
        Ok(())
    }

    fn push(&self, repo: &Path, alias: &str, refname: &str, dry_run: bool) -> Result<()> {
        let mut state = self.lock();
        let flag = if dry_run { " -n" } else { "" };
        state.record(format!("push{} {} {} {}", flag, repo.display(), alias, refname));
        let clone = state.clone_at(repo)?.clone();
        state.upstream(repo)?;
        if dry_run {
            return Ok(());
        }
        let is_tag = clone.tags.iter().any(|t| t == refname);
        let is_branch = clone.local_branches.iter().any(|b| b == refname);
        let Some(hosted) = state.hosted.get_mut(&clone.url) else {
            return Ok(());
        };
        if is_tag && !hosted.tags.iter().any(|t| t == refname) {
            hosted.tags.push(refname.to_string());
        } else if is_branch && !hosted.branches.iter().any(|b| b == refname) {
            hosted.branches.push(refname.to_string());
        } else if !is_tag && !is_branch {
            return Err(failure(
                format!("git push {} {}", alias, refname),
                "src refspec does not match any",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LegacyState {
    hosted: HashMap<String, Vec<String>>,
    clones: HashMap<PathBuf, String>,
    operations: Vec<String>,
}

/// Mock legacy backend: each hosted repository only knows a set of labels.
pub struct MockLegacyOperations {
    state: Mutex<LegacyState>,
}

impl MockLegacyOperations {
    pub fn new() -> Self {
        MockLegacyOperations {
            state: Mutex::new(LegacyState::default()),
        }
    }

    pub fn add_repository(&self, url: &str, labels: &[&str]) {
        self.lock().hosted.insert(url.to_string(), owned(labels));
    }

    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }

    fn lock(&self) -> MutexGuard<'_, LegacyState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockLegacyOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyOperations for MockLegacyOperations {
    fn exists(&self, repo: &Path) -> bool {
        self.lock().clones.contains_key(repo)
    }

    fn is_legacy(&self, repo: &Path) -> bool {
        self.exists(repo)
    }

    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
        let mut state = self.lock();
        state
            .operations
            .push(format!("clone {} {}", url, target_dir.display()));
        if !state.hosted.contains_key(url) {
            return Err(failure(format!("hg clone -U {}", url), "repository not found"));
        }
        state.clones.insert(target_dir.to_path_buf(), url.to_string());
        Ok(())
    }

    fn pull(&self, repo: &Path) -> Result<()> {
        self.lock()
            .operations
            .push(format!("pull {}", repo.display()));
        Ok(())
    }

    fn update(&self, repo: &Path, label: &str) -> Result<bool> {
        let mut state = self.lock();
        state
            .operations
            .push(format!("update {} {}", repo.display(), label));
        let known = state
            .clones
            .get(repo)
            .and_then(|url| state.hosted.get(url))
            .map(|labels| labels.iter().any(|l| l == label))
            .unwrap_or(false);
        Ok(known)
    }
}

/// Descriptor double: module lists and a version keyed by descriptor path.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    modules: HashMap<PathBuf, Vec<String>>,
    version: String,
}

impl StaticDiscovery {
    pub fn new(version: &str) -> Self {
        Self {
            modules: HashMap::new(),
            version: version.to_string(),
        }
    }

    pub fn with_modules(mut self, descriptor: impl Into<PathBuf>, modules: &[&str]) -> Self {
        self.modules.insert(descriptor.into(), owned(modules));
        self
    }
}

impl ModuleDiscovery for StaticDiscovery {
    fn has_descriptor(&self, descriptor: &Path) -> bool {
        self.modules.contains_key(descriptor)
    }

    fn discover(&self, descriptor: &Path) -> Result<Vec<String>> {
        self.modules
            .get(descriptor)
            .cloned()
            .ok_or_else(|| Error::Descriptor {
                path: descriptor.display().to_string(),
                message: "no such descriptor".to_string(),
            })
    }

    fn version(&self, _descriptor: &Path) -> Result<String> {
        Ok(self.version.clone())
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn failure(command: String, message: &str) -> Error {
    Error::CommandFailed {
        command,
        code: 128,
        attempts: 1,
        output: format!("fatal: {}", message),
    }
}
