//! # Release Orchestration
//!
//! `ReleaseOrchestrator` ties the pieces together for the three release
//! operations:
//!
//! - **prepare**: bring the root onto the release branch, read its version,
//!   freeze tag / next snapshot / maintenance branch, log the summary and
//!   persist the release log, then bring every other repository onto the
//!   branch. `tag_release` then creates the maintenance branch, commits the
//!   released versions, tags `release-<tag>` and moves the release branch to
//!   the next snapshot.
//! - **perform**: update the tree and push branches and tags.
//! - **maintenance**: from an existing `release-<tag>`, create a maintenance
//!   branch moved to a maintenance snapshot.
//!
//! Everything up to and including the summary is read-only apart from the
//! root checkout, so an operator can abort there. Re-running with the same
//! inputs resolves the same release: final releases carry no timestamp and
//! the release log stores resolved values.
//!
//! Rewriting versions inside project files is delegated to a
//! `VersionRewriter`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use log::info;

use crate::error::{Error, Result};
use crate::release_info::{
    compose_message, other_versions_lines, summary_line, Maintenance, OtherVersions,
    ReleaseInfo, ResolvedRelease, TAG_PREFIX,
};
use crate::release_log::ReleaseLog;
use crate::repository::{ModuleTarget, RepositorySet, ResolutionReport};
use crate::resolver::Resolution;
use crate::version::VersionIdentifier;

/// Replaces version strings inside a working copy.
pub trait VersionRewriter: Send + Sync {
    /// Replaces `old` by `new` in the files of `repo` selected by `patterns`.
    /// Returns whether anything changed.
    fn rewrite(&self, repo: &Path, old: &str, new: &str, patterns: &OtherVersions)
        -> Result<bool>;
}

/// Reports the replacements it would make and changes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRewriter;

impl VersionRewriter for LoggingRewriter {
    fn rewrite(
        &self,
        repo: &Path,
        old: &str,
        new: &str,
        patterns: &OtherVersions,
    ) -> Result<bool> {
        if old == new {
            return Ok(false);
        }
        info!(
            "{}: replace {} with {} in files matching '{}' and properties matching '{}'",
            repo.display(),
            old,
            new,
            patterns.files_regex()?.as_str(),
            patterns.props_regex()?.as_str()
        );
        Ok(false)
    }
}

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Outcome of `prepare_release`.
#[derive(Debug, Clone)]
pub struct PreparedRelease {
    pub release: ResolvedRelease,
    pub report: ResolutionReport,
    pub log_path: PathBuf,
}

/// What the operator asks of `maintenance`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaintenanceRequest {
    /// Released version, without the `release-` prefix
    pub tag: String,
    /// Defaults to the tag
    pub branch: Option<String>,
    /// Defaults to `<tag>.1-SNAPSHOT`
    pub version: Option<String>,
    pub other_versions: OtherVersions,
    pub msg_commit: String,
}

/// A maintenance branch as created by `maintenance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceRelease {
    pub tag: String,
    /// Version found at the tag
    pub snapshot: String,
    pub branch: String,
    pub version: String,
    pub other_versions: OtherVersions,
}

impl MaintenanceRelease {
    pub fn summary(&self) -> String {
        let mut lines = vec![
            summary_line("Tag:", &format!("{}{}", TAG_PREFIX, self.tag)),
            summary_line("Current version:", &self.snapshot),
            summary_line("Maintenance branch:", &self.branch),
            summary_line("Maintenance version:", &self.version),
        ];
        lines.extend(other_versions_lines(&self.other_versions));
        lines.join("\n")
    }
}

impl fmt::Display for MaintenanceRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Drives a release across a `RepositorySet`.
pub struct ReleaseOrchestrator {
    set: RepositorySet,
    rewriter: Arc<dyn VersionRewriter>,
    clock: Clock,
    log_root: PathBuf,
}

impl ReleaseOrchestrator {
    pub fn new(set: RepositorySet, rewriter: Arc<dyn VersionRewriter>) -> Self {
        let log_root = set.root().to_path_buf();
        Self {
            set,
            rewriter,
            clock: Arc::new(|| Local::now().naive_local()),
            log_root,
        }
    }

    /// Names the release log after `root` instead of the working root, for
    /// runs working through a shortened path.
    pub fn with_log_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.log_root = root.into();
        self
    }

    /// Replaces the local clock used for dated tags.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn repositories(&self) -> &RepositorySet {
        &self.set
    }

    /// Version declared by the root descriptor as currently checked out.
    pub fn current_version(&self) -> Result<VersionIdentifier> {
        let descriptor = self.set.root_descriptor();
        let version = self.set.discovery().version(&descriptor)?;
        VersionIdentifier::parse(&version)
    }

    /// Resolves `info` against the working copy without changing anything.
    pub fn resolve(&self, info: &ReleaseInfo) -> Result<ResolvedRelease> {
        info.resolve_at(&self.current_version()?, (self.clock)())
    }

    /// Freezes the release parameters and brings the tree onto the branch.
    pub fn prepare_release(&self, info: &ReleaseInfo) -> Result<PreparedRelease> {
        if info.dry_run {
            info!("#### DRY RUN MODE ####");
        }
        let root = self.set.update_root(&info.branch)?;
        let release = self.resolve(info)?;
        for line in release.summary().lines() {
            info!("{}", line);
        }

        let module = self
            .log_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.set.root_name().to_string());
        let log_path = ReleaseLog {
            module,
            snapshot: Some(release.snapshot.clone()),
            info: release.info.clone(),
        }
        .write(&self.log_root)?;

        let report = self.set.update_children(&info.branch, root)?;
        Ok(PreparedRelease {
            release,
            report,
            log_path,
        })
    }

    /// Tags every git repository of `report` as `release`.
    ///
    /// Returns the names of the repositories tagged.
    pub fn tag_release(
        &self,
        release: &ResolvedRelease,
        report: &ResolutionReport,
    ) -> Result<Vec<String>> {
        info!(
            "Releasing branch {}, create maintenance branch {}, update versions, commit and tag as {}...",
            release.info.branch,
            release.maintenance_branch,
            release.tag_name()
        );
        let targets = git_targets(report);
        let mut tagged = Vec::new();
        self.set
            .for_each(&targets, &mut tagged, |target| self.tag_repository(target, release))?;
        Ok(tagged)
    }

    fn tag_repository(&self, target: &ModuleTarget, release: &ResolvedRelease) -> Result<()> {
        let git = self.set.git();
        let path = target.path.as_path();
        let patterns = &release.info.other_versions;

        git.create_branch(path, &release.maintenance_branch)?;
        self.rewriter
            .rewrite(path, &release.snapshot, &release.tag, patterns)?;
        let mut message = format!(
            "Release {}, update {} to {}",
            release.info.branch, release.snapshot, release.tag
        );
        for replacement in &patterns.replacements {
            self.rewriter
                .rewrite(path, &replacement.old, &replacement.new, patterns)?;
            message.push_str(&format!(
                ", update {} to {}",
                replacement.old, replacement.new
            ));
        }
        git.commit_all(path, &release.commit_message(&message))?;
        let tag_message = format!(
            "Release {} from {} on {}",
            release.tag_name(),
            release.snapshot,
            release.info.branch
        );
        git.create_tag(path, &release.tag_name(), &release.tag_message(&tag_message))?;

        if let Maintenance::Version(version) = &release.info.maintenance {
            self.rewriter.rewrite(path, &release.tag, version, patterns)?;
            git.commit_all(
                path,
                &release.commit_message(&format!("Update {} to {}", release.tag, version)),
            )?;
        }

        git.checkout(path, &target.label, true)?;
        let mut message = format!("Post release {}", release.tag);
        let mut changed = false;
        if self
            .rewriter
            .rewrite(path, &release.snapshot, &release.next_snapshot, patterns)?
        {
            changed = true;
            message.push_str(&format!(
                "\nUpdate {} to {}",
                release.snapshot, release.next_snapshot
            ));
        }
        for replacement in &patterns.replacements {
            let Some(next) = &replacement.next else {
                continue;
            };
            if self.rewriter.rewrite(path, &replacement.old, next, patterns)? {
                changed = true;
                message.push_str(&format!("\nUpdate {} to {}", replacement.old, next));
            }
        }
        if changed {
            git.commit_all(path, &release.commit_message(&message))?;
        }

        if release.info.maintenance == Maintenance::Discard {
            git.delete_branch(path, &release.maintenance_branch)?;
        }
        Ok(())
    }

    /// Updates the tree and pushes the release branch, the maintenance
    /// branch when kept, and the tag.
    pub fn perform_release(&self, release: &ResolvedRelease) -> Result<ResolutionReport> {
        let dry_run = release.info.dry_run;
        if dry_run {
            info!("#### DRY RUN MODE ####");
        }
        let report = self.set.clone_or_update_all(&release.info.branch)?;
        let alias = self.set.remote().alias();
        let tag_name = release.tag_name();
        let keep_maintenance = release.info.maintenance != Maintenance::Discard;

        let pushable: Vec<_> = report
            .repositories
            .iter()
            .filter(|r| !r.legacy)
            .map(|r| (r.target(), !matches!(r.resolution, Resolution::Tag { .. })))
            .collect();
        let targets: Vec<ModuleTarget> = pushable.iter().map(|(t, _)| t.clone()).collect();
        let mut pushed = Vec::new();
        self.set.for_each(&targets, &mut pushed, |target| {
            let on_branch = pushable
                .iter()
                .any(|(t, on_branch)| t.name == target.name && *on_branch);
            let git = self.set.git();
            if on_branch {
                git.push(&target.path, alias, &target.label, dry_run)?;
            }
            if keep_maintenance {
                git.push(&target.path, alias, &release.maintenance_branch, dry_run)?;
            }
            git.push(&target.path, alias, &tag_name, dry_run)
        })?;
        Ok(report)
    }

    /// Creates a maintenance branch from `release-<tag>` in every repository.
    pub fn maintenance(
        &self,
        request: &MaintenanceRequest,
    ) -> Result<(MaintenanceRelease, ResolutionReport)> {
        if request.tag.trim().is_empty() {
            return Err(Error::malformed_version(&request.tag, "empty tag"));
        }
        let label = format!("{}{}", TAG_PREFIX, request.tag);
        let root = self.set.update_root(&label)?;
        let snapshot = self.current_version()?.to_string();
        let version = match &request.version {
            Some(version) => VersionIdentifier::parse(version)?.to_string(),
            None => format!("{}.1-SNAPSHOT", request.tag),
        };
        let maintenance = MaintenanceRelease {
            tag: request.tag.clone(),
            snapshot,
            branch: request
                .branch
                .clone()
                .unwrap_or_else(|| request.tag.clone()),
            version,
            other_versions: request.other_versions.clone(),
        };
        for line in maintenance.summary().lines() {
            info!("{}", line);
        }

        let report = self.set.update_children(&label, root)?;
        info!(
            "Creating maintenance branch {} from {}, update versions and commit...",
            maintenance.branch, maintenance.tag
        );
        let targets = git_targets(&report);
        let mut done = Vec::new();
        self.set.for_each(&targets, &mut done, |target| {
            let git = self.set.git();
            let path = target.path.as_path();
            let patterns = &maintenance.other_versions;
            git.create_branch(path, &maintenance.branch)?;
            self.rewriter
                .rewrite(path, &maintenance.tag, &maintenance.version, patterns)?;
            let mut message = format!("Update {} to {}", maintenance.tag, maintenance.version);
            for replacement in &patterns.replacements {
                self.rewriter
                    .rewrite(path, &replacement.old, &replacement.new, patterns)?;
                message.push_str(&format!(
                    ", update {} to {}",
                    replacement.old, replacement.new
                ));
            }
            git.commit_all(path, &compose_message(&request.msg_commit, &message))?;
            Ok(())
        })?;
        Ok((maintenance, report))
    }
}

/// Repositories reachable with git, legacy ones being left as they are.
fn git_targets(report: &ResolutionReport) -> Vec<ModuleTarget> {
    report
        .targets()
        .into_iter()
        .filter(|target| {
            if target.legacy {
                info!("{}: legacy repository left untouched", target.name);
            }
            !target.legacy
        })
        .collect()
}
