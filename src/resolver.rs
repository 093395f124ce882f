//! Per-repository branch/tag resolution.
//!
//! Given the refs a repository publishes and the release label, decide what
//! to check out:
//!
//! 1. a **tag** of that name is checked out on a detached HEAD;
//! 2. a **branch** of that name is checked out, creating a local tracking
//!    branch if needed, else updating the existing local branch;
//! 3. **neither**: the repository's default branch is used instead and a
//!    warning is logged. Repositories evolve at different cadences, so a
//!    label missing from one of them must not fail the whole release.
//!
//! The decision itself (`BranchResolver::decide`) is pure; `resolve` runs the
//! clone-or-fetch step and applies the decision through `GitOperations`.

use std::fmt;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::repository::{GitOperations, ModuleTarget};

/// Fallback branch when neither configuration nor the remote names one.
pub const DEFAULT_INTEGRATION_BRANCH: &str = "master";

/// How an existing local branch picks up upstream changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMode {
    #[default]
    Rebase,
    Pull,
}

impl IntegrationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationMode::Rebase => "rebase",
            IntegrationMode::Pull => "pull",
        }
    }
}

impl fmt::Display for IntegrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one repository during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoState {
    NotCloned,
    Cloned,
    OnTarget,
}

impl fmt::Display for RepoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepoState::NotCloned => "not cloned",
            RepoState::Cloned => "cloned",
            RepoState::OnTarget => "on target",
        })
    }
}

/// The refs known for one repository after fetching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefSnapshot {
    pub tags: Vec<String>,
    pub remote_branches: Vec<String>,
    pub local_branches: Vec<String>,
}

impl RefSnapshot {
    fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t == name)
    }

    fn has_remote_branch(&self, name: &str) -> bool {
        self.remote_branches.iter().any(|b| b == name)
    }

    fn has_local_branch(&self, name: &str) -> bool {
        self.local_branches.iter().any(|b| b == name)
    }
}

/// What to do in a repository, as decided from its refs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    CheckoutTag(String),
    CreateTrackingBranch(String),
    UpdateLocalBranch(String),
    /// The label is unknown here; use the default branch through `inner`.
    Fallback {
        requested: String,
        default_branch: String,
        inner: Box<Decision>,
    },
}

/// The path a repository took to reach its target, kept for auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Tag { tag: String },
    NewTrackingBranch { branch: String },
    ExistingBranch { branch: String },
    Fallback { requested: String, default_branch: String },
    LegacyRevision { label: String },
}

impl Resolution {
    /// The ref the working copy ended up on.
    pub fn effective_label(&self) -> &str {
        match self {
            Resolution::Tag { tag } => tag,
            Resolution::NewTrackingBranch { branch } | Resolution::ExistingBranch { branch } => {
                branch
            }
            Resolution::Fallback { default_branch, .. } => default_branch,
            Resolution::LegacyRevision { label } => label,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Tag { tag } => write!(f, "tag {}", tag),
            Resolution::NewTrackingBranch { branch } => write!(f, "new branch {}", branch),
            Resolution::ExistingBranch { branch } => write!(f, "branch {}", branch),
            Resolution::Fallback {
                requested,
                default_branch,
            } => write!(f, "{} ({} not found)", default_branch, requested),
            Resolution::LegacyRevision { label } => write!(f, "legacy revision {}", label),
        }
    }
}

/// Resolves and applies the release label in one repository.
#[derive(Debug, Clone)]
pub struct BranchResolver {
    alias: String,
    default_branch: Option<String>,
    integration: IntegrationMode,
}

impl BranchResolver {
    /// `default_branch` overrides the branch advertised by `alias/HEAD`.
    pub fn new(
        alias: impl Into<String>,
        default_branch: Option<String>,
        integration: IntegrationMode,
    ) -> Self {
        Self {
            alias: alias.into(),
            default_branch,
            integration,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Decides how to reach `label` given `refs`.
    ///
    /// Returns `None` when neither the label nor `default_branch` exist.
    pub fn decide(label: &str, refs: &RefSnapshot, default_branch: &str) -> Option<Decision> {
        if refs.has_tag(label) {
            return Some(Decision::CheckoutTag(label.to_string()));
        }
        if let Some(decision) = Self::branch_decision(label, refs) {
            return Some(decision);
        }
        Self::branch_decision(default_branch, refs).map(|inner| Decision::Fallback {
            requested: label.to_string(),
            default_branch: default_branch.to_string(),
            inner: Box::new(inner),
        })
    }

    /// A branch only counts when the remote has it: a local-only branch has
    /// no upstream to integrate.
    fn branch_decision(branch: &str, refs: &RefSnapshot) -> Option<Decision> {
        if !refs.has_remote_branch(branch) {
            None
        } else if refs.has_local_branch(branch) {
            Some(Decision::UpdateLocalBranch(branch.to_string()))
        } else {
            Some(Decision::CreateTrackingBranch(branch.to_string()))
        }
    }

    /// Brings `target` onto its label: clone or fetch, then check out.
    pub fn resolve(
        &self,
        git: &dyn GitOperations,
        target: &ModuleTarget,
        url: &str,
    ) -> Result<Resolution> {
        let path = target.path.as_path();
        let mut state = RepoState::NotCloned;
        if git.exists(path) {
            git.fetch(path, &self.alias)?;
        } else {
            git.clone_repo(url, path)?;
        }
        state = self.transition(target, state, RepoState::Cloned);

        let refs = RefSnapshot {
            tags: git.remote_tags(path, &self.alias)?,
            remote_branches: git.remote_branches(path, &self.alias)?,
            local_branches: git.local_branches(path)?,
        };
        let default_branch = self.default_branch(git, path)?;

        let decision = Self::decide(&target.label, &refs, &default_branch).ok_or_else(|| {
            Error::BranchNotFound {
                repository: target.name.clone(),
                label: target.label.clone(),
                default_branch: default_branch.clone(),
            }
        })?;
        let resolution = self.apply(git, target, &decision)?;
        self.transition(target, state, RepoState::OnTarget);
        Ok(resolution)
    }

    fn apply(
        &self,
        git: &dyn GitOperations,
        target: &ModuleTarget,
        decision: &Decision,
    ) -> Result<Resolution> {
        let path = target.path.as_path();
        match decision {
            Decision::CheckoutTag(tag) => {
                git.checkout_tag(path, tag)?;
                Ok(Resolution::Tag { tag: tag.clone() })
            }
            Decision::CreateTrackingBranch(branch) => {
                git.create_tracking_branch(path, &self.alias, branch)?;
                Ok(Resolution::NewTrackingBranch {
                    branch: branch.clone(),
                })
            }
            Decision::UpdateLocalBranch(branch) => {
                git.checkout(path, branch, false)?;
                git.integrate(path, &self.alias, branch, self.integration)?;
                Ok(Resolution::ExistingBranch {
                    branch: branch.clone(),
                })
            }
            Decision::Fallback {
                requested,
                default_branch,
                inner,
            } => {
                warn!(
                    "{}: '{}' is neither a tag nor a branch on {}, falling back to '{}'",
                    target.name, requested, self.alias, default_branch
                );
                self.apply(git, target, inner)?;
                Ok(Resolution::Fallback {
                    requested: requested.clone(),
                    default_branch: default_branch.clone(),
                })
            }
        }
    }

    fn default_branch(&self, git: &dyn GitOperations, path: &Path) -> Result<String> {
        if let Some(branch) = &self.default_branch {
            return Ok(branch.clone());
        }
        Ok(git
            .default_branch(path, &self.alias)?
            .unwrap_or_else(|| DEFAULT_INTEGRATION_BRANCH.to_string()))
    }

    fn transition(&self, target: &ModuleTarget, from: RepoState, to: RepoState) -> RepoState {
        debug!("{}: {} -> {}", target.name, from, to);
        to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGitOperations;
    use crate::repository::RepositoryKind;
    use std::path::PathBuf;

    fn refs(tags: &[&str], remote: &[&str], local: &[&str]) -> RefSnapshot {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        RefSnapshot {
            tags: owned(tags),
            remote_branches: owned(remote),
            local_branches: owned(local),
        }
    }

    fn target(name: &str, label: &str) -> ModuleTarget {
        ModuleTarget {
            name: name.to_string(),
            kind: RepositoryKind::Module,
            label: label.to_string(),
            path: PathBuf::from("/work").join(name),
            legacy: false,
        }
    }

    #[test]
    fn test_decide_prefers_tag() {
        let decision = BranchResolver::decide("8.10", &refs(&["8.10"], &["8.10"], &[]), "master");
        assert_eq!(decision, Some(Decision::CheckoutTag("8.10".to_string())));
    }

    #[test]
    fn test_decide_creates_tracking_branch() {
        let decision =
            BranchResolver::decide("8.10", &refs(&[], &["master", "8.10"], &["master"]), "master");
        assert_eq!(
            decision,
            Some(Decision::CreateTrackingBranch("8.10".to_string()))
        );
    }

    #[test]
    fn test_decide_reuses_local_branch() {
        let decision =
            BranchResolver::decide("8.10", &refs(&[], &["8.10"], &["8.10"]), "master");
        assert_eq!(decision, Some(Decision::UpdateLocalBranch("8.10".to_string())));
    }

    #[test]
    fn test_decide_falls_back_to_default() {
        let decision =
            BranchResolver::decide("release-7.4", &refs(&[], &["master"], &["master"]), "master");
        assert_eq!(
            decision,
            Some(Decision::Fallback {
                requested: "release-7.4".to_string(),
                default_branch: "master".to_string(),
                inner: Box::new(Decision::UpdateLocalBranch("master".to_string())),
            })
        );
    }

    #[test]
    fn test_decide_ignores_local_only_branch() {
        let decision = BranchResolver::decide(
            "feature",
            &refs(&[], &["master"], &["master", "feature"]),
            "master",
        );
        assert_eq!(
            decision,
            Some(Decision::Fallback {
                requested: "feature".to_string(),
                default_branch: "master".to_string(),
                inner: Box::new(Decision::UpdateLocalBranch("master".to_string())),
            })
        );
    }

    #[test]
    fn test_decide_local_default_missing_on_remote() {
        assert_eq!(
            BranchResolver::decide("8.10", &refs(&[], &["main"], &["master"]), "master"),
            None
        );
    }

    #[test]
    fn test_decide_nothing_found() {
        assert_eq!(
            BranchResolver::decide("8.10", &refs(&[], &["main"], &[]), "master"),
            None
        );
    }

    #[test]
    fn test_resolve_fallback_logs_warning() {
        testing_logger::setup();
        let git = MockGitOperations::new();
        git.add_remote_repository("https://host/org/mod-x.git", &[], &["master"]);
        let resolver = BranchResolver::new("origin", None, IntegrationMode::Rebase);

        let resolution = resolver
            .resolve(&git, &target("mod-x", "release-7.4"), "https://host/org/mod-x.git")
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Fallback {
                requested: "release-7.4".to_string(),
                default_branch: "master".to_string(),
            }
        );
        assert_eq!(git.current_ref(Path::new("/work/mod-x")).as_deref(), Some("master"));
        testing_logger::validate(|captured_logs| {
            let warnings: Vec<_> = captured_logs
                .iter()
                .filter(|log| log.level == log::Level::Warn)
                .collect();
            assert_eq!(warnings.len(), 1);
            assert!(warnings[0].body.contains("release-7.4"));
            assert!(warnings[0].body.contains("falling back to 'master'"));
        });
    }

    #[test]
    fn test_resolve_existing_clone_fetches_and_integrates() {
        let git = MockGitOperations::new();
        git.add_remote_repository("https://host/org/mod-a.git", &[], &["master", "8.10"]);
        git.add_local_clone("/work/mod-a", "https://host/org/mod-a.git", &["8.10"]);
        let resolver = BranchResolver::new("origin", None, IntegrationMode::Pull);

        let resolution = resolver
            .resolve(&git, &target("mod-a", "8.10"), "https://host/org/mod-a.git")
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::ExistingBranch {
                branch: "8.10".to_string()
            }
        );
        let log = git.operations();
        assert!(log.contains(&"fetch /work/mod-a origin".to_string()));
        assert!(log.contains(&"integrate /work/mod-a origin/8.10 pull".to_string()));
        assert!(!log.iter().any(|op| op.starts_with("clone")));
    }

    #[test]
    fn test_resolve_tag_is_detached() {
        let git = MockGitOperations::new();
        git.add_remote_repository("https://host/org/mod-a.git", &["release-5.6"], &["master"]);
        let resolver = BranchResolver::new("origin", None, IntegrationMode::Rebase);

        let resolution = resolver
            .resolve(&git, &target("mod-a", "release-5.6"), "https://host/org/mod-a.git")
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Tag {
                tag: "release-5.6".to_string()
            }
        );
        assert!(git
            .operations()
            .contains(&"checkout-tag /work/mod-a release-5.6".to_string()));
    }

    #[test]
    fn test_resolve_configured_default_branch() {
        let git = MockGitOperations::new();
        git.add_remote_repository("https://host/org/mod-a.git", &[], &["master", "develop"]);
        let resolver =
            BranchResolver::new("origin", Some("develop".to_string()), IntegrationMode::Rebase);

        let resolution = resolver
            .resolve(&git, &target("mod-a", "9.9"), "https://host/org/mod-a.git")
            .unwrap();

        assert_eq!(resolution.effective_label(), "develop");
        assert!(resolution.is_fallback());
    }

    #[test]
    fn test_resolve_missing_default_branch_is_fatal() {
        let git = MockGitOperations::new();
        git.add_remote_repository("https://host/org/mod-a.git", &[], &["main"]);
        let resolver = BranchResolver::new("origin", None, IntegrationMode::Rebase);
        git.set_default_branch("https://host/org/mod-a.git", None);

        let err = resolver
            .resolve(&git, &target("mod-a", "8.10"), "https://host/org/mod-a.git")
            .unwrap_err();
        assert!(matches!(err, Error::BranchNotFound { .. }));
    }

    #[test]
    fn test_resolution_display() {
        let resolution = Resolution::Fallback {
            requested: "8.10".to_string(),
            default_branch: "master".to_string(),
        };
        assert_eq!(resolution.to_string(), "master (8.10 not found)");
    }
}
