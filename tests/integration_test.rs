//! Full release flow through the public API, on the in-memory VCS backend.

use std::path::PathBuf;
use std::sync::Arc;

use release_tree::error::Error;
use release_tree::mock::{MockGitOperations, MockLegacyOperations, StaticDiscovery};
use release_tree::orchestrator::{LoggingRewriter, ReleaseOrchestrator};
use release_tree::release_info::{Maintenance, ReleaseInfo};
use release_tree::release_log::ReleaseLog;
use release_tree::remote::{Remote, RemoteRef};
use release_tree::repository::RepositorySet;
use release_tree::resolver::Resolution;

const ROOT_URL: &str = "git@github.com:org/root.git";

struct Tree {
    _dir: tempfile::TempDir,
    root: PathBuf,
    git: Arc<MockGitOperations>,
}

impl Tree {
    /// mod-a has the `8.10` branch, mod-b only `master`.
    fn new() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("root");
        let git = Arc::new(MockGitOperations::new());
        git.add_remote_repository(ROOT_URL, &[], &["master", "8.10"]);
        git.add_remote_repository("git@github.com:org/mod-a.git", &[], &["master", "8.10"]);
        git.add_remote_repository("git@github.com:org/mod-b.git", &[], &["master"]);
        Self {
            _dir: dir,
            root,
            git,
        }
    }

    fn orchestrator(&self, version: &str, jobs: usize) -> ReleaseOrchestrator {
        let remote = RemoteRef::resolve("origin", &[Remote::new("origin", ROOT_URL)]).unwrap();
        let discovery = StaticDiscovery::new(version)
            .with_modules(self.root.join("pom.xml"), &["mod-a", "mod-b"]);
        let set = RepositorySet::new(
            self.root.clone(),
            remote,
            self.git.clone(),
            Arc::new(MockLegacyOperations::new()),
            Arc::new(discovery),
        )
        .with_jobs(jobs);
        ReleaseOrchestrator::new(set, Arc::new(LoggingRewriter))
    }
}

#[test]
fn test_release_with_partial_branch_fallback() {
    let tree = Tree::new();
    let orchestrator = tree.orchestrator("8.10-SNAPSHOT", 1);
    let mut info = ReleaseInfo::new("origin", "8.10");
    info.is_final = true;
    info.maintenance = Maintenance::Version("8.10.1-SNAPSHOT".to_string());

    let prepared = orchestrator.prepare_release(&info).unwrap();
    let mod_b = prepared.report.get("mod-b").unwrap();
    assert_eq!(
        mod_b.resolution,
        Resolution::Fallback {
            requested: "8.10".to_string(),
            default_branch: "master".to_string(),
        }
    );
    orchestrator
        .tag_release(&prepared.release, &prepared.report)
        .unwrap();

    let logged = ReleaseLog::read(&tree.root).unwrap();
    let release = orchestrator.resolve(&logged.info).unwrap();
    assert_eq!(release.tag, "8.10");
    orchestrator.perform_release(&release).unwrap();

    for url in [
        ROOT_URL,
        "git@github.com:org/mod-a.git",
        "git@github.com:org/mod-b.git",
    ] {
        assert!(tree.git.hosted_tags(url).contains(&"release-8.10".to_string()));
        assert!(tree.git.hosted_branches(url).contains(&"8.10.0".to_string()));
    }
}

#[test]
fn test_parallel_release_matches_sequential() {
    let sequential = Tree::new();
    let parallel = Tree::new();
    let mut info = ReleaseInfo::new("origin", "8.10");
    info.is_final = true;

    let a = sequential
        .orchestrator("8.10-SNAPSHOT", 1)
        .prepare_release(&info)
        .unwrap();
    let b = parallel
        .orchestrator("8.10-SNAPSHOT", 4)
        .prepare_release(&info)
        .unwrap();

    assert_eq!(a.release, b.release);
    let resolutions = |report: &release_tree::repository::ResolutionReport| {
        report
            .repositories
            .iter()
            .map(|r| (r.name.clone(), r.resolution.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(resolutions(&a.report), resolutions(&b.report));
}

#[test]
fn test_unreachable_module_aborts_with_progress() {
    let tree = Tree::new();
    tree.git.fail_url("git@github.com:org/mod-b.git");
    let orchestrator = tree.orchestrator("8.10-SNAPSHOT", 1);
    let info = ReleaseInfo::new("origin", "8.10");

    let err = orchestrator.prepare_release(&info).unwrap_err();
    match &err {
        Error::PartialRunAbort {
            failed, succeeded, ..
        } => {
            assert_eq!(failed, "mod-b");
            assert_eq!(succeeded, &vec!["root".to_string(), "mod-a".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.exit_code(), 128);
}
