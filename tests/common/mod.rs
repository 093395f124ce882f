//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_pom(poms::ROOT_SNAPSHOT);
//!     fixture.command().arg("summary").arg("-b").arg("master").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    #[allow(unused_imports)]
    pub use super::git_available;
    #[allow(unused_imports)]
    pub use super::poms;
    pub use super::TestFixture;
}

/// Project descriptors for testing.
#[allow(dead_code)]
pub mod poms {
    /// Root at a snapshot, with two modules.
    pub const ROOT_SNAPSHOT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.example</groupId>
  <artifactId>root</artifactId>
  <version>5.6-SNAPSHOT</version>
  <modules>
    <module>mod-a</module>
    <module>mod-b</module>
  </modules>
</project>
"#;

    /// Root on a hotfix snapshot, with the version inherited from its parent.
    pub const HOTFIX_FROM_PARENT: &str = r#"<project>
  <parent>
    <groupId>org.example</groupId>
    <artifactId>parent</artifactId>
    <version>5.5.0-HF01-SNAPSHOT</version>
  </parent>
  <artifactId>root</artifactId>
</project>
"#;

    /// A version that cannot be parsed.
    pub const MALFORMED_VERSION: &str =
        "<project><version>5.x-SNAPSHOT</version></project>";

    /// Not even XML.
    pub const BROKEN: &str = "<project><version>";

    /// A module descriptor.
    pub const MODULE: &str = "<project><version>8.10-SNAPSHOT</version></project>";

    /// Root at 8.10-SNAPSHOT with two modules.
    pub const ROOT_8_10: &str = r#"<project>
  <version>8.10-SNAPSHOT</version>
  <modules>
    <module>mod-a</module>
    <module>mod-b</module>
  </modules>
</project>
"#;
}

/// Configuration YAML snippets for testing.
#[allow(dead_code)]
pub mod configs {
    /// No retry, so failing tests fail fast.
    pub const NO_RETRY: &str = r#"
retry:
  max_attempts: 1
  delay_secs: 0
"#;

    /// Unknown key.
    pub const UNKNOWN_KEY: &str = "remote: origin\n";

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "jobs: [\n";
}

/// Whether a `git` executable can be run.
#[allow(dead_code)]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A test fixture providing a temporary root directory.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_pom(poms::ROOT_SNAPSHOT)
///     .with_config(configs::NO_RETRY);
///
/// fixture.command().arg("summary").arg("-b").arg("master").assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new fixture with an empty `root` directory.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        temp_dir
            .child("root")
            .create_dir_all()
            .expect("Failed to create root directory");
        Self { temp_dir }
    }

    /// Add a root `pom.xml` with the given content.
    pub fn with_pom(self, content: &str) -> Self {
        self.with_file("root/pom.xml", content)
    }

    /// Add a `.release-tree.yaml` configuration to the root.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file("root/.release-tree.yaml", content)
    }

    /// Add a file, relative to the temporary directory.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// The temporary directory holding the root and its release log.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The root repository directory.
    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().join("root")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A command running in the temp directory with `--root` set.
    ///
    /// `--root` is a subcommand option, so the subcommand is given here.
    pub fn command(&self, subcommand: &str) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("release-tree");
        cmd.current_dir(self.path())
            .env_remove("RELEASE_TREE_CONFIG")
            .env("NO_COLOR", "1")
            .arg(subcommand)
            .arg("--root")
            .arg(self.root());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Bare repositories on disk, standing in for a hosting service.
///
/// Repositories are created under `hosted/`, so that module URLs derived from
/// the root URL (`<hosted>/root/<module>`) resolve to sibling fixtures.
#[allow(dead_code)]
pub struct HostedTree {
    dir: PathBuf,
}

#[allow(dead_code)]
impl HostedTree {
    pub fn new(dir: &Path) -> Self {
        let dir = dir.join("hosted");
        std::fs::create_dir_all(&dir).expect("Failed to create hosted directory");
        Self { dir }
    }

    /// URL of the root repository.
    pub fn root_url(&self) -> String {
        self.dir.join("root").display().to_string()
    }

    /// Publishes a repository at `<hosted>/<path>` with `files` committed on
    /// `master` and an extra branch for each of `branches`.
    pub fn publish(&self, path: &str, files: &[(&str, &str)], branches: &[&str]) {
        let work = self.dir.join(format!(".work-{}", path.replace('/', "-")));
        std::fs::create_dir_all(&work).expect("Failed to create work directory");
        git(&work, &["init", "-q"]);
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        for (name, content) in files {
            std::fs::write(work.join(name), content).expect("Failed to write file");
        }
        git(&work, &["add", "."]);
        git(&work, &["commit", "-q", "-m", "Initial"]);
        for branch in branches {
            git(&work, &["branch", branch]);
        }
        let bare = self.dir.join(path);
        git(
            &self.dir,
            &[
                "clone",
                "-q",
                "--bare",
                &work.display().to_string(),
                &bare.display().to_string(),
            ],
        );
    }
}

fn git(cwd: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.org"])
        .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=master"])
        .args(args)
        .current_dir(cwd)
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {:?} failed in {}", args, cwd.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_root() {
        let fixture = TestFixture::new();
        assert!(fixture.root().is_dir());
    }

    #[test]
    fn test_fixture_with_pom() {
        let fixture = TestFixture::new().with_pom(poms::ROOT_SNAPSHOT);
        assert!(fixture.root().join("pom.xml").exists());
    }

    #[test]
    fn test_configs_are_valid_yaml() {
        let value: serde_yaml::Value = serde_yaml::from_str(configs::NO_RETRY).unwrap();
        assert!(value.is_mapping());
    }
}
