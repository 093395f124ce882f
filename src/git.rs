//! Git command wrappers.
//!
//! Every function takes the repository working directory explicitly and runs
//! the system `git` through a `RetryRunner`, which automatically picks up
//! SSH keys, credential helpers and anything configured in `~/.gitconfig`.
//! Network operations (clone, fetch, pull, ls-remote, push) are retried;
//! local operations run once.

use std::fs;
use std::path::Path;

use crate::command::CommandSpec;
use crate::error::{Error, Result};
use crate::remote::Remote;
use crate::retry::RetryRunner;

/// Clones `url` into `target_dir`.
///
/// The clone runs from the parent directory, which is created if needed.
pub fn clone(retry: &RetryRunner, url: &str, target_dir: &Path) -> Result<()> {
    let parent = parent_dir(target_dir)?;
    fs::create_dir_all(parent)?;
    let spec = CommandSpec::git(
        ["clone".to_string(), url.to_string(), path_arg(target_dir)],
        parent,
    );
    retry.run_with_retry(&spec, true)?;
    Ok(())
}

/// Fetches branches and tags from `alias`.
pub fn fetch(retry: &RetryRunner, repo: &Path, alias: &str) -> Result<()> {
    let spec = CommandSpec::git(["fetch", "--tags", alias], repo);
    retry.run_with_retry(&spec, true)?;
    Ok(())
}

/// Lists the configured remotes (`git remote -v`).
pub fn remotes(retry: &RetryRunner, repo: &Path) -> Result<Vec<Remote>> {
    let spec = CommandSpec::git(["remote", "-v"], repo);
    let output = retry.run(&spec, true)?;
    Ok(parse_remotes(&output.output))
}

/// Lists the tag names published on `alias`.
pub fn remote_tags(retry: &RetryRunner, repo: &Path, alias: &str) -> Result<Vec<String>> {
    let spec = CommandSpec::git(["ls-remote", "--tags", alias], repo);
    let output = retry.run_with_retry(&spec, true)?;
    Ok(parse_ls_remote_tags(&output.output))
}

/// Lists the remote-tracking branches of `alias`, without the alias prefix.
pub fn remote_branches(retry: &RetryRunner, repo: &Path, alias: &str) -> Result<Vec<String>> {
    let spec = CommandSpec::git(
        [
            "for-each-ref".to_string(),
            "--format=%(refname)".to_string(),
            format!("refs/remotes/{}/", alias),
        ],
        repo,
    );
    let output = retry.run(&spec, true)?;
    let prefix = format!("refs/remotes/{}/", alias);
    Ok(output
        .lines()
        .filter_map(|line| line.strip_prefix(&prefix))
        .filter(|name| *name != "HEAD")
        .map(str::to_string)
        .collect())
}

/// Lists the local branches.
pub fn local_branches(retry: &RetryRunner, repo: &Path) -> Result<Vec<String>> {
    let spec = CommandSpec::git(
        ["for-each-ref", "--format=%(refname)", "refs/heads/"],
        repo,
    );
    let output = retry.run(&spec, true)?;
    Ok(output
        .lines()
        .filter_map(|line| line.strip_prefix("refs/heads/"))
        .map(str::to_string)
        .collect())
}

/// The branch `alias/HEAD` points to, if the remote advertises one.
pub fn default_branch(retry: &RetryRunner, repo: &Path, alias: &str) -> Result<Option<String>> {
    let spec = CommandSpec::git(
        [
            "symbolic-ref".to_string(),
            "--quiet".to_string(),
            format!("refs/remotes/{}/HEAD", alias),
        ],
        repo,
    );
    let output = retry.run(&spec, false)?;
    if !output.is_success() {
        return Ok(None);
    }
    let prefix = format!("refs/remotes/{}/", alias);
    let branch = output
        .lines()
        .next()
        .and_then(|line| line.strip_prefix(&prefix))
        .map(str::to_string);
    Ok(branch)
}

/// Name of the checked-out branch, `None` on a detached HEAD.
pub fn current_branch(retry: &RetryRunner, repo: &Path) -> Result<Option<String>> {
    let spec = CommandSpec::git(["symbolic-ref", "--quiet", "--short", "HEAD"], repo);
    let output = retry.run(&spec, false)?;
    if !output.is_success() {
        return Ok(None);
    }
    let branch = output.lines().next().map(str::to_string);
    Ok(branch)
}

/// Tag pointing exactly at HEAD, if any.
pub fn head_tag(retry: &RetryRunner, repo: &Path) -> Result<Option<String>> {
    let spec = CommandSpec::git(["describe", "--tags", "--exact-match", "HEAD"], repo);
    let output = retry.run(&spec, false)?;
    if !output.is_success() {
        return Ok(None);
    }
    let tag = output.lines().next().map(str::to_string);
    Ok(tag)
}

/// Checks out `tag` on a detached HEAD.
pub fn checkout_tag(retry: &RetryRunner, repo: &Path, tag: &str) -> Result<()> {
    let spec = CommandSpec::git(
        [
            "checkout".to_string(),
            "--detach".to_string(),
            format!("refs/tags/{}", tag),
        ],
        repo,
    );
    retry.run(&spec, true)?;
    Ok(())
}

/// Creates local `branch` tracking `alias/branch` and checks it out.
pub fn create_tracking_branch(
    retry: &RetryRunner,
    repo: &Path,
    alias: &str,
    branch: &str,
) -> Result<()> {
    let spec = CommandSpec::git(
        [
            "checkout".to_string(),
            "-b".to_string(),
            branch.to_string(),
            "--track".to_string(),
            format!("{}/{}", alias, branch),
        ],
        repo,
    );
    retry.run(&spec, true)?;
    Ok(())
}

/// Checks out an existing local branch (a no-op if already current).
pub fn checkout(retry: &RetryRunner, repo: &Path, branch: &str) -> Result<()> {
    let spec = CommandSpec::git(["checkout", branch], repo);
    retry.run(&spec, true)?;
    Ok(())
}

/// Force-checks out `refname`, discarding local modifications.
pub fn checkout_force(retry: &RetryRunner, repo: &Path, refname: &str) -> Result<()> {
    let spec = CommandSpec::git(["checkout", "-f", refname], repo);
    retry.run(&spec, true)?;
    Ok(())
}

/// Rebases the current branch on `alias/branch`.
pub fn rebase(retry: &RetryRunner, repo: &Path, alias: &str, branch: &str) -> Result<()> {
    let spec = CommandSpec::git(
        ["rebase".to_string(), format!("{}/{}", alias, branch)],
        repo,
    );
    retry.run(&spec, true)?;
    Ok(())
}

/// Pulls `alias/branch` into the current branch.
pub fn pull(retry: &RetryRunner, repo: &Path, alias: &str, branch: &str) -> Result<()> {
    let spec = CommandSpec::git(["pull", alias, branch], repo);
    retry.run_with_retry(&spec, true)?;
    Ok(())
}

/// Creates and checks out `branch` from the current HEAD.
pub fn create_branch(retry: &RetryRunner, repo: &Path, branch: &str) -> Result<()> {
    let spec = CommandSpec::git(["checkout", "-b", branch], repo);
    retry.run(&spec, true)?;
    Ok(())
}

/// Deletes local `branch` regardless of merge state.
pub fn delete_branch(retry: &RetryRunner, repo: &Path, branch: &str) -> Result<()> {
    let spec = CommandSpec::git(["branch", "-D", branch], repo);
    retry.run(&spec, true)?;
    Ok(())
}

/// Commits every tracked modification. Returns `false` when there was
/// nothing to commit.
pub fn commit_all(retry: &RetryRunner, repo: &Path, message: &str) -> Result<bool> {
    let status = CommandSpec::git(["status", "--porcelain", "--untracked-files=no"], repo);
    if retry.run(&status, true)?.lines().next().is_none() {
        return Ok(false);
    }
    let spec = CommandSpec::git(["commit", "-a", "-m", message], repo);
    retry.run(&spec, true)?;
    Ok(true)
}

/// Creates annotated tag `name`.
pub fn create_tag(retry: &RetryRunner, repo: &Path, name: &str, message: &str) -> Result<()> {
    let spec = CommandSpec::git(["tag", "-a", name, "-m", message], repo);
    retry.run(&spec, true)?;
    Ok(())
}

/// Pushes `refname` to `alias`; `dry_run` only reports what would be pushed.
pub fn push(
    retry: &RetryRunner,
    repo: &Path,
    alias: &str,
    refname: &str,
    dry_run: bool,
) -> Result<()> {
    let mut args = vec!["push".to_string()];
    if dry_run {
        args.push("-n".to_string());
    }
    args.push(alias.to_string());
    args.push(refname.to_string());
    let spec = CommandSpec::git(args, repo);
    retry.run_with_retry(&spec, true)?;
    Ok(())
}

/// Parses `git remote -v` output, keeping the fetch URL of each remote.
pub fn parse_remotes(output: &str) -> Vec<Remote> {
    let mut remotes: Vec<Remote> = Vec::new();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(url)) = (fields.next(), fields.next()) else {
            continue;
        };
        if fields.next() == Some("(push)") {
            continue;
        }
        if !remotes.iter().any(|r| r.name == name) {
            remotes.push(Remote::new(name, url));
        }
    }
    remotes
}

/// Parses `git ls-remote --tags` output into tag names.
///
/// Peeled entries (`refs/tags/v1^{}`) are folded into their tag.
pub fn parse_ls_remote_tags(output: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for line in output.lines() {
        // Git ls-remote output format: <hash>\t<ref>
        let Some((_, refname)) = line.split_once('\t') else {
            continue;
        };
        let Some(tag) = refname.trim().strip_prefix("refs/tags/") else {
            continue;
        };
        let tag = tag.strip_suffix("^{}").unwrap_or(tag);
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn parent_dir(target_dir: &Path) -> Result<&Path> {
    match target_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent),
        Some(_) => Ok(Path::new(".")),
        None => Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("cannot clone into {}", target_dir.display()),
        ))),
    }
}

fn path_arg(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, CommandRunner};
    use crate::retry::{CancellationFlag, RetryPolicy, Sleeper};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Mock runner recording every command and answering with canned output
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<CommandSpec>>,
        output: String,
        code: i32,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            Ok(CommandOutput {
                code: self.code,
                output: self.output.clone(),
            })
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration, _cancel: &CancellationFlag) -> bool {
            true
        }
    }

    fn retry_with(runner: Arc<RecordingRunner>) -> RetryRunner {
        RetryRunner::new(
            runner,
            Arc::new(NoSleep),
            RetryPolicy::default(),
            CancellationFlag::new(),
        )
    }

    #[test]
    fn test_parse_remotes_dedups_fetch_and_push() {
        let output = "origin\thttps://github.com/org/root.git (fetch)\n\
                      origin\thttps://github.com/org/root.git (push)\n\
                      fork\tgit@github.com:me/root.git (fetch)\n";
        let remotes = parse_remotes(output);
        assert_eq!(
            remotes,
            vec![
                Remote::new("origin", "https://github.com/org/root.git"),
                Remote::new("fork", "git@github.com:me/root.git"),
            ]
        );
    }

    #[test]
    fn test_parse_ls_remote_tags_folds_peeled() {
        let output = "abc\trefs/tags/release-5.6\n\
                      def\trefs/tags/release-5.6^{}\n\
                      123\trefs/tags/8.10\n\
                      456\trefs/heads/master\n";
        assert_eq!(parse_ls_remote_tags(output), vec!["release-5.6", "8.10"]);
    }

    #[test]
    fn test_parse_ls_remote_tags_empty() {
        assert!(parse_ls_remote_tags("").is_empty());
    }

    #[test]
    fn test_clone_runs_from_parent_directory() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nested").join("mod-a");
        let runner = Arc::new(RecordingRunner::default());

        clone(&retry_with(runner.clone()), "https://host/org/mod-a.git", &target).unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["clone", "https://host/org/mod-a.git", "mod-a"]);
        assert_eq!(calls[0].cwd, temp.path().join("nested"));
        assert!(temp.path().join("nested").is_dir());
    }

    #[test]
    fn test_remote_branches_strips_alias_and_head() {
        let runner = Arc::new(RecordingRunner {
            output: "refs/remotes/origin/HEAD\nrefs/remotes/origin/master\nrefs/remotes/origin/8.10\n"
                .to_string(),
            ..Default::default()
        });
        let branches =
            remote_branches(&retry_with(runner), &PathBuf::from("/repo"), "origin").unwrap();
        assert_eq!(branches, vec!["master", "8.10"]);
    }

    #[test]
    fn test_default_branch_absent_is_none() {
        let runner = Arc::new(RecordingRunner {
            code: 1,
            ..Default::default()
        });
        let branch = default_branch(&retry_with(runner), Path::new("/repo"), "origin").unwrap();
        assert_eq!(branch, None);
    }

    #[test]
    fn test_default_branch_from_symbolic_ref() {
        let runner = Arc::new(RecordingRunner {
            output: "refs/remotes/origin/main\n".to_string(),
            ..Default::default()
        });
        let branch = default_branch(&retry_with(runner), Path::new("/repo"), "origin").unwrap();
        assert_eq!(branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_current_branch_first_line() {
        let runner = Arc::new(RecordingRunner {
            output: "8.10\n".to_string(),
            ..Default::default()
        });
        let branch = current_branch(&retry_with(runner.clone()), Path::new("/repo")).unwrap();
        assert_eq!(branch.as_deref(), Some("8.10"));
        assert_eq!(
            runner.calls.lock().unwrap()[0].args,
            vec!["symbolic-ref", "--quiet", "--short", "HEAD"]
        );
    }

    #[test]
    fn test_head_tag_detached_on_release() {
        let runner = Arc::new(RecordingRunner {
            output: "release-8.10\n".to_string(),
            ..Default::default()
        });
        let tag = head_tag(&retry_with(runner), Path::new("/repo")).unwrap();
        assert_eq!(tag.as_deref(), Some("release-8.10"));
    }

    #[test]
    fn test_head_tag_none_without_exact_match() {
        let runner = Arc::new(RecordingRunner {
            code: 128,
            output: "fatal: no tag exactly matches".to_string(),
            ..Default::default()
        });
        assert_eq!(head_tag(&retry_with(runner), Path::new("/repo")).unwrap(), None);
    }

    #[test]
    fn test_commit_all_skips_clean_tree() {
        let runner = Arc::new(RecordingRunner::default());
        let committed =
            commit_all(&retry_with(runner.clone()), Path::new("/repo"), "Release").unwrap();
        assert!(!committed);
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_push_dry_run_flag() {
        let runner = Arc::new(RecordingRunner::default());
        push(
            &retry_with(runner.clone()),
            Path::new("/repo"),
            "origin",
            "release-5.6",
            true,
        )
        .unwrap();
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].args, vec!["push", "-n", "origin", "release-5.6"]);
    }
}
