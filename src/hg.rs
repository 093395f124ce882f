//! Mercurial command wrappers for addons still hosted on the legacy VCS.
//!
//! Legacy repositories have no tag/branch resolution of their own: they are
//! updated to the release label when it exists, else to `default`.

use std::fs;
use std::path::Path;

use crate::command::CommandSpec;
use crate::error::Result;
use crate::retry::RetryRunner;

/// Mercurial's integration branch.
pub const DEFAULT_BRANCH: &str = "default";

/// What `hg identify` prints for a label it does not know.
const UNKNOWN_REVISION: &str = "unknown revision";

/// Clones `url` into `target_dir` without updating the working copy.
pub fn clone(retry: &RetryRunner, url: &str, target_dir: &Path) -> Result<()> {
    let parent = match target_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let name = target_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| target_dir.to_string_lossy().into_owned());
    let spec = CommandSpec::hg(["clone".to_string(), "-U".to_string(), url.to_string(), name], parent);
    retry.run_with_retry(&spec, true)?;
    Ok(())
}

/// Pulls every changeset from the default path.
pub fn pull(retry: &RetryRunner, repo: &Path) -> Result<()> {
    let spec = CommandSpec::hg(["pull"], repo);
    retry.run_with_retry(&spec, true)?;
    Ok(())
}

/// Whether `label` names a revision (tag, branch or bookmark) of `repo`.
///
/// Only an `unknown revision` answer means absent; any other failure is an
/// error.
pub fn has_revision(retry: &RetryRunner, repo: &Path, label: &str) -> Result<bool> {
    let spec = CommandSpec::hg(["identify", "-r", label], repo);
    let output = retry.run(&spec, false)?;
    if output.is_success() {
        Ok(true)
    } else if output.output.contains(UNKNOWN_REVISION) {
        Ok(false)
    } else {
        output.check(&spec, 1).map(|_| false)
    }
}

/// Updates the working copy to `label`, discarding local changes.
///
/// Returns `false` when `label` is unknown to the repository. A failing
/// update to a known label is an error.
pub fn update(retry: &RetryRunner, repo: &Path, label: &str) -> Result<bool> {
    if !has_revision(retry, repo, label)? {
        return Ok(false);
    }
    let spec = CommandSpec::hg(["update", "-C", label], repo);
    retry.run(&spec, true)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, CommandRunner};
    use crate::error::Error;
    use crate::retry::{CancellationFlag, RetryPolicy, Sleeper};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Answers each hg subcommand with a fixed output; unlisted ones fail
    /// with exit code 1.
    struct MockRunner {
        calls: Mutex<Vec<CommandSpec>>,
        answers: Vec<(&'static str, CommandOutput)>,
    }

    impl CommandRunner for MockRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            let subcommand = spec.args.first().map(String::as_str).unwrap_or_default();
            Ok(self
                .answers
                .iter()
                .find(|(name, _)| *name == subcommand)
                .map(|(_, output)| output.clone())
                .unwrap_or_else(|| CommandOutput::failure(1, "")))
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration, _cancel: &CancellationFlag) -> bool {
            true
        }
    }

    fn retry(answers: Vec<(&'static str, CommandOutput)>) -> (Arc<MockRunner>, RetryRunner) {
        let runner = Arc::new(MockRunner {
            calls: Mutex::new(Vec::new()),
            answers,
        });
        let retry = RetryRunner::new(
            runner.clone(),
            Arc::new(NoSleep),
            RetryPolicy::default(),
            CancellationFlag::new(),
        );
        (runner, retry)
    }

    #[test]
    fn test_update_unknown_label_is_not_fatal() {
        let (runner, retry) = retry(vec![(
            "identify",
            CommandOutput::failure(255, "abort: unknown revision '8.10'!"),
        )]);
        assert!(!update(&retry, Path::new("/addons/a"), "8.10").unwrap());
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "hg");
        assert_eq!(calls[0].args, vec!["identify", "-r", "8.10"]);
    }

    #[test]
    fn test_update_known_label() {
        let (runner, retry) = retry(vec![
            ("identify", CommandOutput::success("3f2a1b4c5d6e 8.10")),
            ("update", CommandOutput::success("")),
        ]);
        assert!(update(&retry, Path::new("/addons/a"), "8.10").unwrap());
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].args, vec!["update", "-C", "8.10"]);
    }

    #[test]
    fn test_update_failure_on_known_label_is_fatal() {
        let (_, retry) = retry(vec![
            ("identify", CommandOutput::success("3f2a1b4c5d6e 8.10")),
            (
                "update",
                CommandOutput::failure(255, "abort: working directory is locked"),
            ),
        ]);
        let err = update(&retry, Path::new("/addons/a"), "8.10").unwrap_err();
        match err {
            Error::CommandFailed { code, output, .. } => {
                assert_eq!(code, 255);
                assert!(output.contains("locked"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_identify_failure_other_than_unknown_label_is_fatal() {
        let (_, retry) = retry(vec![(
            "identify",
            CommandOutput::failure(255, "abort: repository /addons/a not found!"),
        )]);
        assert!(matches!(
            update(&retry, Path::new("/addons/a"), "8.10"),
            Err(Error::CommandFailed { code: 255, .. })
        ));
    }

    #[test]
    fn test_pull_is_retried() {
        let (runner, retry) = retry(Vec::new());
        assert!(pull(&retry, Path::new("/addons/a")).is_err());
        assert_eq!(runner.calls.lock().unwrap().len(), 11);
    }
}
