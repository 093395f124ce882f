//! Short working paths for deep trees.
//!
//! Nested module and addon checkouts can exceed the Windows path length
//! limit. While a `PathShorteningScope` is alive the root is reachable
//! through a substituted drive letter (`subst Z: <root>`), and dropping the
//! scope removes the substitution, whatever the outcome of the run. On other
//! platforms the scope is the identity.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::Result;

/// Drive letters tried, last first since they are least often in use.
const DRIVE_LETTERS: &str = "ZYXWVUTSRQPONMLKJIHGFED";

/// Maps a root directory to a shorter path for the lifetime of the value.
pub struct PathShorteningScope {
    original: PathBuf,
    effective: PathBuf,
    drive: Option<char>,
    runner: Arc<dyn CommandRunner>,
}

impl PathShorteningScope {
    /// Shortens `root` where the platform needs it.
    pub fn acquire(root: &Path, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        if cfg!(windows) {
            Self::acquire_mapped(root, runner, &|letter| {
                !Path::new(&format!("{}:\\", letter)).exists()
            })
        } else {
            Ok(Self::identity(root, runner))
        }
    }

    fn identity(root: &Path, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            original: root.to_path_buf(),
            effective: root.to_path_buf(),
            drive: None,
            runner,
        }
    }

    /// Substitutes the first free drive letter for `root`. Falls back to the
    /// identity, with a warning, when no letter is free or `subst` fails.
    ///
    /// `root` is created first: `subst` only maps existing directories, and a
    /// tree about to be cloned has none yet.
    fn acquire_mapped(
        root: &Path,
        runner: Arc<dyn CommandRunner>,
        is_free: &dyn Fn(char) -> bool,
    ) -> Result<Self> {
        let Some(letter) = DRIVE_LETTERS.chars().find(|l| is_free(*l)) else {
            warn!("No free drive letter to shorten {}", root.display());
            return Ok(Self::identity(root, runner));
        };
        fs::create_dir_all(root)?;
        let drive = format!("{}:", letter);
        let spec = CommandSpec::new(
            "subst",
            [drive.clone(), root.display().to_string()],
            root,
        );
        let output = runner.run(&spec)?;
        if !output.is_success() {
            warn!(
                "Could not map {} to {}: {}",
                root.display(),
                drive,
                output.output.trim()
            );
            return Ok(Self::identity(root, runner));
        }
        debug!("Mapped {} to {}", root.display(), drive);
        Ok(Self {
            original: root.to_path_buf(),
            effective: PathBuf::from(format!("{}\\", drive)),
            drive: Some(letter),
            runner,
        })
    }

    /// The path to work in while the scope is alive.
    pub fn path(&self) -> &Path {
        &self.effective
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn is_mapped(&self) -> bool {
        self.drive.is_some()
    }
}

impl Drop for PathShorteningScope {
    fn drop(&mut self) {
        let Some(letter) = self.drive.take() else {
            return;
        };
        let drive = format!("{}:", letter);
        let spec = CommandSpec::new("subst", [drive.as_str(), "/D"], &self.original);
        match self.runner.run(&spec) {
            Ok(output) if output.is_success() => debug!("Unmapped {}", drive),
            Ok(output) => warn!("Could not unmap {}: {}", drive, output.output.trim()),
            Err(e) => warn!("Could not unmap {}: {}", drive, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use std::sync::Mutex;

    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            assert!(spec.cwd.is_dir(), "{} does not exist", spec.cwd.display());
            self.calls.lock().unwrap().push(spec.to_string());
            if self.fail {
                Ok(CommandOutput::failure(1, "Invalid parameter"))
            } else {
                Ok(CommandOutput::success(""))
            }
        }
    }

    #[test]
    #[cfg(not(windows))]
    fn test_identity_off_windows() {
        let runner = Arc::new(RecordingRunner::default());
        let scope = PathShorteningScope::acquire(Path::new("/work/root"), runner.clone()).unwrap();
        assert_eq!(scope.path(), Path::new("/work/root"));
        assert!(!scope.is_mapped());
        drop(scope);
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_mapping_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let runner = Arc::new(RecordingRunner::default());
        {
            let scope =
                PathShorteningScope::acquire_mapped(&root, runner.clone(), &|letter| letter != 'Z')
                    .unwrap();
            assert!(scope.is_mapped());
            assert_eq!(scope.path(), Path::new("Y:\\"));
            assert_eq!(scope.original(), root.as_path());
        }
        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec![format!("subst Y: {}", root.display()), "subst Y: /D".to_string()]
        );
    }

    #[test]
    fn test_mapping_creates_missing_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("work").join("root");
        let runner = Arc::new(RecordingRunner::default());

        let scope = PathShorteningScope::acquire_mapped(&root, runner.clone(), &|_| true).unwrap();

        assert!(root.is_dir());
        assert!(scope.is_mapped());
        assert_eq!(
            runner.calls.lock().unwrap()[0],
            format!("subst Z: {}", root.display())
        );
    }

    #[test]
    fn test_mapping_released_on_panic() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        let runner = Arc::new(RecordingRunner::default());
        let inner = runner.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _scope = PathShorteningScope::acquire_mapped(&root, inner, &|_| true).unwrap();
            panic!("release failed");
        }));
        assert!(result.is_err());
        assert_eq!(runner.calls.lock().unwrap().last().unwrap(), "subst Z: /D");
    }

    #[test]
    fn test_failed_subst_is_identity() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner {
            fail: true,
            ..RecordingRunner::default()
        });
        let scope = PathShorteningScope::acquire_mapped(dir.path(), runner.clone(), &|_| true)
            .unwrap();
        assert!(!scope.is_mapped());
        drop(scope);
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_free_letter_is_identity() {
        let runner = Arc::new(RecordingRunner::default());
        let scope =
            PathShorteningScope::acquire_mapped(Path::new("/work/root"), runner.clone(), &|_| false)
                .unwrap();
        assert_eq!(scope.path(), Path::new("/work/root"));
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
