//! # Configuration
//!
//! Optional `.release-tree.yaml` settings for a tree. Every key may be
//! omitted; command-line flags override whatever the file sets.
//!
//! ```yaml
//! remote_alias: origin
//! default_branch: master
//! integration: rebase        # or pull
//! descriptor: pom.xml
//! addons_dir: addons
//! legacy_addons: [addon-hg]
//! legacy_base_url: https://hg.example.org/
//! jobs: 4
//! retry:
//!   max_attempts: 11
//!   delay_secs: 10
//! ```
//!
//! Lookup order: an explicit path (`--config` or `RELEASE_TREE_CONFIG`),
//! then `.release-tree.yaml` in the root repository, then the user-level
//! file from `defaults::user_config_path`. A missing file is not an error,
//! a malformed one is.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};
use crate::repository::TreeLayout;
use crate::resolver::IntegrationMode;
use crate::retry::RetryPolicy;

/// File name looked up in the root repository.
pub const CONFIG_FILE_NAME: &str = ".release-tree.yaml";

/// Tree settings as read from YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseTreeConfig {
    /// Remote alias used when `--remote` is not given
    pub remote_alias: Option<String>,
    /// Branch to fall back on, instead of asking the remote
    pub default_branch: Option<String>,
    pub integration: IntegrationMode,
    /// Descriptor file name, `pom.xml` when unset
    pub descriptor: Option<String>,
    /// Addons directory relative to the root, `addons` when unset
    pub addons_dir: Option<String>,
    pub legacy_addons: Vec<String>,
    /// Base URL of legacy addons when it differs from the git host
    pub legacy_base_url: Option<String>,
    pub jobs: Option<usize>,
    pub retry: RetryPolicy,
}

impl ReleaseTreeConfig {
    /// Parses YAML content. An empty document yields the defaults.
    pub fn parse(yaml_content: &str) -> Result<Self> {
        if yaml_content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            hint: Some(format!(
                "known keys are remote_alias, default_branch, integration, descriptor, \
                 addons_dir, legacy_addons, legacy_base_url, jobs and retry; see {}",
                CONFIG_FILE_NAME
            )),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::parse(&content).map_err(|e| match e {
            Error::ConfigParse { message, hint } => Error::ConfigParse {
                message: format!("{}: {}", path.display(), message),
                hint,
            },
            other => other,
        })
    }

    /// Loads the configuration that applies to the tree at `root`.
    ///
    /// An `explicit` path must exist.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!("Loading configuration from {}", path.display());
            return Self::from_file(path);
        }
        for candidate in Self::candidates(root) {
            if candidate.is_file() {
                debug!("Loading configuration from {}", candidate.display());
                return Self::from_file(&candidate);
            }
        }
        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn candidates(root: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![root.join(CONFIG_FILE_NAME)];
        candidates.extend(defaults::user_config_path());
        candidates
    }

    fn validate(&self) -> Result<()> {
        if self.jobs == Some(0) {
            return Err(Error::ConfigParse {
                message: "jobs must be at least 1".to_string(),
                hint: Some("use jobs: 1 for a sequential run".to_string()),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::ConfigParse {
                message: "retry.max_attempts must be at least 1".to_string(),
                hint: None,
            });
        }
        Ok(())
    }

    /// Where descriptors and addons are found.
    pub fn layout(&self) -> TreeLayout {
        let defaults = TreeLayout::default();
        TreeLayout {
            descriptor: self.descriptor.clone().unwrap_or(defaults.descriptor),
            addons_dir: self.addons_dir.clone().unwrap_or(defaults.addons_dir),
            legacy_addons: self.legacy_addons.clone(),
        }
    }

    /// `remote` when given, else the configured alias, else `origin`.
    pub fn remote_alias(&self, remote: Option<&str>) -> String {
        remote
            .map(str::to_string)
            .or_else(|| self.remote_alias.clone())
            .unwrap_or_else(|| defaults::DEFAULT_REMOTE_ALIAS.to_string())
    }

    /// `jobs` when given, else the configured value, else sequential.
    pub fn jobs(&self, jobs: Option<usize>) -> usize {
        jobs.or(self.jobs).unwrap_or(defaults::DEFAULT_JOBS).max(1)
    }
}
