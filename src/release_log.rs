//! The release log: resolved release parameters persisted by `prepare` and
//! read back by `perform`.
//!
//! The file is `release-<root>.log` in the parent of the root directory, one
//! `KEY=value` line per parameter (`KEY = value` is accepted on read).
//! Decoding is strict: booleans are `True` or `False`, versions must parse,
//! and a line without `=` is an error. Unknown keys are only warned about so
//! that a newer log can still be read.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::defaults;
use crate::error::{Error, Result};
use crate::release_info::{Maintenance, OtherVersions, ReleaseInfo, VersionChoice};
use crate::version::{IncrementPolicy, VersionIdentifier};

const MODULE: &str = "MODULE";
const REMOTE: &str = "REMOTE";
const BRANCH: &str = "BRANCH";
const SNAPSHOT: &str = "SNAPSHOT";
const TAG: &str = "TAG";
const NEXT_SNAPSHOT: &str = "NEXT_SNAPSHOT";
const MAINTENANCE: &str = "MAINTENANCE";
const FINAL: &str = "FINAL";
const SKIP_TESTS: &str = "SKIP_TESTS";
const SKIP_ITS: &str = "SKIP_ITS";
const PROFILES: &str = "PROFILES";
const OTHER_VERSIONS: &str = "OTHER_VERSIONS";
const FILES_PATTERN: &str = "FILES_PATTERN";
const PROPS_PATTERN: &str = "PROPS_PATTERN";
const MSG_COMMIT: &str = "MSG_COMMIT";
const MSG_TAG: &str = "MSG_TAG";
const AUTO_INCREMENT_POLICY: &str = "AUTO_INCREMENT_POLICY";
const DRY_RUN: &str = "DRY_RUN";

/// Every key, in the order they are written.
pub const KEYS: [&str; 18] = [
    MODULE,
    REMOTE,
    BRANCH,
    SNAPSHOT,
    TAG,
    NEXT_SNAPSHOT,
    MAINTENANCE,
    FINAL,
    SKIP_TESTS,
    SKIP_ITS,
    PROFILES,
    OTHER_VERSIONS,
    FILES_PATTERN,
    PROPS_PATTERN,
    MSG_COMMIT,
    MSG_TAG,
    AUTO_INCREMENT_POLICY,
    DRY_RUN,
];

/// Decoded content of a release log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLog {
    /// Name of the released root repository
    pub module: String,
    /// Version before release, when known
    pub snapshot: Option<String>,
    pub info: ReleaseInfo,
}

impl ReleaseLog {
    /// Location of the log for the tree rooted at `root`: `release-<name>.log`
    /// in the parent of `root`, with a relative `root` taken from the current
    /// directory.
    pub fn path_for(root: &Path) -> PathBuf {
        let root = defaults::absolute_root(root).unwrap_or_else(|_| root.to_path_buf());
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = root.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!("release-{}.log", name))
    }

    pub fn encode(&self) -> Result<String> {
        let info = &self.info;
        let values: [(&str, String); 18] = [
            (MODULE, self.module.clone()),
            (REMOTE, info.remote_alias.clone()),
            (BRANCH, info.branch.clone()),
            (SNAPSHOT, self.snapshot.clone().unwrap_or_default()),
            (TAG, info.tag.to_string()),
            (NEXT_SNAPSHOT, info.next_snapshot.to_string()),
            (MAINTENANCE, info.maintenance.to_string()),
            (FINAL, encode_bool(info.is_final)),
            (SKIP_TESTS, encode_bool(info.skip_tests)),
            (SKIP_ITS, encode_bool(info.skip_its)),
            (PROFILES, info.profiles.clone()),
            (OTHER_VERSIONS, info.other_versions.list()),
            (
                FILES_PATTERN,
                info.other_versions.files_pattern.clone().unwrap_or_default(),
            ),
            (
                PROPS_PATTERN,
                info.other_versions.props_pattern.clone().unwrap_or_default(),
            ),
            (MSG_COMMIT, info.msg_commit.clone()),
            (MSG_TAG, info.msg_tag.clone()),
            (AUTO_INCREMENT_POLICY, info.auto_increment_policy.to_string()),
            (DRY_RUN, encode_bool(info.dry_run)),
        ];

        let mut out = String::new();
        for (key, value) in values {
            if value.contains('\n') || value.contains('\r') {
                return Err(Error::ReleaseLog {
                    message: format!("value of {} spans several lines", key),
                    line: None,
                });
            }
            out.push_str(key);
            out.push('=');
            out.push_str(&value);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut entries: HashMap<&'static str, (usize, String)> = HashMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::release_log(line_no, format!("expected KEY=value, got '{}'", line)))?;
            let key = key.trim();
            let value = value.trim().to_string();
            match KEYS.iter().find(|k| **k == key) {
                Some(known) => {
                    if entries.insert(*known, (line_no, value)).is_some() {
                        return Err(Error::release_log(line_no, format!("duplicate key {}", key)));
                    }
                }
                None => warn!("Ignoring unknown release log key '{}' at line {}", key, line_no),
            }
        }

        let fields = Fields { entries };
        let remote_alias = fields.required(REMOTE)?;
        let branch = fields.required(BRANCH)?;
        let mut info = ReleaseInfo::new(remote_alias, branch);
        info.tag = fields.version_choice(TAG)?;
        info.next_snapshot = fields.version_choice(NEXT_SNAPSHOT)?;
        info.maintenance = Maintenance::parse(fields.get(MAINTENANCE));
        info.is_final = fields.boolean(FINAL)?;
        info.skip_tests = fields.boolean(SKIP_TESTS)?;
        info.skip_its = fields.boolean(SKIP_ITS)?;
        info.profiles = fields.get(PROFILES).to_string();
        info.other_versions = OtherVersions::from_parts(
            fields.get(FILES_PATTERN),
            fields.get(PROPS_PATTERN),
            fields.get(OTHER_VERSIONS),
        )
        .map_err(|e| fields.error(OTHER_VERSIONS, e.to_string()))?;
        info.msg_commit = fields.get(MSG_COMMIT).to_string();
        info.msg_tag = fields.get(MSG_TAG).to_string();
        info.auto_increment_policy = match fields.get(AUTO_INCREMENT_POLICY) {
            "" => IncrementPolicy::default(),
            value => value
                .parse::<IncrementPolicy>()
                .map_err(|e: String| fields.error(AUTO_INCREMENT_POLICY, e))?,
        };
        info.dry_run = fields.boolean(DRY_RUN)?;

        let snapshot = match fields.get(SNAPSHOT) {
            "" => None,
            value => Some(
                VersionIdentifier::parse(value)
                    .map_err(|e| fields.error(SNAPSHOT, e.to_string()))?
                    .to_string(),
            ),
        };
        Ok(Self {
            module: fields.get(MODULE).to_string(),
            snapshot,
            info,
        })
    }

    /// Writes the log next to `root` and returns its path.
    pub fn write(&self, root: &Path) -> Result<PathBuf> {
        let path = Self::path_for(root);
        fs::write(&path, self.encode()?)?;
        info!("Parameters stored in {}", path.display());
        Ok(path)
    }

    pub fn read(root: &Path) -> Result<Self> {
        let path = Self::path_for(root);
        info!("Reading parameters from {}", path.display());
        let text = fs::read_to_string(&path)?;
        Self::decode(&text)
    }
}

struct Fields {
    entries: HashMap<&'static str, (usize, String)>,
}

impl Fields {
    fn get(&self, key: &str) -> &str {
        self.entries.get(key).map(|(_, v)| v.as_str()).unwrap_or("")
    }

    fn required(&self, key: &str) -> Result<String> {
        match self.get(key) {
            "" => Err(Error::ReleaseLog {
                message: format!("missing value for {}", key),
                line: self.entries.get(key).map(|(line, _)| *line),
            }),
            value => Ok(value.to_string()),
        }
    }

    fn boolean(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            "True" => Ok(true),
            "False" | "" => Ok(false),
            other => Err(self.error(
                key,
                format!("invalid boolean '{}' for {} (expected True or False)", other, key),
            )),
        }
    }

    fn version_choice(&self, key: &str) -> Result<VersionChoice> {
        let choice = VersionChoice::parse(self.get(key));
        if let VersionChoice::Explicit(version) = &choice {
            VersionIdentifier::parse(version).map_err(|e| self.error(key, e.to_string()))?;
        }
        Ok(choice)
    }

    fn error(&self, key: &str, message: String) -> Error {
        Error::ReleaseLog {
            message,
            line: self.entries.get(key).map(|(line, _)| *line),
        }
    }
}

fn encode_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}
