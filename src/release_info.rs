//! Release parameters.
//!
//! `ReleaseInfo` is what the operator asked for: a branch, and a tag, next
//! snapshot and maintenance version that may each be left to `auto`.
//! `ReleaseInfo::resolve_at` turns it into a `ResolvedRelease` where every
//! `auto` has been computed from the current version. The resolved values
//! are frozen before any repository is mutated and are what the release log
//! persists, so a re-run reads back exactly the same release.

use std::fmt;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::{Error, Result};
use crate::version::{compute_next_snapshot, compute_tag_at, IncrementPolicy, VersionIdentifier};

/// Keyword selecting the computed value of a version parameter.
pub const AUTO: &str = "auto";

/// Keyword for "delete the maintenance branch after tagging".
pub const DISCARD: &str = "discard";

/// Tag name prefix; a release `5.6` is tagged `release-5.6`.
pub const TAG_PREFIX: &str = "release-";

/// Files whose content may carry versions to replace.
pub const DEFAULT_FILES_PATTERN: &str = r"^.*\.(xml|properties|txt|defaults|sh|html|nxftl)$";

/// POM properties holding versions to replace.
pub const DEFAULT_PROPS_PATTERN: &str = r"(nuxeo|marketplace)\..*version";

const SUMMARY_WIDTH: usize = 25;

/// A version parameter: computed, or given by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionChoice {
    #[default]
    Auto,
    Explicit(String),
}

impl VersionChoice {
    /// `auto` and the empty string both select the computed value.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == AUTO {
            VersionChoice::Auto
        } else {
            VersionChoice::Explicit(value.to_string())
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, VersionChoice::Auto)
    }
}

impl fmt::Display for VersionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionChoice::Auto => f.write_str(AUTO),
            VersionChoice::Explicit(v) => f.write_str(v),
        }
    }
}

/// What happens to the maintenance branch after tagging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Maintenance {
    /// The branch is deleted.
    #[default]
    Discard,
    /// The branch is kept and moved to this version.
    Version(String),
}

impl Maintenance {
    /// `discard`, the empty string and the legacy `auto` all discard.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == DISCARD || value == AUTO {
            Maintenance::Discard
        } else {
            Maintenance::Version(value.to_string())
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Maintenance::Discard => None,
            Maintenance::Version(v) => Some(v),
        }
    }
}

impl fmt::Display for Maintenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Maintenance::Discard => f.write_str(DISCARD),
            Maintenance::Version(v) => f.write_str(v),
        }
    }
}

/// One `old/new[/next]` entry of the additional version replacements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReplacement {
    pub old: String,
    /// Replaces `old` on the released code
    pub new: String,
    /// Replaces `old` on the branch after the release
    pub next: Option<String>,
}

impl fmt::Display for VersionReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.old, self.new)?;
        if let Some(next) = &self.next {
            write!(f, "/{}", next)?;
        }
        Ok(())
    }
}

/// Additional versions to replace, with optional custom file and property
/// patterns (`[files:props:]old/new[/next],...`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OtherVersions {
    pub files_pattern: Option<String>,
    pub props_pattern: Option<String>,
    pub replacements: Vec<VersionReplacement>,
}

impl OtherVersions {
    /// Parses the `--arv` syntax.
    ///
    /// Either a bare replacement list, or three `:`-separated fields where
    /// the first two are optional regular expressions. Each replacement has
    /// two or three non-empty `/`-separated parts.
    pub fn parse(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split(':').collect();
        let (files, props, list) = match fields.as_slice() {
            [list] => ("", "", *list),
            [files, props, list] => (*files, *props, *list),
            _ => {
                return Err(Error::InvalidOtherVersions {
                    value: value.to_string(),
                    message: "expected 'old/new[/next],...' optionally prefixed by 'files:props:'"
                        .to_string(),
                })
            }
        };
        Ok(Self {
            files_pattern: validated_pattern(value, files)?,
            props_pattern: validated_pattern(value, props)?,
            replacements: parse_replacements(value, list)?,
        })
    }

    /// Assembles the value from its separately stored parts.
    pub fn from_parts(files_pattern: &str, props_pattern: &str, list: &str) -> Result<Self> {
        let value = format!("{}:{}:{}", files_pattern, props_pattern, list);
        Ok(Self {
            files_pattern: validated_pattern(&value, files_pattern)?,
            props_pattern: validated_pattern(&value, props_pattern)?,
            replacements: parse_replacements(&value, list)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.files_pattern.is_none() && self.props_pattern.is_none() && self.replacements.is_empty()
    }

    /// The replacement list alone, `old/new[/next]` joined by `,`.
    pub fn list(&self) -> String {
        self.replacements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// File names eligible for replacement: the default pattern or the custom one.
    pub fn files_regex(&self) -> Result<Regex> {
        combined_regex(DEFAULT_FILES_PATTERN, self.files_pattern.as_deref())
    }

    /// Property names eligible for replacement.
    pub fn props_regex(&self) -> Result<Regex> {
        combined_regex(DEFAULT_PROPS_PATTERN, self.props_pattern.as_deref())
    }
}

impl fmt::Display for OtherVersions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.files_pattern.is_some() || self.props_pattern.is_some() {
            write!(
                f,
                "{}:{}:",
                self.files_pattern.as_deref().unwrap_or_default(),
                self.props_pattern.as_deref().unwrap_or_default()
            )?;
        }
        f.write_str(&self.list())
    }
}

fn validated_pattern(value: &str, pattern: &str) -> Result<Option<String>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern).map_err(|e| Error::InvalidOtherVersions {
        value: value.to_string(),
        message: format!("bad pattern '{}': {}", pattern, e),
    })?;
    Ok(Some(pattern.to_string()))
}

fn parse_replacements(value: &str, list: &str) -> Result<Vec<VersionReplacement>> {
    if list.is_empty() {
        return Ok(Vec::new());
    }
    list.split(',')
        .map(|entry| {
            let parts: Vec<&str> = entry.split('/').collect();
            if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
                return Err(Error::InvalidOtherVersions {
                    value: value.to_string(),
                    message: format!("'{}' is not of the form old/new[/next]", entry),
                });
            }
            Ok(VersionReplacement {
                old: parts[0].to_string(),
                new: parts[1].to_string(),
                next: parts.get(2).map(|p| p.to_string()),
            })
        })
        .collect()
}

fn combined_regex(default: &str, custom: Option<&str>) -> Result<Regex> {
    let pattern = match custom {
        Some(custom) => format!("({})|({})", default, custom),
        None => default.to_string(),
    };
    Ok(Regex::new(&pattern)?)
}

/// Release parameters as given by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub remote_alias: String,
    pub branch: String,
    pub tag: VersionChoice,
    pub next_snapshot: VersionChoice,
    pub maintenance: Maintenance,
    pub is_final: bool,
    pub auto_increment_policy: IncrementPolicy,
    pub skip_tests: bool,
    pub skip_its: bool,
    /// Comma-separated build profiles, passed through to the build
    pub profiles: String,
    pub other_versions: OtherVersions,
    pub msg_commit: String,
    pub msg_tag: String,
    pub dry_run: bool,
}

impl ReleaseInfo {
    /// Parameters releasing `branch` from `remote_alias`, everything else default.
    pub fn new(remote_alias: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote_alias: remote_alias.into(),
            branch: branch.into(),
            tag: VersionChoice::Auto,
            next_snapshot: VersionChoice::Auto,
            maintenance: Maintenance::Discard,
            is_final: false,
            auto_increment_policy: IncrementPolicy::default(),
            skip_tests: false,
            skip_its: false,
            profiles: String::new(),
            other_versions: OtherVersions::default(),
            msg_commit: String::new(),
            msg_tag: String::new(),
            dry_run: false,
        }
    }

    /// Computes every `auto` value from the `current` version as of `now`.
    pub fn resolve_at(
        &self,
        current: &VersionIdentifier,
        now: NaiveDateTime,
    ) -> Result<ResolvedRelease> {
        let tag = match &self.tag {
            VersionChoice::Auto => compute_tag_at(current, self.is_final, now).to_string(),
            VersionChoice::Explicit(tag) => VersionIdentifier::parse(tag)?.to_string(),
        };
        let next_snapshot = match &self.next_snapshot {
            VersionChoice::Auto => {
                compute_next_snapshot(current, self.is_final, self.auto_increment_policy)?
                    .to_string()
            }
            VersionChoice::Explicit(next) => VersionIdentifier::parse(next)?.to_string(),
        };
        if let Maintenance::Version(version) = &self.maintenance {
            VersionIdentifier::parse(version)?;
        }
        let maintenance_branch = maintenance_branch(&tag, &self.branch);
        Ok(ResolvedRelease {
            info: ReleaseInfo {
                tag: VersionChoice::Explicit(tag.clone()),
                next_snapshot: VersionChoice::Explicit(next_snapshot.clone()),
                ..self.clone()
            },
            snapshot: current.to_string(),
            tag,
            next_snapshot,
            maintenance_branch,
        })
    }
}

/// The maintenance branch is named after the tag, made distinct from the
/// release branch when they would collide.
pub fn maintenance_branch(tag: &str, branch: &str) -> String {
    if tag == branch {
        format!("{}.0", tag)
    } else {
        tag.to_string()
    }
}

/// `message: additional` when both are set, else whichever is set.
pub fn compose_message(message: &str, additional: &str) -> String {
    let message = message.trim();
    let additional = additional.trim();
    match (message.is_empty(), additional.is_empty()) {
        (false, false) => format!("{}: {}", message, additional),
        (false, true) => message.to_string(),
        _ => additional.to_string(),
    }
}

/// A release whose tag, next snapshot and maintenance branch are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    /// Parameters, with `tag` and `next_snapshot` made explicit
    pub info: ReleaseInfo,
    /// Version found in the root descriptor before release
    pub snapshot: String,
    pub tag: String,
    pub next_snapshot: String,
    pub maintenance_branch: String,
}

impl ResolvedRelease {
    /// `release-<tag>`
    pub fn tag_name(&self) -> String {
        format!("{}{}", TAG_PREFIX, self.tag)
    }

    pub fn commit_message(&self, additional: &str) -> String {
        compose_message(&self.info.msg_commit, additional)
    }

    /// The tag message prefix falls back to the commit one.
    pub fn tag_message(&self, additional: &str) -> String {
        let prefix = if self.info.msg_tag.trim().is_empty() {
            &self.info.msg_commit
        } else {
            &self.info.msg_tag
        };
        compose_message(prefix, additional)
    }

    /// Human-readable recap printed before anything is changed.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            summary_line("Releasing from branch:", &self.info.branch),
            summary_line("Current version:", &self.snapshot),
            summary_line("Tag:", &self.tag_name()),
            summary_line("Next version:", &self.next_snapshot),
        ];
        match &self.info.maintenance {
            Maintenance::Discard => lines.push("Maintenance branch deleted".to_string()),
            Maintenance::Version(version) => {
                lines.push(summary_line("Maintenance branch:", &self.maintenance_branch));
                lines.push(summary_line("Maintenance version:", version));
            }
        }
        if self.info.skip_tests {
            lines.push("Tests execution is skipped".to_string());
        } else if self.info.skip_its {
            lines.push("Integration Tests execution is skipped".to_string());
        }
        lines.extend(other_versions_lines(&self.info.other_versions));
        lines.join("\n")
    }
}

pub(crate) fn summary_line(label: &str, value: &str) -> String {
    format!("{:<width$}{}", label, value, width = SUMMARY_WIDTH)
}

pub(crate) fn other_versions_lines(other: &OtherVersions) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(files) = &other.files_pattern {
        lines.push(summary_line("Custom files pattern:", files));
    }
    if let Some(props) = &other.props_pattern {
        lines.push(summary_line("Custom props pattern:", props));
    }
    for replacement in &other.replacements {
        lines.push(summary_line(
            "Also replace version:",
            &replacement.to_string(),
        ));
    }
    lines
}
