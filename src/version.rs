//! # Version Identifiers and Increment Policies
//!
//! This module models the dotted numeric versions found in project
//! descriptors (`8.10`, `1.0.19`, `5.5.0-HF01-SNAPSHOT`) and implements the
//! two computations a release needs:
//!
//! - **Tag computation** (`compute_tag`): a final release drops the
//!   `-SNAPSHOT` marker; a dated pre-release replaces it with
//!   `-I<YYYYMMDD_HHMM>`.
//! - **Next snapshot computation** (`compute_next_snapshot`): after a final
//!   release, the version is bumped according to an `IncrementPolicy`.
//!
//! Versions are immutable values: every computation returns a new
//! `VersionIdentifier` and leaves its input untouched.
//!
//! Maven-style versions are not semver (`8.10` has two components, `29` one),
//! so this module does not use the `semver` crate.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Suffix marking a version under active development.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Layout of the timestamp embedded in dated pre-release tags.
pub const DATED_TAG_FORMAT: &str = "%Y%m%d_%H%M";

/// A parsed version: numeric components, optional qualifier, snapshot flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionIdentifier {
    components: Vec<Component>,
    qualifier: Option<String>,
    is_snapshot: bool,
}

/// One numeric field, with the zero-padded width it was written with
/// (`01` in `2016.01` has width 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Component {
    value: u64,
    width: usize,
}

impl Component {
    fn new(value: u64) -> Self {
        Self { value, width: 1 }
    }

    fn with_value(self, value: u64) -> Self {
        Self { value, ..self }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.value, width = self.width)
    }
}

impl VersionIdentifier {
    /// Parses a version string.
    ///
    /// The trailing `-SNAPSHOT` marker sets `is_snapshot`. What remains is
    /// split at the first `-`: the head must be dot-separated non-negative
    /// integers, the tail (if any) is kept verbatim as the qualifier.
    /// Zero-padded fields (`2016.01`) keep their width.
    pub fn parse(text: &str) -> Result<Self> {
        let (body, is_snapshot) = match text.strip_suffix(SNAPSHOT_SUFFIX) {
            Some(body) => (body, true),
            None => (text, false),
        };

        let (numeric, qualifier) = match body.split_once('-') {
            Some((numeric, qualifier)) => (numeric, Some(qualifier)),
            None => (body, None),
        };

        if numeric.is_empty() {
            return Err(Error::malformed_version(text, "no numeric component"));
        }

        let components = numeric
            .split('.')
            .map(|part| parse_component(text, part))
            .collect::<Result<Vec<Component>>>()?;

        let qualifier = match qualifier {
            Some("") => return Err(Error::malformed_version(text, "empty qualifier")),
            Some(q) => Some(q.to_string()),
            None => None,
        };

        Ok(Self {
            components,
            qualifier,
            is_snapshot,
        })
    }

    pub fn components(&self) -> Vec<u64> {
        self.components.iter().map(|c| c.value).collect()
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn is_snapshot(&self) -> bool {
        self.is_snapshot
    }

    /// Same version without the snapshot marker.
    pub fn release(&self) -> Self {
        Self {
            is_snapshot: false,
            ..self.clone()
        }
    }

    /// Same version with the snapshot marker.
    pub fn snapshot(&self) -> Self {
        Self {
            is_snapshot: true,
            ..self.clone()
        }
    }
}

fn parse_component(text: &str, part: &str) -> Result<Component> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::malformed_version(
            text,
            format!("'{}' is not a numeric component", part),
        ));
    }
    let value = part
        .parse::<u64>()
        .map_err(|e| Error::malformed_version(text, e.to_string()))?;
    Ok(Component {
        value,
        width: part.len(),
    })
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numeric: Vec<String> = self.components.iter().map(Component::to_string).collect();
        f.write_str(&numeric.join("."))?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, "-{}", qualifier)?;
        }
        if self.is_snapshot {
            f.write_str(SNAPSHOT_SUFFIX)?;
        }
        Ok(())
    }
}

impl FromStr for VersionIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// How the next snapshot is derived from a final release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementPolicy {
    /// Bump the last numeric field (or the qualifier's trailing number).
    #[default]
    AutoLast,
    /// Bump the third component, padding to three components.
    AutoPatch,
    /// Bump the second component.
    AutoMinor,
    /// Bump the first component.
    AutoMajor,
}

impl IncrementPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncrementPolicy::AutoLast => "auto_last",
            IncrementPolicy::AutoPatch => "auto_patch",
            IncrementPolicy::AutoMinor => "auto_minor",
            IncrementPolicy::AutoMajor => "auto_major",
        }
    }

    /// Index of the component bumped by the semantic policies.
    fn target_slot(&self) -> Option<usize> {
        match self {
            IncrementPolicy::AutoLast => None,
            IncrementPolicy::AutoMajor => Some(0),
            IncrementPolicy::AutoMinor => Some(1),
            IncrementPolicy::AutoPatch => Some(2),
        }
    }
}

impl fmt::Display for IncrementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncrementPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto_last" => Ok(IncrementPolicy::AutoLast),
            "auto_patch" => Ok(IncrementPolicy::AutoPatch),
            "auto_minor" => Ok(IncrementPolicy::AutoMinor),
            "auto_major" => Ok(IncrementPolicy::AutoMajor),
            other => Err(format!(
                "unknown increment policy '{}' (expected auto_last, auto_patch, auto_minor or auto_major)",
                other
            )),
        }
    }
}

/// Computes the release tag for `version`, using the current local time for
/// dated pre-releases.
pub fn compute_tag(version: &VersionIdentifier, is_final: bool) -> VersionIdentifier {
    compute_tag_at(version, is_final, Local::now().naive_local())
}

/// Computes the release tag for `version` as of `now`.
///
/// A final tag is the version without its snapshot marker. A dated tag
/// replaces the marker with `I<timestamp>`, appended to any qualifier. A
/// version that is not a snapshot is returned unchanged in both modes.
pub fn compute_tag_at(
    version: &VersionIdentifier,
    is_final: bool,
    now: NaiveDateTime,
) -> VersionIdentifier {
    if is_final || !version.is_snapshot {
        return version.release();
    }
    let stamp = format!("I{}", now.format(DATED_TAG_FORMAT));
    let qualifier = match &version.qualifier {
        Some(q) => format!("{}-{}", q, stamp),
        None => stamp,
    };
    VersionIdentifier {
        components: version.components.clone(),
        qualifier: Some(qualifier),
        is_snapshot: false,
    }
}

/// Computes the snapshot version to set after releasing `version`.
///
/// A non-final release keeps developing the same snapshot. A final release
/// bumps according to `policy`:
///
/// - `auto_last` bumps the trailing number of the qualifier when it has one
///   (`8.10-HF09` becomes `8.10-HF10`), else the last component, and keeps
///   both arity and qualifier.
/// - `auto_patch`, `auto_minor` and `auto_major` bump their slot of the
///   `major.minor.patch` triple, zero the slots after it, drop the qualifier,
///   and produce `clamp(arity, slot + 1, 3)` components: missing slots are
///   only padded up to the bumped one, and anything beyond patch is dropped.
pub fn compute_next_snapshot(
    version: &VersionIdentifier,
    is_final: bool,
    policy: IncrementPolicy,
) -> Result<VersionIdentifier> {
    if !is_final {
        return Ok(version.clone());
    }

    let next = match policy.target_slot() {
        None => increment_last(version)?,
        Some(slot) => increment_slot(version, slot)?,
    };
    Ok(next.snapshot())
}

fn increment_last(version: &VersionIdentifier) -> Result<VersionIdentifier> {
    if let Some(qualifier) = &version.qualifier {
        if let Some(bumped) = increment_trailing_number(qualifier) {
            return Ok(VersionIdentifier {
                components: version.components.clone(),
                qualifier: Some(bumped),
                is_snapshot: version.is_snapshot,
            });
        }
    }

    let mut components = version.components.clone();
    let last = components
        .last_mut()
        .ok_or_else(|| Error::malformed_version(version.to_string(), "no numeric component"))?;
    *last = last.with_value(checked_bump(version, last.value)?);
    Ok(VersionIdentifier {
        components,
        qualifier: version.qualifier.clone(),
        is_snapshot: version.is_snapshot,
    })
}

fn increment_slot(version: &VersionIdentifier, slot: usize) -> Result<VersionIdentifier> {
    if version.components.is_empty() {
        return Err(Error::malformed_version(
            version.to_string(),
            "no numeric component",
        ));
    }
    let arity = version.components.len().clamp(slot + 1, 3);
    let mut components: Vec<Component> = (0..arity)
        .map(|i| {
            version
                .components
                .get(i)
                .copied()
                .unwrap_or(Component::new(0))
        })
        .collect();
    let bumped = checked_bump(version, components[slot].value)?;
    components[slot] = components[slot].with_value(bumped);
    for component in components.iter_mut().skip(slot + 1) {
        *component = component.with_value(0);
    }
    Ok(VersionIdentifier {
        components,
        qualifier: None,
        is_snapshot: version.is_snapshot,
    })
}

fn checked_bump(version: &VersionIdentifier, value: u64) -> Result<u64> {
    value
        .checked_add(1)
        .ok_or_else(|| Error::malformed_version(version.to_string(), "component overflow"))
}

/// `HF01` -> `HF02`, `HF09` -> `HF10`, `RC99` -> `RC100`; `None` if there is
/// no trailing number.
fn increment_trailing_number(text: &str) -> Option<String> {
    let digits = text.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let (prefix, number) = text.split_at(text.len() - digits);
    let value: u64 = number.parse().ok()?;
    let bumped = value.checked_add(1)?;
    Some(format!("{}{:0width$}", prefix, bumped, width = digits))
}
