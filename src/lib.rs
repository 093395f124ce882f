//! # Release Tree Library
//!
//! Releases a product made of a root repository plus module and addon
//! repositories, all released together under one version label. It is
//! designed to be used by the `release-tree` command-line tool but the
//! orchestration is reusable with other VCS or descriptor backends.
//!
//! ## Quick Example
//!
//! ```
//! use release_tree::release_info::ReleaseInfo;
//! use release_tree::version::VersionIdentifier;
//! use chrono::NaiveDate;
//!
//! let current = VersionIdentifier::parse("8.10-SNAPSHOT").unwrap();
//! let mut info = ReleaseInfo::new("origin", "8.10");
//! info.is_final = true;
//!
//! let now = NaiveDate::from_ymd_opt(2016, 11, 2).unwrap().and_hms_opt(9, 30, 0).unwrap();
//! let release = info.resolve_at(&current, now).unwrap();
//! assert_eq!(release.tag_name(), "release-8.10");
//! assert_eq!(release.next_snapshot, "8.11-SNAPSHOT");
//! assert_eq!(release.maintenance_branch, "8.10.0");
//! ```
//!
//! ## Core Concepts
//!
//! - **Versions (`version`)**: parsing, tag computation and next-snapshot
//!   increment policies.
//! - **Remote (`remote`)**: the root remote and the URLs of sibling
//!   repositories derived from it.
//! - **Commands (`command`, `retry`, `git`, `hg`)**: external VCS commands,
//!   with bounded retries for network operations.
//! - **Resolution (`resolver`)**: which tag or branch each repository checks
//!   out, falling back to its default branch with a warning.
//! - **Tree (`discovery`, `repository`)**: module and addon discovery from
//!   the root descriptor, and passes over the whole repository set.
//! - **Release (`release_info`, `release_log`, `orchestrator`)**: release
//!   parameters, their persisted form, and the prepare / perform /
//!   maintenance operations.
//!
//! ## Execution Flow
//!
//! 1.  **Root**: the root repository is cloned or updated onto the label.
//! 2.  **Resolve**: the root descriptor gives the current version, from which
//!     tag, next snapshot and maintenance branch are fixed.
//! 3.  **Summary**: the release is logged and stored in the release log.
//! 4.  **Tree**: modules, then addons, are brought onto the label.
//! 5.  **Tag**: every repository is versioned, committed and tagged.
//! 6.  **Perform**: branches and tags are pushed.

pub mod command;
pub mod config;
pub mod defaults;
pub mod discovery;
pub mod error;
pub mod git;
pub mod hg;
pub mod mock;
pub mod orchestrator;
pub mod output;
pub mod path_scope;
pub mod release_info;
pub mod release_log;
pub mod remote;
pub mod repository;
pub mod resolver;
pub mod retry;
pub mod version;
