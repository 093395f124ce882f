//! Remote alias resolution and per-module URL derivation.
//!
//! Every repository of a release tree lives next to the root repository on
//! the same host. Instead of configuring one URL per module, the URL of a
//! module is derived from the root's remote by swapping the root repository
//! name for the module name.

use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};

/// One configured remote of a repository (`git remote -v`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

impl Remote {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// The resolved location of the root repository's remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteRef {
    alias: String,
    base_url: String,
    legacy_base_url: Option<String>,
}

impl RemoteRef {
    /// Finds `alias` among `remotes`.
    ///
    /// There is no fuzzy matching: a missing alias is a configuration error
    /// and aborts the run before any repository is touched.
    pub fn resolve(alias: &str, remotes: &[Remote]) -> Result<Self> {
        remotes
            .iter()
            .find(|remote| remote.name == alias)
            .map(|remote| Self {
                alias: alias.to_string(),
                base_url: remote.url.clone(),
                legacy_base_url: None,
            })
            .ok_or_else(|| Error::RemoteAliasNotFound {
                alias: alias.to_string(),
                available: remotes.iter().map(|r| r.name.clone()).collect(),
            })
    }

    /// Sets the base URL used for addons still hosted on the legacy VCS.
    pub fn with_legacy_base(mut self, legacy_base_url: Option<String>) -> Self {
        self.legacy_base_url = legacy_base_url;
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the repository named `module`.
    ///
    /// Hosted remotes (`https://host/org/root.git`, `git@host:org/root.git`)
    /// get their last path segment replaced, keeping a `.git` suffix if the
    /// root URL had one. On-disk or otherwise opaque remotes get the module
    /// appended as a sub-path.
    pub fn module_url(&self, module: &str) -> String {
        derive_module_url(&self.base_url, module)
    }

    /// URL of the legacy-VCS repository named `module`.
    ///
    /// Without a configured legacy base, the modern remote layout is assumed.
    pub fn legacy_url(&self, module: &str) -> String {
        match &self.legacy_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), module),
            None => self.module_url(module),
        }
    }
}

fn derive_module_url(base_url: &str, module: &str) -> String {
    if let Some(url) = hosted_url(base_url) {
        return replace_last_segment_of_url(url, module);
    }
    if let Some((host, path)) = scp_like(base_url) {
        return format!("{}:{}", host, replace_last_segment(path, module));
    }
    format!("{}/{}", base_url.trim_end_matches('/'), module)
}

/// A parsed URL with a network host; `file://` and bare paths do not count.
fn hosted_url(base_url: &str) -> Option<Url> {
    let url = Url::parse(base_url).ok()?;
    if url.scheme() == "file" || url.host_str().is_none() {
        return None;
    }
    Some(url)
}

fn replace_last_segment_of_url(mut url: Url, module: &str) -> String {
    let path = replace_last_segment(url.path(), module);
    url.set_path(&path);
    url.to_string()
}

/// `user@host:org/root.git` -> (`user@host`, `org/root.git`)
fn scp_like(base_url: &str) -> Option<(&str, &str)> {
    if base_url.contains("://") || base_url.starts_with('/') || base_url.starts_with('.') {
        return None;
    }
    let (host, path) = base_url.split_once(':')?;
    // A single-letter "host" is a Windows drive letter, not a remote.
    if host.len() <= 1 || host.contains('/') || path.is_empty() {
        return None;
    }
    Some((host, path))
}

fn replace_last_segment(path: &str, module: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let (parent, last) = match trimmed.rsplit_once('/') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, trimmed),
    };
    let suffix = if last.ends_with(".git") { ".git" } else { "" };
    match parent {
        Some(parent) => format!("{}/{}{}", parent, module, suffix),
        None => format!("{}{}", module, suffix),
    }
}
