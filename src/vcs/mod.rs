//! Remote repositories and their working copies.
//!
//! [`RemoteRepo`] knows how to check out a revision; [`WorkingCopy`] is the
//! resulting directory. [`RepoResolver`] turns import paths into repositories
//! and is the seam the download cache memoises.
//!
//! ## Supported backends
//!
//! - `git` via libgit2
//! - `hg`, `bzr`, `svn` via their command-line tools

mod command;
mod deduce;
mod git;
mod meta;

pub use deduce::VcsResolver;
pub use meta::{MetaImport, parse_meta_go_imports};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Hg,
    Bzr,
    Svn,
}

impl VcsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Hg => "hg",
            VcsKind::Bzr => "bzr",
            VcsKind::Svn => "svn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "git" => Some(VcsKind::Git),
            "hg" => Some(VcsKind::Hg),
            "bzr" => Some(VcsKind::Bzr),
            "svn" => Some(VcsKind::Svn),
            _ => None,
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checked-out revision on local disk.
pub trait WorkingCopy: Send + Sync {
    fn dir(&self) -> &Path;
    fn revision(&self) -> Result<String>;
    /// Current branch name, or `HEAD` when detached.
    fn branch(&self) -> Result<String>;
    /// Deletes the checkout. Called once, when the cache is flushed.
    fn destroy(&self) -> Result<()>;
}

pub trait RemoteRepo: Send + Sync {
    fn url(&self) -> &str;
    fn kind(&self) -> VcsKind;
    /// Empty strings mean "not requested"; with all three empty the default branch tip is used.
    fn checkout(&self, branch: &str, tag: &str, revision: &str) -> Result<Box<dyn WorkingCopy>>;
}

pub trait RepoResolver: Send + Sync {
    /// Finds the repository for an import path, returning it with the path
    /// remainder inside the repository (no leading slash).
    fn deduce(&self, import_path: &str, insecure: bool) -> Result<(Arc<dyn RemoteRepo>, String)>;

    /// Opens a repository recorded in a manifest.
    fn open(&self, url: &str, kind: VcsKind, insecure: bool) -> Result<Arc<dyn RemoteRepo>>;
}

/// Creates the backend for a known URL and kind.
pub fn new_remote_repo(url: &str, kind: VcsKind) -> Arc<dyn RemoteRepo> {
    match kind {
        VcsKind::Git => Arc::new(git::GitRepo::new(url)),
        VcsKind::Hg => Arc::new(command::CommandRepo::new(url, command::Tool::Hg)),
        VcsKind::Bzr => Arc::new(command::CommandRepo::new(url, command::Tool::Bzr)),
        VcsKind::Svn => Arc::new(command::CommandRepo::new(url, command::Tool::Svn)),
    }
}

fn checkout_dir(kind: VcsKind) -> Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("gvend-{}-", kind.as_str()))
        .tempdir()
        .map_err(|e| crate::error::VendorError::fs(std::env::temp_dir(), e))
}
