//! Operations on the vendor tree and its manifest.
//!
//! - **Fetching**: resolve a remote import path, vendor it and its imports
//! - **Restore**: rebuild `vendor/` from the manifest at pinned revisions
//! - **Management**: update, delete, freeze and purge recorded dependencies
//! - **Listing**: render manifest entries through a small template language
//!
//! ## Commands
//!
//! - `gvend fetch <importpath>` - Vendor a package and its dependencies
//! - `gvend restore` - Re-download everything listed in `vendor/manifest`
//! - `gvend update <importpath>` - Move a dependency to its branch tip
//! - `gvend delete <importpath>` - Remove a dependency
//! - `gvend list` - Show vendored dependencies
//! - `gvend purge` - Remove dependencies nothing imports

mod fetch;
mod list;
mod manage;
mod restore;

pub use fetch::{FetchOptions, Fetcher};
pub use list::{DEFAULT_FORMAT, list_dependencies, orphans, render};
pub use manage::{
    DeleteOptions, delete_dependencies, freeze_dependencies, purge_dependencies,
    update_dependencies,
};
pub use restore::{RestoreOptions, restore};

use crate::error::Result;
use crate::fileutils::{copy_license, copy_tree, remove_tree};
use crate::vcs::WorkingCopy;
use std::path::Path;

/// Replaces `dst` with the `subdir` of a working copy plus its root license files.
pub(crate) fn stage(
    dst: &Path,
    wc: &dyn WorkingCopy,
    subdir: &str,
    tests: bool,
    all: bool,
) -> Result<()> {
    remove_tree(dst)?;
    let src = wc.dir().join(subdir);
    copy_tree(dst, &src, tests, all)?;
    copy_license(dst, wc.dir())
}
