//! # gvend - Go dependency vendoring
//!
//! gvend copies remote Go packages into a project's `vendor/` directory and
//! records where each one came from in `vendor/manifest`, so the tree can be
//! rebuilt, updated or pruned later.
//!
//! ## Features
//!
//! - **Recursive Fetch**: Vendors a package together with every remote import it needs
//! - **Single-Flight Checkouts**: Each repository revision is checked out once per run
//! - **Reproducible Restore**: Rebuilds `vendor/` from the manifest at pinned revisions
//! - **Git, Mercurial, Bazaar, Subversion**: git via libgit2, the rest via their CLIs
//!
//! ## Quick Start
//!
//! ```bash
//! # Vendor a package and its dependencies
//! gvend fetch github.com/pkg/errors
//!
//! # Rebuild vendor/ on a fresh checkout
//! gvend restore
//! ```
//!
//! ## Module Organization
//!
//! - [`deps`] - Fetch, restore and manifest-editing operations
//! - [`downloader`] - Per-invocation checkout cache
//! - [`manifest`] - The `vendor/manifest` document
//! - [`vcs`] - Repository deduction and VCS backends
//! - [`imports`] - Go import scanning with vendor resolution

/// Project layout and `gvend.toml`.
pub mod config;

/// Fetch, update, delete, list, purge, freeze and restore.
pub mod deps;

/// Single-flight cache of working copies.
pub mod downloader;

/// Error type shared by the library.
pub mod error;

/// Copying and removing package trees.
pub mod fileutils;

/// Import graph closure.
pub mod graph;

/// Slash-separated import path helpers.
pub mod importpath;

/// Go import parsing and vendor lookup.
pub mod imports;

/// Vendor manifest (`vendor/manifest`).
pub mod manifest;

/// Terminal UI utilities.
pub mod ui;

/// Repositories, working copies and import path deduction.
pub mod vcs;

#[cfg(test)]
mod test_support;
