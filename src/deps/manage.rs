//! Update, delete, freeze and purge of recorded dependencies.
//!
//! Each operation edits the manifest in memory and writes it once its unit
//! of work is done. Where directories are removed, the manifest is written
//! first, so an interrupted run leaves files without a record rather than a
//! record without files.

use super::fetch::short_revision;
use super::{FetchOptions, Fetcher, stage};
use crate::config::Workspace;
use crate::downloader::Downloader;
use crate::error::{Result, VendorError};
use crate::fileutils::{prune_empty_parents, remove_tree};
use crate::importpath::is_within;
use crate::imports::{scan_imports, scan_project_imports, strip_vendor};
use crate::manifest::{Dependency, Manifest};
use colored::*;
use std::collections::{BTreeMap, BTreeSet};

fn select_one(manifest: &Manifest, path: &str, verb: &str) -> Result<Dependency> {
    let path = path.trim_end_matches('/');
    match manifest.get_dependency_for_importpath(path) {
        Ok(dep) => Ok(dep),
        Err(err) => match manifest.find_provider(path) {
            Some(parent) => Err(VendorError::user(format!(
                "a parent of {path} is vendored, {verb} {} instead",
                parent.importpath
            ))),
            None => Err(err),
        },
    }
}

fn check_target(cmd: &str, path: Option<&str>, all: bool) -> Result<()> {
    match (path, all) {
        (None, false) => Err(VendorError::user(format!(
            "{cmd}: import path or --all flag is missing"
        ))),
        (Some(_), true) => Err(VendorError::user(format!(
            "{cmd}: you cannot specify path and --all flag at once"
        ))),
        _ => Ok(()),
    }
}

fn remove_dirs(ws: &Workspace, deps: &[Dependency]) -> Result<()> {
    for dep in deps {
        let dir = ws.vendor_dir.join(&dep.importpath);
        remove_tree(&dir)?;
        prune_empty_parents(&dir, &ws.vendor_dir);
    }
    Ok(())
}

/// Moves dependencies to the tip of their recorded branch.
///
/// Frozen dependencies are left alone. `opts` supplies `insecure` and
/// `no_recurse`; the file selection flags come from each record.
pub fn update_dependencies(
    ws: &Workspace,
    dl: &Downloader,
    path: Option<&str>,
    all: bool,
    opts: &FetchOptions,
) -> Result<()> {
    check_target("update", path, all)?;
    let manifest = Manifest::read(&ws.manifest_file)?;
    let targets: Vec<String> = match path {
        Some(p) => vec![select_one(&manifest, p, "update")?.importpath],
        None => manifest
            .dependencies
            .iter()
            .map(|d| d.importpath.clone())
            .collect(),
    };

    let fetcher = Fetcher::new(ws, dl);
    for importpath in targets {
        // recursion below may have rewritten the manifest
        let mut manifest = Manifest::read(&ws.manifest_file)?;
        let Ok(old) = manifest.get_dependency_for_importpath(&importpath) else {
            log::debug!("{importpath} disappeared during update");
            continue;
        };
        if old.is_frozen() {
            println!(
                "{} {} is frozen at {}, skipping",
                "!".yellow(),
                importpath,
                short_revision(&old.revision)
            );
            continue;
        }

        manifest.remove_dependency(&old)?;
        let repo = dl.open_remote_repo(&old.repository, old.vcs, opts.insecure)?;
        let wc = dl.acquire(repo.as_ref(), &old.branch, "", "")?;
        let dep = Dependency {
            revision: wc.revision()?,
            branch: wc.branch()?,
            repository: repo.url().to_string(),
            vcs: repo.kind(),
            ..old.clone()
        };

        let dst = ws.vendor_dir.join(&dep.importpath);
        stage(&dst, wc.as_ref(), dep.subdir(), !dep.notests, dep.allfiles)?;
        manifest.add_dependency(dep.clone())?;
        manifest.write(&ws.manifest_file)?;

        if old.revision == dep.revision {
            println!("   {} {} is up to date", "✓".green(), importpath);
        } else {
            println!(
                "   {} {} {} -> {}",
                "✓".green(),
                importpath.bold(),
                short_revision(&old.revision),
                short_revision(&dep.revision)
            );
        }

        if !opts.no_recurse {
            let recurse_opts = FetchOptions {
                insecure: opts.insecure,
                tests: !dep.notests,
                all: dep.allfiles,
                ..Default::default()
            };
            fetcher
                .fetch_imports(&dep, wc, &recurse_opts)
                .map_err(|e| e.within(&importpath))?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    pub all: bool,
    /// Also remove every dependency below the path.
    pub recurse: bool,
}

pub fn delete_dependencies(
    ws: &Workspace,
    path: Option<&str>,
    opts: DeleteOptions,
) -> Result<Vec<Dependency>> {
    check_target("delete", path, opts.all)?;
    let mut manifest = Manifest::read(&ws.manifest_file)?;

    let doomed = match path.map(|p| p.trim_end_matches('/')) {
        None => manifest.dependencies.clone(),
        Some(p) if opts.recurse => {
            let subs = manifest.get_subpackages(p);
            if subs.is_empty() {
                return Err(VendorError::DependencyNotFound(format!("{p}/...")));
            }
            subs
        }
        Some(p) => vec![select_one(&manifest, p, "remove")?],
    };

    for dep in &doomed {
        manifest.remove_dependency(dep)?;
    }
    manifest.write(&ws.manifest_file)?;
    remove_dirs(ws, &doomed)?;

    for dep in &doomed {
        println!("{} Removed {}", "🗑️".red(), dep.importpath.bold());
    }
    Ok(doomed)
}

/// Pins dependencies so `update` skips them.
pub fn freeze_dependencies(ws: &Workspace, path: Option<&str>, all: bool) -> Result<()> {
    check_target("freeze", path, all)?;
    let mut manifest = Manifest::read(&ws.manifest_file)?;
    let selected = match path {
        Some(p) => vec![select_one(&manifest, p, "freeze")?],
        None => manifest.dependencies.clone(),
    };

    for dep in selected {
        if dep.branch == "HEAD" {
            continue;
        }
        manifest.remove_dependency(&dep)?;
        println!(
            "{} {} frozen at {}",
            "📌".blue(),
            dep.importpath,
            short_revision(&dep.revision)
        );
        manifest.add_dependency(Dependency {
            branch: "HEAD".to_string(),
            ..dep
        })?;
    }
    manifest.write(&ws.manifest_file)
}

/// Removes dependencies that nothing in the project needs.
///
/// A dependency is needed when a project file, or another needed
/// dependency, imports it or one of its subpackages. Imports of a
/// dependency's own packages do not count.
pub fn purge_dependencies(ws: &Workspace) -> Result<Vec<Dependency>> {
    let mut manifest = Manifest::read(&ws.manifest_file)?;
    let project: Vec<String> = scan_project_imports(&ws.root, &ws.import_path, true)?
        .iter()
        .map(|i| strip_vendor(i).to_string())
        .collect();

    let mut imports_of: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for dep in &manifest.dependencies {
        let dir = ws.vendor_dir.join(&dep.importpath);
        let found = if dir.is_dir() {
            scan_imports(&dir, &ws.root, &ws.import_path, true, true)?
                .iter()
                .map(|i| strip_vendor(i).to_string())
                .collect()
        } else {
            Vec::new()
        };
        imports_of.insert(dep.importpath.clone(), found);
    }

    let mut kept: BTreeSet<String> = imports_of.keys().cloned().collect();
    loop {
        let unused: Vec<String> = kept
            .iter()
            .filter(|d| {
                let by_project = project.iter().any(|i| is_within(i, d));
                let by_dep = kept
                    .iter()
                    .filter(|other| other != d)
                    .filter_map(|other| imports_of.get(other))
                    .flatten()
                    .any(|i| is_within(i, d));
                !by_project && !by_dep
            })
            .cloned()
            .collect();
        if unused.is_empty() {
            break;
        }
        for d in &unused {
            kept.remove(d);
        }
    }

    let doomed: Vec<Dependency> = manifest
        .dependencies
        .iter()
        .filter(|d| !kept.contains(&d.importpath))
        .cloned()
        .collect();
    if doomed.is_empty() {
        println!("{} Nothing to purge.", "✓".green());
        return Ok(doomed);
    }
    for dep in &doomed {
        manifest.remove_dependency(dep)?;
    }
    manifest.write(&ws.manifest_file)?;
    remove_dirs(ws, &doomed)?;
    for dep in &doomed {
        println!("{} Purged {}", "🗑️".red(), dep.importpath.bold());
    }
    Ok(doomed)
}
