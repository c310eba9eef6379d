//! Fetching remote packages into the vendor tree.
//!
//! A fetch runs as a session: the requested path is level 0, every remote
//! import discovered below it is fetched at the next level. Only the level-0
//! repository honours a requested branch, tag or revision; everything reached
//! transitively is taken at its default branch tip.
//!
//! Termination does not depend on the session's visited set: every fetched
//! path is in the manifest before its imports are examined, so a cycle ends
//! at the "already vendored" check.

use super::stage;
use crate::config::{Strategy, Workspace};
use crate::downloader::Downloader;
use crate::error::{Result, VendorError};
use crate::fileutils::{prune_empty_parents, remove_tree};
use crate::graph::{VendorGraph, find_missing, package_paths};
use crate::importpath::{is_within, looks_remote, strip_scheme};
use crate::imports::scan_imports;
use crate::manifest::{Dependency, Manifest};
use crate::vcs::WorkingCopy;
use colored::*;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub branch: String,
    pub tag: String,
    pub revision: String,
    pub no_recurse: bool,
    pub insecure: bool,
    pub tests: bool,
    pub all: bool,
}

impl FetchOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.tag.is_empty() && !self.revision.is_empty() {
            return Err(VendorError::user("cannot specify both a tag and a revision"));
        }
        Ok(())
    }
}

/// Per-invocation state threaded through the recursion.
struct Session<'o> {
    opts: &'o FetchOptions,
    /// Repository of the level-0 path; only it gets the requested pins.
    root_repo: Option<String>,
    fetched: BTreeSet<String>,
}

impl<'o> Session<'o> {
    fn new(opts: &'o FetchOptions) -> Self {
        Self {
            opts,
            root_repo: None,
            fetched: BTreeSet::new(),
        }
    }

    fn covers(&self, path: &str) -> bool {
        self.fetched.iter().any(|f| is_within(path, f))
    }
}

/// A freshly staged dependency and the checkout it came from.
struct Staged {
    dep: Dependency,
    wc: Arc<dyn WorkingCopy>,
}

pub struct Fetcher<'a> {
    ws: &'a Workspace,
    dl: &'a Downloader,
}

impl<'a> Fetcher<'a> {
    pub fn new(ws: &'a Workspace, dl: &'a Downloader) -> Self {
        Self { ws, dl }
    }

    /// Fetches `path` and, unless disabled, everything it imports that is missing.
    pub fn fetch(&self, path: &str, opts: &FetchOptions) -> Result<()> {
        opts.validate()?;
        let mut session = Session::new(opts);
        match self.ws.config.fetch.strategy {
            Strategy::DepthFirst => self.fetch_recursive(&mut session, path, 0),
            Strategy::Closure => self.fetch_closure(&mut session, path),
        }
    }

    /// Fetches the missing remote imports of an already staged dependency.
    ///
    /// Used after `update` replaced a dependency's files; everything found
    /// is fetched at the default branch tip.
    pub fn fetch_imports(
        &self,
        dep: &Dependency,
        wc: Arc<dyn WorkingCopy>,
        opts: &FetchOptions,
    ) -> Result<()> {
        let mut session = Session::new(opts);
        session.fetched.insert(dep.importpath.clone());
        let staged = Staged {
            dep: dep.clone(),
            wc,
        };
        self.recurse(&mut session, &staged, 0)
    }

    fn fetch_recursive(&self, session: &mut Session, path: &str, level: usize) -> Result<()> {
        match self.fetch_one(session, path, level)? {
            Some(staged) if !session.opts.no_recurse => self.recurse(session, &staged, level),
            _ => Ok(()),
        }
    }

    fn recurse(&self, session: &mut Session, staged: &Staged, level: usize) -> Result<()> {
        let dep = &staged.dep;
        let root_importpath = dep.root_importpath()?;
        let src = staged.wc.dir().join(dep.subdir());
        let imports = scan_imports(
            &src,
            staged.wc.dir(),
            &root_importpath,
            !dep.notests,
            dep.allfiles,
        )?;

        for imp in imports {
            if !looks_remote(&imp, self.ws.local_prefixes()) {
                log::debug!("{imp} looks local, not fetching");
                continue;
            }
            self.fetch_recursive(session, &imp, level + 1)
                .map_err(|e| e.within(&imp))?;
        }
        Ok(())
    }

    /// Repeatedly fetches the smallest import path missing from the vendor graph.
    fn fetch_closure(&self, session: &mut Session, path: &str) -> Result<()> {
        if self.fetch_one(session, path, 0)?.is_none() || session.opts.no_recurse {
            return Ok(());
        }
        let roots = package_paths(&self.ws.vendor_dir, &strip_scheme(path), session.opts.tests)?;
        let mut satisfied = HashSet::new();
        let mut attempted = HashSet::new();
        loop {
            let manifest = Manifest::read(&self.ws.manifest_file)?;
            let graph = VendorGraph::new(
                &self.ws.vendor_dir,
                &manifest,
                self.ws.local_prefixes(),
                session.opts.tests,
            );
            let missing = find_missing(&roots, &graph, &mut satisfied)?;
            let Some(next) = missing.into_iter().next() else {
                return Ok(());
            };
            if !attempted.insert(next.clone()) {
                return Err(VendorError::RepositoryResolution {
                    path: next.clone(),
                    reason: "no Go package at this path after fetching its repository".into(),
                }
                .within(&next));
            }
            self.fetch_one(session, &next, 1)
                .map_err(|e| e.within(&next))?;
        }
    }

    /// Fetches and stages one path without looking at its imports.
    ///
    /// Returns `None` when the path is skipped because it is already covered.
    fn fetch_one(&self, session: &mut Session, raw: &str, level: usize) -> Result<Option<Staged>> {
        let opts = session.opts;
        let path = strip_scheme(raw);

        if session.covers(&path) {
            log::debug!("{path} already fetched in this session");
            return Ok(None);
        }

        let mut manifest = Manifest::read_or_default(&self.ws.manifest_file)?;
        if let Some(provider) = manifest.find_provider(&path) {
            if level == 0 {
                return Err(VendorError::AlreadyVendored(path));
            }
            log::debug!("{path} is provided by {}", provider.importpath);
            return Ok(None);
        }

        if is_within(&path, &self.ws.import_path) {
            if level == 0 {
                return Err(VendorError::user(format!(
                    "refusing to vendor {path}: it is part of {}",
                    self.ws.import_path
                )));
            }
            log::debug!("{path} belongs to the project, skipping");
            return Ok(None);
        }

        self.remove_subpackages(session, &mut manifest, &path)?;

        let (repo, extra) = self.dl.deduce_remote_repo(raw, opts.insecure)?;
        if level == 0 {
            session.root_repo = Some(repo.url().to_string());
        }
        let pinned = session.root_repo.as_deref() == Some(repo.url());
        let wc = if pinned {
            self.dl
                .acquire(repo.as_ref(), &opts.branch, &opts.tag, &opts.revision)?
        } else {
            self.dl.acquire(repo.as_ref(), "", "", "")?
        };

        println!("{} Fetching {}", "📦".blue(), path.bold());
        let dep = Dependency {
            importpath: path.clone(),
            repository: repo.url().to_string(),
            vcs: repo.kind(),
            revision: wc.revision()?,
            branch: wc.branch()?,
            path: if extra.is_empty() {
                String::new()
            } else {
                format!("/{extra}")
            },
            notests: !opts.tests,
            allfiles: opts.all,
        };
        manifest.add_dependency(dep.clone())?;

        let dst = self.ws.vendor_dir.join(&path);
        stage(&dst, wc.as_ref(), dep.subdir(), opts.tests, opts.all)?;
        manifest.write(&self.ws.manifest_file)?;
        println!(
            "   {} {} @ {}",
            "✓".green(),
            path,
            short_revision(&dep.revision)
        );

        session.fetched.insert(path);
        Ok(Some(Staged { dep, wc }))
    }

    /// Drops vendored subpackages of `path`; fetching the parent supersedes them.
    fn remove_subpackages(
        &self,
        session: &Session,
        manifest: &mut Manifest,
        path: &str,
    ) -> Result<()> {
        let subs = manifest.get_subpackages(path);
        if subs.is_empty() {
            return Ok(());
        }
        for sub in &subs {
            if !session.fetched.contains(&sub.importpath) {
                println!(
                    "{} Removing {}: superseded by {}",
                    "!".yellow(),
                    sub.importpath,
                    path
                );
            }
            manifest.remove_dependency(sub)?;
        }
        manifest.write(&self.ws.manifest_file)?;

        for sub in &subs {
            let dir = self.ws.vendor_dir.join(&sub.importpath);
            remove_tree(&dir)?;
            prune_empty_parents(&dir, &self.ws.vendor_dir);
        }
        Ok(())
    }
}

pub(crate) fn short_revision(rev: &str) -> &str {
    rev.get(..12).unwrap_or(rev)
}
