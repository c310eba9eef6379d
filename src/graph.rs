//! Import graph closure over the packages available locally.
//!
//! [`find_missing`] walks from a set of roots and reports every reachable
//! import path that is not yet available. Subtrees found to be complete are
//! remembered by the caller-owned memo, so a loop that fetches one missing
//! path at a time only re-walks the parts of the graph that changed.

use crate::error::{Result, VendorError};
use crate::fileutils::should_skip;
use crate::importpath::{join, looks_remote};
use crate::imports::{find_vendor, parse_go_imports};
use crate::manifest::Manifest;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

pub trait ImportGraph {
    /// Imports of a locally available package, or `None` when it has to be fetched.
    fn imports(&self, path: &str) -> Result<Option<Vec<String>>>;
}

impl ImportGraph for BTreeMap<String, Vec<String>> {
    fn imports(&self, path: &str) -> Result<Option<Vec<String>>> {
        Ok(self.get(path).cloned())
    }
}

/// Sorted import paths reachable from `roots` that the graph does not have.
///
/// `satisfied` holds packages whose whole subtree is available; it is read
/// and extended, and may be reused across calls while the graph only grows.
pub fn find_missing(
    roots: &[String],
    graph: &impl ImportGraph,
    satisfied: &mut HashSet<String>,
) -> Result<BTreeSet<String>> {
    let mut walk = Walk {
        graph,
        satisfied,
        stack: Vec::new(),
        incomplete: HashSet::new(),
        missing: BTreeSet::new(),
    };
    for root in roots {
        walk.visit(root)?;
    }
    Ok(walk.missing)
}

struct Walk<'a, G> {
    graph: &'a G,
    satisfied: &'a mut HashSet<String>,
    stack: Vec<String>,
    incomplete: HashSet<String>,
    missing: BTreeSet<String>,
}

impl<G: ImportGraph> Walk<'_, G> {
    /// Returns whether everything below `path` is available.
    fn visit(&mut self, path: &str) -> Result<bool> {
        if self.satisfied.contains(path) {
            return Ok(true);
        }
        if self.stack.iter().any(|p| p == path) {
            return Err(VendorError::CycleDetected {
                path: path.to_string(),
                stack: self.stack.clone(),
            });
        }
        if self.incomplete.contains(path) || self.missing.contains(path) {
            return Ok(false);
        }
        let Some(imports) = self.graph.imports(path)? else {
            self.missing.insert(path.to_string());
            return Ok(false);
        };

        self.stack.push(path.to_string());
        let mut complete = true;
        for imp in &imports {
            complete &= self.visit(imp)?;
        }
        self.stack.pop();

        if complete {
            self.satisfied.insert(path.to_string());
        } else {
            self.incomplete.insert(path.to_string());
        }
        Ok(complete)
    }
}

/// Import paths of every Go package at or below `path` in the vendor tree.
///
/// Nested `vendor/` and `testdata` directories are not descended into;
/// vendored packages are reached through the imports that resolve to them.
pub fn package_paths(vendor_dir: &Path, path: &str, tests: bool) -> Result<Vec<String>> {
    let root = path.split('/').fold(vendor_dir.to_path_buf(), |acc, seg| acc.join(seg));
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let walker = WalkDir::new(&root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let is_dir = entry.file_type().is_dir();
        if is_dir && ["vendor", "testdata", "_testdata"].iter().any(|n| entry.file_name() == *n) {
            return false;
        }
        let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        !should_skip(rel, is_dir, tests, false)
    });

    let mut packages = BTreeSet::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(&root).to_path_buf();
            VendorError::fs(at, e.into())
        })?;
        if entry.file_type().is_dir() || !entry.file_name().to_string_lossy().ends_with(".go") {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        let rel = dir.strip_prefix(&root).unwrap_or(dir);
        let mut import = path.to_string();
        for seg in rel.components() {
            import.push('/');
            import.push_str(&seg.as_os_str().to_string_lossy());
        }
        packages.insert(import);
    }
    Ok(packages.into_iter().collect())
}

/// The packages under a vendor directory, as recorded by its manifest.
///
/// Paths that do not look remote are treated as standard library and have
/// no edges. A vendored package's edges are the imports of the Go files
/// directly in its directory.
pub struct VendorGraph<'a> {
    vendor_dir: &'a Path,
    manifest: &'a Manifest,
    local_prefixes: &'a [String],
    tests: bool,
}

impl<'a> VendorGraph<'a> {
    pub fn new(
        vendor_dir: &'a Path,
        manifest: &'a Manifest,
        local_prefixes: &'a [String],
        tests: bool,
    ) -> Self {
        Self {
            vendor_dir,
            manifest,
            local_prefixes,
            tests,
        }
    }
}

impl ImportGraph for VendorGraph<'_> {
    fn imports(&self, path: &str) -> Result<Option<Vec<String>>> {
        if !looks_remote(path, self.local_prefixes) {
            return Ok(Some(Vec::new()));
        }
        if !self.manifest.has_importpath(path) {
            return Ok(None);
        }
        let dir = path.split('/').fold(self.vendor_dir.to_path_buf(), |acc, seg| acc.join(seg));
        let Ok(entries) = fs::read_dir(&dir) else {
            return Ok(None);
        };

        let mut found = false;
        let mut out = BTreeSet::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file || !name.ends_with(".go") || name.starts_with(['.', '_']) {
                continue;
            }
            if !self.tests && name.ends_with("_test.go") {
                continue;
            }
            found = true;
            let file = entry.path();
            let content = fs::read_to_string(&file).map_err(|e| VendorError::fs(&file, e))?;
            let imports = parse_go_imports(&content)
                .map_err(|reason| VendorError::ImportParse { file, reason })?;
            for mut imp in imports {
                if imp.starts_with("./") || imp.starts_with("../") {
                    imp = join(&[path, &imp]);
                }
                if let Some(vp) = find_vendor(self.vendor_dir, &dir, &imp) {
                    imp = vp;
                }
                // a vendored package importing itself through its own vendor tree
                if imp != path {
                    out.insert(imp);
                }
            }
        }
        Ok(found.then(|| out.into_iter().collect()))
    }
}
