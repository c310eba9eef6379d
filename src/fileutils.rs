//! Copying package trees into the vendor directory.
//!
//! Only files the Go toolchain cares about are copied, unless `all` is set,
//! in which case everything but VCS metadata goes.

use crate::error::{Result, VendorError};
use std::fs;
use std::path::{Component, Path};
use walkdir::WalkDir;

/// https://golang.org/cmd/go/#hdr-File_types
const GO_FILE_TYPES: &[&str] = &[
    ".go", ".c", ".h", ".cc", ".cpp", ".cxx", ".hh", ".hpp", ".hxx", ".m", ".s", ".S", ".swig",
    ".swigcxx", ".syso",
];

const LICENSE_FILES: &[&str] = &["LICENSE", "LICENCE", "UNLICENSE", "COPYING", "COPYRIGHT"];

/// Decides whether `rel` (relative to the tree being walked) stays out of the vendor tree.
pub fn should_skip(rel: &Path, is_dir: bool, tests: bool, all: bool) -> bool {
    let name = match rel.file_name() {
        Some(n) => n.to_string_lossy(),
        None => return false,
    };

    if all {
        return name == ".git" || name == ".bzr" || name == ".hg";
    }

    let in_testdata = rel.parent().is_some_and(|parent| {
        parent.components().any(|c| match c {
            Component::Normal(n) => n == "testdata" || n == "_testdata",
            _ => false,
        })
    });
    if tests && in_testdata {
        return false;
    }

    if name.starts_with('.') {
        return true;
    }
    if name.starts_with('_') && name != "_testdata" {
        return true;
    }
    if !tests && is_dir && (name == "_testdata" || name == "testdata") {
        return true;
    }
    if !tests && !is_dir && name.ends_with("_test.go") {
        return true;
    }
    !is_dir && !GO_FILE_TYPES.iter().any(|ext| name.ends_with(ext))
}

/// Copies `src` into `dst` applying [`should_skip`]; a failed copy leaves nothing behind.
pub fn copy_tree(dst: &Path, src: &Path, tests: bool, all: bool) -> Result<()> {
    let result = copy_tree_inner(dst, src, tests, all);
    if result.is_err() {
        if let Err(e) = remove_tree(dst) {
            log::warn!("could not remove partial copy {}: {}", dst.display(), e);
        }
    }
    result
}

fn copy_tree_inner(dst: &Path, src: &Path, tests: bool, all: bool) -> Result<()> {
    let walker = WalkDir::new(src).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        !should_skip(rel, entry.file_type().is_dir(), tests, all)
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            VendorError::fs(path, e.into())
        })?;
        let ty = entry.file_type();
        if ty.is_dir() {
            continue;
        }
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if ty.is_symlink() {
            copy_link(&target, entry.path())?;
        } else {
            copy_file(&target, entry.path())?;
        }
    }
    Ok(())
}

pub fn copy_file(dst: &Path, src: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| VendorError::fs(parent, e))?;
    }
    fs::copy(src, dst).map_err(|e| VendorError::fs(src, e))?;
    Ok(())
}

fn copy_link(dst: &Path, src: &Path) -> Result<()> {
    let target = fs::read_link(src).map_err(|e| VendorError::fs(src, e))?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| VendorError::fs(parent, e))?;
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink(&target, dst).map_err(|e| VendorError::fs(dst, e))?;
    #[cfg(windows)]
    {
        let resolved = src.parent().map(|p| p.join(&target)).unwrap_or(target.clone());
        let res = if resolved.is_dir() {
            std::os::windows::fs::symlink_dir(&target, dst)
        } else {
            std::os::windows::fs::symlink_file(&target, dst)
        };
        res.map_err(|e| VendorError::fs(dst, e))?;
    }
    Ok(())
}

/// Copies license files found directly in `src` into `dst`.
pub fn copy_license(dst: &Path, src: &Path) -> Result<()> {
    let entries = fs::read_dir(src).map_err(|e| VendorError::fs(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| VendorError::fs(src, e))?;
        let is_file = entry.file_type().map(|t| !t.is_dir()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let lower = name.to_lowercase();
        let stem = lower
            .strip_suffix(".md")
            .or_else(|| lower.strip_suffix(".txt"))
            .unwrap_or(&lower);
        if LICENSE_FILES.iter().any(|c| c.to_lowercase() == stem) {
            copy_file(&dst.join(&name), &entry.path())?;
        }
    }
    Ok(())
}

/// Removes a file or directory tree; missing paths are fine, read-only files are handled.
pub fn remove_tree(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(VendorError::fs(path, e)),
    };
    if !meta.is_dir() {
        return fs::remove_file(path).map_err(|e| VendorError::fs(path, e));
    }
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            make_writable(path);
            fs::remove_dir_all(path).map_err(|e| VendorError::fs(path, e))
        }
        Err(e) => Err(VendorError::fs(path, e)),
    }
}

#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) {
    for entry in WalkDir::new(path).into_iter().flatten() {
        if let Ok(meta) = entry.metadata() {
            let mut perms = meta.permissions();
            if perms.readonly() {
                perms.set_readonly(false);
                let _ = fs::set_permissions(entry.path(), perms);
            }
        }
    }
}

/// Deletes empty directories from `path` upwards, stopping at `stop`.
pub fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        // fails when not empty, which ends the walk
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}
