//! Import discovery for Go source trees.
//!
//! Only the package clause and import declarations of each file are read.
//! Imports already satisfied by a `vendor/` directory between the importing
//! file and the vendor root are rewritten to their vendor-qualified path, so
//! the nearest enclosing vendor directory wins.

use crate::error::{Result, VendorError};
use crate::fileutils::should_skip;
use crate::importpath::join;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Skips whitespace, semicolons and comments.
    fn skip(&mut self) -> std::result::Result<(), String> {
        loop {
            let rest = self.rest();
            if let Some(c) = rest.chars().next()
                && (c.is_whitespace() || c == ';')
            {
                self.pos += c.len_utf8();
            } else if rest.starts_with("//") {
                self.pos += rest.find('\n').unwrap_or(rest.len());
            } else if rest.starts_with("/*") {
                let end = rest[2..]
                    .find("*/")
                    .ok_or_else(|| "unterminated comment".to_string())?;
                self.pos += end + 4;
            } else {
                return Ok(());
            }
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(i, c)| !(c == '_' || c.is_alphabetic() || (i > 0 && c.is_numeric())))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn string_lit(&mut self) -> std::result::Result<String, String> {
        let rest = self.rest();
        match rest.chars().next() {
            Some('`') => {
                let end = rest[1..]
                    .find('`')
                    .ok_or_else(|| "unterminated raw string".to_string())?;
                self.pos += end + 2;
                Ok(rest[1..end + 1].to_string())
            }
            Some('"') => {
                let mut out = String::new();
                let mut chars = rest[1..].char_indices();
                while let Some((i, c)) = chars.next() {
                    match c {
                        '"' => {
                            self.pos += i + 2;
                            return Ok(out);
                        }
                        '\\' => match chars.next() {
                            Some((_, esc)) => out.push(esc),
                            None => break,
                        },
                        '\n' => break,
                        other => out.push(other),
                    }
                }
                Err("unterminated import path".to_string())
            }
            _ => Err(format!("expected import path, found {:?}", self.peek())),
        }
    }

    fn import_spec(&mut self) -> std::result::Result<String, String> {
        self.skip()?;
        match self.peek() {
            Some('.') => self.pos += 1,
            Some(c) if c == '_' || c.is_alphabetic() => {
                self.ident();
            }
            _ => {}
        }
        self.skip()?;
        self.string_lit()
    }
}

/// Returns the import paths declared by one Go source file, in order.
pub fn parse_go_imports(src: &str) -> std::result::Result<Vec<String>, String> {
    let mut lx = Lexer::new(src);
    lx.skip()?;
    if lx.ident() != Some("package") {
        return Err("expected 'package' clause".to_string());
    }
    lx.skip()?;
    if lx.ident().is_none() {
        return Err("expected package name".to_string());
    }

    let mut imports = Vec::new();
    loop {
        lx.skip()?;
        if lx.ident() != Some("import") {
            break;
        }
        lx.skip()?;
        if lx.peek() == Some('(') {
            lx.pos += 1;
            loop {
                lx.skip()?;
                match lx.peek() {
                    Some(')') => {
                        lx.pos += 1;
                        break;
                    }
                    None => return Err("unterminated import block".to_string()),
                    _ => imports.push(lx.import_spec()?),
                }
            }
        } else {
            imports.push(lx.import_spec()?);
        }
    }
    Ok(imports)
}

fn has_go_file(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|e| {
        e.file_type().map(|t| !t.is_dir()).unwrap_or(false)
            && e.path().extension().is_some_and(|ext| ext == "go")
    })
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Looks for `vendor/<pkg>` from `start` upwards, never above `root`.
///
/// Returns the match relative to `root`, slash separated.
pub fn find_vendor(root: &Path, start: &Path, pkg: &str) -> Option<String> {
    if !start.starts_with(root) {
        log::debug!("{} is outside {}", start.display(), root.display());
        return None;
    }
    let mut dir = start;
    loop {
        let candidate = pkg
            .split('/')
            .fold(dir.join("vendor"), |acc, seg| acc.join(seg));
        if has_go_file(&candidate) {
            return candidate.strip_prefix(root).ok().map(to_slash);
        }
        if dir == root {
            return None;
        }
        dir = dir.parent()?;
    }
}

/// Collects the imports of every Go file under `root`.
///
/// Relative imports and vendor-satisfied imports are qualified with
/// `vendor_prefix`, the import path of `vendor_root`.
pub fn scan_imports(
    root: &Path,
    vendor_root: &Path,
    vendor_prefix: &str,
    tests: bool,
    all: bool,
) -> Result<BTreeSet<String>> {
    scan_tree(root, vendor_root, vendor_prefix, tests, all, None)
}

/// Imports of a project's own files, tests and all files included.
///
/// With `skip_vendor` the top-level `vendor/` directory is not walked.
pub fn scan_project_imports(
    root: &Path,
    import_path: &str,
    skip_vendor: bool,
) -> Result<BTreeSet<String>> {
    let vendor = root.join("vendor");
    let skip = skip_vendor.then_some(vendor.as_path());
    scan_tree(root, root, import_path, true, true, skip)
}

/// The import path a vendor-qualified import stands for.
///
/// `host/proj/vendor/a.org/x` and `vendor/a.org/x` both name `a.org/x`.
pub fn strip_vendor(path: &str) -> &str {
    if let Some(idx) = path.rfind("/vendor/") {
        &path[idx + "/vendor/".len()..]
    } else {
        path.strip_prefix("vendor/").unwrap_or(path)
    }
}

fn scan_tree(
    root: &Path,
    vendor_root: &Path,
    vendor_prefix: &str,
    tests: bool,
    all: bool,
    skip: Option<&Path>,
) -> Result<BTreeSet<String>> {
    let mut pkgs = BTreeSet::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        if skip.is_some_and(|s| entry.path() == s) {
            return false;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        !should_skip(rel, entry.file_type().is_dir(), tests, all)
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            VendorError::fs(path, e.into())
        })?;
        let path = entry.path();
        if entry.file_type().is_dir() || path.extension().is_none_or(|ext| ext != "go") {
            continue;
        }
        let content = fs::read_to_string(path).map_err(|e| VendorError::fs(path, e))?;
        let imports = parse_go_imports(&content).map_err(|reason| VendorError::ImportParse {
            file: path.to_path_buf(),
            reason,
        })?;
        let dir = path.parent().unwrap_or(root);

        for mut pkg in imports {
            if pkg.starts_with("./") || pkg.starts_with("../") {
                let middle = dir.strip_prefix(vendor_root).map(to_slash).unwrap_or_default();
                pkg = join(&[vendor_prefix, &middle, &pkg]);
            }
            if let Some(vp) = find_vendor(vendor_root, dir, &pkg) {
                pkg = join(&[vendor_prefix, &vp]);
            }
            pkgs.insert(pkg);
        }
    }
    Ok(pkgs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, body: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    #[test]
    fn test_parse_import_forms() {
        let src = r#"// Copyright header
/* block
   comment */
package main // trailing

import "fmt"
import (
	"os"
	str "strings"
	. "math"
	_ "net/http/pprof" // side effects
	`github.com/raw/path`
)

/*
#include <stdio.h>
*/
import "C"

func main() { fmt.Println("import \"not/this\"") }
"#;
        assert_eq!(
            parse_go_imports(src).unwrap(),
            vec![
                "fmt",
                "os",
                "strings",
                "math",
                "net/http/pprof",
                "github.com/raw/path",
                "C"
            ]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_go_imports("not go").is_err());
        assert!(parse_go_imports("package x\nimport (\n\"a\"\n").is_err());
        assert!(parse_go_imports("package x\nimport \"unterminated\n").is_err());
        assert_eq!(parse_go_imports("package x").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_scan_respects_test_policy() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "a.go", "package a\nimport \"example.com/dep\"\n");
        write(root, "a_test.go", "package a\nimport \"example.com/testonly\"\n");
        write(root, "_skip/x.go", "package x\nimport \"example.com/hidden\"\n");

        let without = scan_imports(root, root, "example.com/a", false, false).unwrap();
        assert_eq!(without.into_iter().collect::<Vec<_>>(), vec!["example.com/dep"]);

        let with = scan_imports(root, root, "example.com/a", true, false).unwrap();
        assert!(with.contains("example.com/testonly"));
        assert!(!with.contains("example.com/hidden"));
    }

    #[test]
    fn test_nearest_vendor_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "sub/use.go", "package sub\nimport \"pkg\"\nimport \"other.org/x\"\n");
        write(root, "sub/vendor/pkg/pkg.go", "package pkg\n");
        write(root, "vendor/pkg/pkg.go", "package pkg\n");
        write(root, "vendor/other.org/x/x.go", "package x\n");

        let found = scan_imports(&root.join("sub"), root, "host.example/r", false, false).unwrap();
        assert!(found.contains("host.example/r/sub/vendor/pkg"));
        assert!(found.contains("host.example/r/vendor/other.org/x"));
        assert!(!found.contains("pkg"));
    }

    #[test]
    fn test_vendor_dir_without_go_files_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "main.go", "package main\nimport \"a.org/b\"\n");
        write(root, "vendor/a.org/b/README", "docs only");
        let found = scan_imports(root, root, "", false, false).unwrap();
        assert!(found.contains("a.org/b"));
    }

    #[test]
    fn test_relative_imports_are_qualified() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "cmd/tool/main.go", "package main\nimport \"./helper\"\n");
        let found = scan_imports(root, root, "host.example/r", false, false).unwrap();
        assert!(found.contains("host.example/r/cmd/tool/helper"));
    }

    #[test]
    fn test_strip_vendor() {
        assert_eq!(strip_vendor("host.example/p/vendor/a.org/x"), "a.org/x");
        assert_eq!(strip_vendor("vendor/a.org/x"), "a.org/x");
        assert_eq!(strip_vendor("a/vendor/b/vendor/c.org/y"), "c.org/y");
        assert_eq!(strip_vendor("a.org/vendors/x"), "a.org/vendors/x");
    }

    #[test]
    fn test_project_scan_can_skip_vendor() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "main.go", "package main\nimport \"a.org/x\"\n");
        write(root, "vendor/a.org/x/x.go", "package x\nimport \"b.org/y\"\n");
        let all = scan_project_imports(root, "host.example/p", false).unwrap();
        assert!(all.contains("host.example/p/vendor/a.org/x"));
        assert!(all.contains("b.org/y"));
        let own = scan_project_imports(root, "host.example/p", true).unwrap();
        assert_eq!(own.into_iter().collect::<Vec<_>>(), vec!["host.example/p/vendor/a.org/x"]);
    }

    #[test]
    fn test_find_vendor_never_climbs_above_root() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "vendor/p/p.go", "package p\n");
        let root = tmp.path().join("inner");
        fs::create_dir_all(root.join("d")).unwrap();
        assert_eq!(find_vendor(&root, &root.join("d"), "p"), None);
        assert_eq!(find_vendor(tmp.path(), &root.join("d"), "p"), Some("vendor/p".into()));
    }
}
