//! The vendor manifest (`vendor/manifest`).
//!
//! A JSON document listing every vendored import path with its provenance.
//! Entries are kept sorted by import path so re-serialising an unchanged
//! manifest is byte-identical, and writes go through a temporary file that is
//! renamed into place.

use crate::error::{Result, VendorError};
use crate::importpath::is_within;
use crate::vcs::VcsKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

pub const MANIFEST_VERSION: u32 = 0;

/// One vendored package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub importpath: String,
    pub repository: String,
    pub vcs: VcsKind,
    pub revision: String,
    pub branch: String,
    /// Directory inside the repository that holds `importpath`, `/`-prefixed when set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub notests: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allfiles: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Dependency {
    /// The repository subdirectory without its leading slash.
    pub fn subdir(&self) -> &str {
        self.path.trim_matches('/')
    }

    /// Import path of the repository root, derived by trimming `path` off `importpath`.
    pub fn root_importpath(&self) -> Result<String> {
        let sub = self.subdir();
        if sub.is_empty() {
            return Ok(self.importpath.clone());
        }
        match self.importpath.strip_suffix(sub) {
            Some(root) if root.is_empty() || root.ends_with('/') => {
                Ok(root.trim_end_matches('/').to_string())
            }
            _ => Err(VendorError::Derivation {
                importpath: self.importpath.clone(),
                subpath: self.path.clone(),
            }),
        }
    }

    /// Branch is pinned: `update` leaves it alone.
    pub fn is_frozen(&self) -> bool {
        self.branch.is_empty() || self.branch == "HEAD"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            dependencies: Vec::new(),
        }
    }
}

impl Manifest {
    pub fn read(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VendorError::ManifestNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(VendorError::fs(path, e)),
        };
        let mut manifest: Manifest =
            serde_json::from_str(&content).map_err(|source| VendorError::ManifestCorrupt {
                path: path.to_path_buf(),
                source,
            })?;
        manifest.sort();
        Ok(manifest)
    }

    /// Like [`Manifest::read`], but a missing file is an empty manifest.
    pub fn read_or_default(path: &Path) -> Result<Self> {
        match Self::read(path) {
            Err(VendorError::ManifestNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut sorted = self.clone();
        sorted.sort();
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        sorted
            .serialize(&mut ser)
            .map_err(|e| VendorError::fs("manifest", std::io::Error::other(e)))?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Writes atomically: temp file in the same directory, then rename.
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| VendorError::fs(dir, e))?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".manifest")
            .tempfile_in(dir)
            .map_err(|e| VendorError::fs(dir, e))?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| VendorError::fs(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| VendorError::fs(path, e.error))?;
        log::debug!(
            "wrote manifest {} ({} dependencies)",
            path.display(),
            self.dependencies.len()
        );
        Ok(())
    }

    fn sort(&mut self) {
        self.dependencies
            .sort_by(|a, b| a.importpath.cmp(&b.importpath));
    }

    /// Inserts keeping import paths unique and non-overlapping.
    pub fn add_dependency(&mut self, dep: Dependency) -> Result<()> {
        for existing in &self.dependencies {
            if existing.importpath == dep.importpath {
                return Err(VendorError::ManifestConsistency(format!(
                    "{} is already present",
                    dep.importpath
                )));
            }
            if is_within(&dep.importpath, &existing.importpath) {
                return Err(VendorError::ManifestConsistency(format!(
                    "{} cannot be added: parent {} is vendored",
                    dep.importpath, existing.importpath
                )));
            }
            if is_within(&existing.importpath, &dep.importpath) {
                return Err(VendorError::ManifestConsistency(format!(
                    "{} cannot be added: subpackage {} is vendored",
                    dep.importpath, existing.importpath
                )));
            }
        }
        let idx = self
            .dependencies
            .partition_point(|d| d.importpath < dep.importpath);
        self.dependencies.insert(idx, dep);
        Ok(())
    }

    pub fn remove_dependency(&mut self, dep: &Dependency) -> Result<()> {
        match self.dependencies.iter().position(|d| d == dep) {
            Some(idx) => {
                self.dependencies.remove(idx);
                Ok(())
            }
            None => Err(VendorError::DependencyNotFound(dep.importpath.clone())),
        }
    }

    /// Exact match only.
    pub fn get_dependency_for_importpath(&self, path: &str) -> Result<Dependency> {
        self.dependencies
            .iter()
            .find(|d| d.importpath == path)
            .cloned()
            .ok_or_else(|| VendorError::DependencyNotFound(path.to_string()))
    }

    /// The dependency that provides `path`: the exact entry or a vendored ancestor.
    pub fn find_provider(&self, path: &str) -> Option<&Dependency> {
        self.dependencies
            .iter()
            .find(|d| is_within(path, &d.importpath))
    }

    pub fn has_importpath(&self, path: &str) -> bool {
        self.find_provider(path).is_some()
    }

    /// Entries equal to or below `prefix`.
    pub fn get_subpackages(&self, prefix: &str) -> Vec<Dependency> {
        self.dependencies
            .iter()
            .filter(|d| is_within(&d.importpath, prefix))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(path: &str) -> Dependency {
        Dependency {
            importpath: path.to_string(),
            repository: format!("https://{path}"),
            vcs: VcsKind::Git,
            revision: "abc123".to_string(),
            branch: "master".to_string(),
            path: String::new(),
            notests: true,
            allfiles: false,
        }
    }

    #[test]
    fn test_add_rejects_duplicate_and_overlap() {
        let mut m = Manifest::default();
        m.add_dependency(dep("github.com/a/b")).unwrap();
        assert!(matches!(
            m.add_dependency(dep("github.com/a/b")),
            Err(VendorError::ManifestConsistency(_))
        ));
        assert!(m.add_dependency(dep("github.com/a/b/c")).is_err());
        assert!(m.add_dependency(dep("github.com/a")).is_err());
        // sibling with a shared string prefix is not an overlap
        m.add_dependency(dep("github.com/a/bc")).unwrap();
        assert_eq!(m.dependencies.len(), 2);
    }

    #[test]
    fn test_add_keeps_entries_disjoint() {
        let mut m = Manifest::default();
        for p in ["x.org/q", "x.org/q/r", "x.org/p", "x.org", "y.org/q"] {
            let _ = m.add_dependency(dep(p));
        }
        for a in &m.dependencies {
            for b in &m.dependencies {
                if a.importpath != b.importpath {
                    assert!(!is_within(&a.importpath, &b.importpath));
                }
            }
        }
    }

    #[test]
    fn test_remove_requires_exact_match() {
        let mut m = Manifest::default();
        m.add_dependency(dep("github.com/a/b")).unwrap();
        assert!(matches!(
            m.remove_dependency(&dep("github.com/a/c")),
            Err(VendorError::DependencyNotFound(_))
        ));
        m.remove_dependency(&dep("github.com/a/b")).unwrap();
        assert!(m.dependencies.is_empty());
    }

    #[test]
    fn test_lookup_is_exact_but_provider_walks_up() {
        let mut m = Manifest::default();
        m.add_dependency(dep("github.com/a/b")).unwrap();
        assert!(m.get_dependency_for_importpath("github.com/a/b/c").is_err());
        assert_eq!(
            m.find_provider("github.com/a/b/c").map(|d| d.importpath.as_str()),
            Some("github.com/a/b")
        );
        assert!(!m.has_importpath("github.com/a/bc"));
    }

    #[test]
    fn test_get_subpackages() {
        let mut m = Manifest::default();
        m.add_dependency(dep("github.com/a/b/one")).unwrap();
        m.add_dependency(dep("github.com/a/b/two")).unwrap();
        m.add_dependency(dep("github.com/a/bc")).unwrap();
        let subs: Vec<_> = m
            .get_subpackages("github.com/a/b")
            .into_iter()
            .map(|d| d.importpath)
            .collect();
        assert_eq!(subs, vec!["github.com/a/b/one", "github.com/a/b/two"]);
    }

    #[test]
    fn test_write_read_roundtrip_is_byte_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vendor").join("manifest");
        let mut m = Manifest::default();
        m.add_dependency(dep("github.com/z/z")).unwrap();
        let mut sub = dep("golang.org/x/net/context");
        sub.path = "/context".to_string();
        sub.notests = false;
        sub.allfiles = true;
        m.add_dependency(sub).unwrap();

        m.write(&path).unwrap();
        let first = fs::read(&path).unwrap();
        Manifest::read(&path).unwrap().write(&path).unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);

        let text = String::from_utf8(first).unwrap();
        assert!(text.starts_with("{\n\t\"version\": 0,"));
        assert!(text.contains("\"path\": \"/context\""));
        assert!(text.contains("\"allfiles\": true"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_read_reports_missing_and_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("manifest");
        assert!(matches!(
            Manifest::read(&path),
            Err(VendorError::ManifestNotFound(_))
        ));
        assert_eq!(Manifest::read_or_default(&path).unwrap(), Manifest::default());
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Manifest::read(&path),
            Err(VendorError::ManifestCorrupt { .. })
        ));
    }

    #[test]
    fn test_parse_gvt_manifest() {
        let json = r#"{
	"version": 0,
	"dependencies": [
		{
			"importpath": "golang.org/x/net/websocket",
			"repository": "https://go.googlesource.com/net",
			"vcs": "git",
			"revision": "f2499483f923065a842d38eb4c7f1927e6fc6e6d",
			"branch": "master",
			"path": "/websocket",
			"notests": true
		}
	]
}
"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        let d = &m.dependencies[0];
        assert_eq!(d.subdir(), "websocket");
        assert_eq!(d.root_importpath().unwrap(), "golang.org/x/net");
        assert_eq!(String::from_utf8(m.to_bytes().unwrap()).unwrap(), json);
    }

    #[test]
    fn test_root_importpath_requires_suffix() {
        let mut d = dep("example.com/a/b");
        d.path = "/c".to_string();
        assert!(matches!(
            d.root_importpath(),
            Err(VendorError::Derivation { .. })
        ));
    }
}
