//! In-process repositories for exercising the engine without a VCS or network.

use crate::config::Workspace;
use crate::error::{Result, VendorError};
use crate::importpath::{is_within, strip_scheme};
use crate::vcs::{RemoteRepo, RepoResolver, VcsKind, WorkingCopy};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A repository whose "checkout" is an existing directory.
pub struct StubRepo {
    url: String,
    dir: PathBuf,
    head: String,
    revisions: HashMap<String, PathBuf>,
    delay: Duration,
    fail: Option<String>,
    destroy_fail: Option<String>,
    pub checkouts: AtomicUsize,
    pub destroyed: Arc<AtomicUsize>,
}

impl StubRepo {
    pub fn new(url: &str, dir: &Path) -> Self {
        Self {
            url: url.to_string(),
            dir: dir.to_path_buf(),
            head: "0000000000000000000000000000000000000001".to_string(),
            revisions: HashMap::new(),
            delay: Duration::ZERO,
            fail: None,
            destroy_fail: None,
            checkouts: AtomicUsize::new(0),
            destroyed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_head(mut self, revision: &str) -> Self {
        self.head = revision.to_string();
        self
    }

    /// Serves `dir` when exactly `revision` is requested.
    pub fn with_revision(mut self, revision: &str, dir: &Path) -> Self {
        self.revisions.insert(revision.to_string(), dir.to_path_buf());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.fail = Some(reason.to_string());
        self
    }

    /// Working copies of this repository refuse to be destroyed.
    pub fn failing_destroy(mut self, reason: &str) -> Self {
        self.destroy_fail = Some(reason.to_string());
        self
    }
}

impl RemoteRepo for StubRepo {
    fn url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn checkout(&self, branch: &str, tag: &str, revision: &str) -> Result<Box<dyn WorkingCopy>> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if let Some(reason) = &self.fail {
            return Err(VendorError::Checkout {
                url: self.url.clone(),
                reason: reason.clone(),
            });
        }
        let dir = self
            .revisions
            .get(revision)
            .cloned()
            .unwrap_or_else(|| self.dir.clone());
        let detached = !tag.is_empty() || !revision.is_empty();
        Ok(Box::new(StubWorkingCopy {
            dir,
            revision: if revision.is_empty() {
                self.head.clone()
            } else {
                revision.to_string()
            },
            branch: match (branch, detached) {
                ("", true) => "HEAD".to_string(),
                ("", false) => "master".to_string(),
                (b, _) => b.to_string(),
            },
            destroy_fail: self.destroy_fail.clone(),
            destroyed: Arc::clone(&self.destroyed),
        }))
    }
}

pub struct StubWorkingCopy {
    dir: PathBuf,
    revision: String,
    branch: String,
    destroy_fail: Option<String>,
    destroyed: Arc<AtomicUsize>,
}

impl WorkingCopy for StubWorkingCopy {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn revision(&self) -> Result<String> {
        Ok(self.revision.clone())
    }

    fn branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    fn destroy(&self) -> Result<()> {
        // the directory is a fixture owned by the test
        if let Some(reason) = &self.destroy_fail {
            return Err(VendorError::fs(&self.dir, std::io::Error::other(reason.clone())));
        }
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Maps import path prefixes to stub repositories.
#[derive(Default)]
pub struct StubResolver {
    repos: Vec<(String, Arc<StubRepo>)>,
    pub deductions: AtomicUsize,
}

impl StubResolver {
    pub fn with_repo(mut self, prefix: &str, repo: StubRepo) -> Self {
        self.repos.push((prefix.to_string(), Arc::new(repo)));
        self
    }

    pub fn repo(&self, prefix: &str) -> Arc<StubRepo> {
        self.repos
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, r)| Arc::clone(r))
            .unwrap()
    }
}

impl RepoResolver for StubResolver {
    fn deduce(&self, import_path: &str, _insecure: bool) -> Result<(Arc<dyn RemoteRepo>, String)> {
        self.deductions.fetch_add(1, Ordering::SeqCst);
        let path = strip_scheme(import_path);
        self.repos
            .iter()
            .filter(|(prefix, _)| is_within(&path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, repo)| {
                let extra = path[prefix.len()..].trim_matches('/').to_string();
                (Arc::clone(repo) as Arc<dyn RemoteRepo>, extra)
            })
            .ok_or_else(|| VendorError::RepositoryResolution {
                path: import_path.to_string(),
                reason: "no stub repository".to_string(),
            })
    }

    fn open(&self, url: &str, _kind: VcsKind, _insecure: bool) -> Result<Arc<dyn RemoteRepo>> {
        self.repos
            .iter()
            .find(|(_, repo)| repo.url() == url)
            .map(|(_, repo)| Arc::clone(repo) as Arc<dyn RemoteRepo>)
            .ok_or_else(|| VendorError::RepositoryResolution {
                path: url.to_string(),
                reason: "no stub repository".to_string(),
            })
    }
}

/// Writes a Go file declaring `imports` at `root/rel`.
pub fn write_go(root: &Path, rel: &str, imports: &[&str]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let pkg = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().replace(['.', '-'], "_"))
        .unwrap_or_else(|| "main".to_string());
    let mut body = format!("package {pkg}\n\n");
    for imp in imports {
        body.push_str(&format!("import \"{imp}\"\n"));
    }
    fs::write(path, body).unwrap();
}

/// A workspace rooted in `root` with import path `host.example/project`.
pub fn workspace(root: &Path) -> Workspace {
    Workspace::with_import_path(root, "host.example/project")
}
