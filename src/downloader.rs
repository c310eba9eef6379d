//! Per-invocation cache of working copies and repository deductions.
//!
//! Every (repository, branch, tag, revision) key is checked out at most once,
//! however many threads ask for it: the first caller claims a slot under the
//! map lock and runs the checkout outside it, later callers block on the slot
//! and share the outcome. Failures are cached too.

use crate::error::{Result, VendorError};
use crate::importpath::is_within;
use crate::vcs::{RemoteRepo, RepoResolver, VcsKind, WorkingCopy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    url: String,
    kind: VcsKind,
    branch: String,
    tag: String,
    revision: String,
}

#[derive(Debug, Clone)]
enum Failure {
    User(String),
    Checkout(String),
}

type Outcome = std::result::Result<Arc<dyn WorkingCopy>, Failure>;
type Slot = Arc<OnceLock<Outcome>>;
type RepoCache = RwLock<HashMap<String, Arc<dyn RemoteRepo>>>;

pub struct Downloader {
    resolver: Arc<dyn RepoResolver>,
    wcs: Mutex<HashMap<CacheKey, Slot>>,
    repos: RepoCache,
    repos_insecure: RepoCache,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Downloader {
    pub fn new(resolver: Arc<dyn RepoResolver>) -> Self {
        Self {
            resolver,
            wcs: Mutex::new(HashMap::new()),
            repos: RwLock::new(HashMap::new()),
            repos_insecure: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the shared working copy for this key, checking it out on first use.
    pub fn acquire(
        &self,
        repo: &dyn RemoteRepo,
        branch: &str,
        tag: &str,
        revision: &str,
    ) -> Result<Arc<dyn WorkingCopy>> {
        let key = CacheKey {
            url: repo.url().to_string(),
            kind: repo.kind(),
            branch: branch.to_string(),
            tag: tag.to_string(),
            revision: revision.to_string(),
        };

        let slot = {
            let mut wcs = lock(&self.wcs);
            match wcs.get(&key) {
                Some(slot) => {
                    log::debug!("checkout cache hit for {}", key.url);
                    Arc::clone(slot)
                }
                None => {
                    let slot = Slot::default();
                    wcs.insert(key.clone(), Arc::clone(&slot));
                    slot
                }
            }
        };

        let outcome = slot.get_or_init(|| {
            log::debug!(
                "checking out {} (branch={:?} tag={:?} revision={:?})",
                key.url,
                branch,
                tag,
                revision
            );
            match repo.checkout(branch, tag, revision) {
                Ok(wc) => Ok(Arc::from(wc)),
                Err(VendorError::UserInput(msg)) => Err(Failure::User(msg)),
                Err(VendorError::Checkout { reason, .. }) => Err(Failure::Checkout(reason)),
                Err(other) => Err(Failure::Checkout(other.to_string())),
            }
        });

        match outcome {
            Ok(wc) => Ok(Arc::clone(wc)),
            Err(Failure::User(msg)) => Err(VendorError::UserInput(msg.clone())),
            Err(Failure::Checkout(reason)) => Err(VendorError::Checkout {
                url: key.url,
                reason: reason.clone(),
            }),
        }
    }

    /// Destroys every working copy, waiting for in-flight checkouts first.
    ///
    /// All copies are attempted; the first error is returned.
    pub fn flush(&self) -> Result<()> {
        let slots: Vec<(CacheKey, Slot)> = lock(&self.wcs).drain().collect();
        let mut first_err = None;
        for (key, slot) in slots {
            if let Ok(wc) = slot.wait() {
                log::debug!("removing checkout of {}", key.url);
                if let Err(e) = wc.destroy() {
                    log::warn!("failed to remove checkout of {}: {}", key.url, e);
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Memoised repository deduction.
    ///
    /// A previous deduction whose base path contains `path` is reused, so
    /// sibling packages of one repository are probed only once.
    pub fn deduce_remote_repo(
        &self,
        path: &str,
        insecure: bool,
    ) -> Result<(Arc<dyn RemoteRepo>, String)> {
        let cache = if insecure {
            &self.repos_insecure
        } else {
            &self.repos
        };

        {
            let known = cache.read().unwrap_or_else(|p| p.into_inner());
            let best = known
                .iter()
                .filter(|(base, _)| is_within(path, base))
                .max_by_key(|(base, _)| base.len());
            if let Some((base, repo)) = best {
                let extra = path[base.len()..].trim_matches('/').to_string();
                log::debug!("deduction cache hit: {path} in {base}");
                return Ok((Arc::clone(repo), extra));
            }
        }

        let (repo, extra) = self.resolver.deduce(path, insecure)?;

        match path.strip_suffix(extra.as_str()) {
            Some(base) if !base.trim_matches('/').is_empty() => {
                let base = base.trim_matches('/').to_string();
                cache
                    .write()
                    .unwrap_or_else(|p| p.into_inner())
                    .insert(base, Arc::clone(&repo));
            }
            _ => log::debug!("not caching deduction of {path}: {extra:?} is not a suffix"),
        }

        Ok((repo, extra))
    }

    /// Opens a repository recorded in a manifest.
    pub fn open_remote_repo(
        &self,
        url: &str,
        kind: VcsKind,
        insecure: bool,
    ) -> Result<Arc<dyn RemoteRepo>> {
        self.resolver.open(url, kind, insecure)
    }
}
