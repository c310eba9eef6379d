use super::{RemoteRepo, VcsKind, WorkingCopy, checkout_dir};
use crate::error::{Result, VendorError};
use colored::*;
use git2::Repository;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct GitRepo {
    url: String,
}

impl GitRepo {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    fn fail(&self, reason: impl ToString) -> VendorError {
        VendorError::Checkout {
            url: self.url.clone(),
            reason: reason.to_string(),
        }
    }

    fn clone_into(&self, dest: &Path, branch: &str) -> Result<Repository> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Cloning {}...", self.url));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let mut builder = git2::build::RepoBuilder::new();
        if !branch.is_empty() {
            builder.branch(branch);
        }
        match builder.clone(&self.url, dest) {
            Ok(repo) => {
                pb.finish_and_clear();
                Ok(repo)
            }
            Err(err) => {
                pb.finish_with_message(format!("{} Failed {}", "x".red(), self.url));
                Err(self.fail(err.message()))
            }
        }
    }

    fn detach(&self, repo: &Repository, spec: &str, what: &str) -> Result<()> {
        let commit = repo
            .revparse_single(spec)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|e| self.fail(format!("{what} not found: {}", e.message())))?;
        repo.set_head_detached(commit.id())
            .map_err(|e| self.fail(e.message()))?;
        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force();
        repo.checkout_head(Some(&mut opts))
            .map_err(|e| self.fail(format!("failed to checkout {what}: {}", e.message())))?;
        log::debug!("{} detached at {}", self.url, commit.id());
        Ok(())
    }
}

impl RemoteRepo for GitRepo {
    fn url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn checkout(&self, branch: &str, tag: &str, revision: &str) -> Result<Box<dyn WorkingCopy>> {
        if !tag.is_empty() && !revision.is_empty() {
            return Err(VendorError::user("only one of tag or revision may be supplied"));
        }
        let tmp = checkout_dir(VcsKind::Git)?;
        let repo = self.clone_into(tmp.path(), branch)?;

        if !tag.is_empty() {
            self.detach(&repo, &format!("refs/tags/{tag}"), &format!("tag {tag}"))?;
        } else if !revision.is_empty() {
            self.detach(&repo, revision, &format!("revision {revision}"))?;
        }

        Ok(Box::new(GitWorkingCopy {
            dir: tmp.path().to_path_buf(),
            tmp: Mutex::new(Some(tmp)),
        }))
    }
}

pub struct GitWorkingCopy {
    dir: PathBuf,
    tmp: Mutex<Option<tempfile::TempDir>>,
}

impl GitWorkingCopy {
    fn open(&self) -> Result<Repository> {
        Repository::open(&self.dir).map_err(|e| VendorError::Checkout {
            url: self.dir.display().to_string(),
            reason: e.message().to_string(),
        })
    }
}

impl WorkingCopy for GitWorkingCopy {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn revision(&self) -> Result<String> {
        let repo = self.open()?;
        let head = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| VendorError::Checkout {
                url: self.dir.display().to_string(),
                reason: e.message().to_string(),
            })?;
        Ok(head.id().to_string())
    }

    fn branch(&self) -> Result<String> {
        let repo = self.open()?;
        if repo.head_detached().unwrap_or(false) {
            return Ok("HEAD".to_string());
        }
        let head = repo.head().map_err(|e| VendorError::Checkout {
            url: self.dir.display().to_string(),
            reason: e.message().to_string(),
        })?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    fn destroy(&self) -> Result<()> {
        let tmp = match self.tmp.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tmp) = tmp {
            tmp.close().map_err(|e| VendorError::fs(&self.dir, e))?;
        }
        Ok(())
    }
}
