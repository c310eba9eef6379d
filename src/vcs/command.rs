//! Mercurial, Bazaar and Subversion backends driven through their CLIs.

use super::{RemoteRepo, VcsKind, WorkingCopy, checkout_dir};
use crate::error::{Result, VendorError};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Hg,
    Bzr,
    Svn,
}

impl Tool {
    fn kind(self) -> VcsKind {
        match self {
            Tool::Hg => VcsKind::Hg,
            Tool::Bzr => VcsKind::Bzr,
            Tool::Svn => VcsKind::Svn,
        }
    }
}

pub struct CommandRepo {
    url: String,
    tool: Tool,
}

impl CommandRepo {
    pub fn new(url: &str, tool: Tool) -> Self {
        Self {
            url: url.to_string(),
            tool,
        }
    }
}

fn run(url: &str, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    log::debug!("running {} {}", program, args.join(" "));
    let output = cmd.output().map_err(|e| VendorError::Checkout {
        url: url.to_string(),
        reason: format!("failed to run {program}: {e}"),
    })?;
    if !output.status.success() {
        return Err(VendorError::Checkout {
            url: url.to_string(),
            reason: format!(
                "{} {} failed: {}",
                program,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl RemoteRepo for CommandRepo {
    fn url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> VcsKind {
        self.tool.kind()
    }

    fn checkout(&self, branch: &str, tag: &str, revision: &str) -> Result<Box<dyn WorkingCopy>> {
        if !tag.is_empty() && !revision.is_empty() {
            return Err(VendorError::user("only one of tag or revision may be supplied"));
        }
        let tmp = checkout_dir(self.tool.kind())?;
        let dest = tmp.path().join("wc");
        let dest_str = dest.to_string_lossy().to_string();

        match self.tool {
            Tool::Hg => {
                run(&self.url, "hg", &["clone", "-U", &self.url, &dest_str], None)?;
                let target = [revision, tag, branch]
                    .into_iter()
                    .find(|s| !s.is_empty())
                    .unwrap_or("default");
                run(&self.url, "hg", &["update", "-r", target], Some(&dest))?;
            }
            Tool::Bzr => {
                let rev_arg;
                let mut args = vec!["branch"];
                if !revision.is_empty() {
                    args.extend(["-r", revision]);
                } else if !tag.is_empty() {
                    rev_arg = format!("tag:{tag}");
                    args.extend(["-r", rev_arg.as_str()]);
                }
                args.extend([self.url.as_str(), dest_str.as_str()]);
                run(&self.url, "bzr", &args, None)?;
            }
            Tool::Svn => {
                if !tag.is_empty() {
                    return Err(VendorError::user("svn does not support tags, use a revision"));
                }
                let mut args = vec!["checkout"];
                if !revision.is_empty() {
                    args.extend(["-r", revision]);
                }
                args.extend([self.url.as_str(), dest_str.as_str()]);
                run(&self.url, "svn", &args, None)?;
            }
        }

        Ok(Box::new(CommandWorkingCopy {
            url: self.url.clone(),
            tool: self.tool,
            dir: dest,
            detached: !tag.is_empty() || !revision.is_empty(),
            tmp: Mutex::new(Some(tmp)),
        }))
    }
}

pub struct CommandWorkingCopy {
    url: String,
    tool: Tool,
    dir: PathBuf,
    detached: bool,
    tmp: Mutex<Option<tempfile::TempDir>>,
}

impl WorkingCopy for CommandWorkingCopy {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn revision(&self) -> Result<String> {
        match self.tool {
            Tool::Hg => run(&self.url, "hg", &["id", "-i", "--debug"], Some(&self.dir))
                .map(|s| s.trim_end_matches('+').to_string()),
            Tool::Bzr => run(&self.url, "bzr", &["revno"], Some(&self.dir)),
            Tool::Svn => run(
                &self.url,
                "svn",
                &["info", "--show-item", "revision"],
                Some(&self.dir),
            ),
        }
    }

    fn branch(&self) -> Result<String> {
        match self.tool {
            Tool::Hg if self.detached => Ok("HEAD".to_string()),
            Tool::Hg => run(&self.url, "hg", &["branch"], Some(&self.dir)),
            // no branch concept worth tracking
            Tool::Bzr | Tool::Svn => Ok(String::new()),
        }
    }

    fn destroy(&self) -> Result<()> {
        let tmp = match self.tmp.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tmp) = tmp {
            crate::fileutils::remove_tree(tmp.path())?;
        }
        Ok(())
    }
}
