//! Rebuilding the vendor tree from the manifest.
//!
//! Every dependency is checked out at its recorded revision (never its branch:
//! the revision may no longer be reachable from the branch tip) on a bounded
//! rayon pool. Failures are counted rather than short-circuiting, and the
//! manifest is never written.

use super::stage;
use crate::config::Workspace;
use crate::downloader::Downloader;
use crate::error::{Result, VendorError};
use crate::manifest::{Dependency, Manifest};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub insecure: bool,
    pub connections: usize,
}

struct Restorer<'a> {
    dl: &'a Downloader,
    insecure: bool,
    failures: AtomicUsize,
    pb: ProgressBar,
}

pub fn restore(ws: &Workspace, dl: &Downloader, opts: &RestoreOptions) -> Result<()> {
    let manifest = Manifest::read(&ws.manifest_file)?;
    if manifest.dependencies.is_empty() {
        println!("{} No dependencies to restore.", "!".yellow());
        return Ok(());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.connections.max(1))
        .build()
        .map_err(|e| VendorError::user(format!("cannot start {} workers: {e}", opts.connections)))?;

    println!(
        "{} Restoring {} dependencies...",
        "📦".blue(),
        manifest.dependencies.len()
    );
    let pb = ProgressBar::new(manifest.dependencies.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let restorer = Restorer {
        dl,
        insecure: opts.insecure,
        failures: AtomicUsize::new(0),
        pb,
    };
    pool.install(|| restorer.restore_all(&manifest.dependencies, &ws.vendor_dir, false));

    let failures = restorer.failures.load(Ordering::SeqCst);
    restorer.pb.finish_and_clear();
    match failures {
        0 => {
            println!("{} Restore complete.", "✓".green());
            Ok(())
        }
        n => Err(VendorError::RestoreFailed(n)),
    }
}

impl Restorer<'_> {
    fn restore_all(&self, deps: &[Dependency], vendor_dir: &Path, nested: bool) {
        deps.par_iter().for_each(|dep| {
            if let Err(e) = self.restore_one(dep, vendor_dir, nested) {
                self.pb
                    .println(format!("{} {}: {}", "x".red(), dep.importpath, e));
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
            self.pb.inc(1);
        });
    }

    fn restore_one(&self, dep: &Dependency, vendor_dir: &Path, nested: bool) -> Result<()> {
        let extra = if dep.allfiles {
            " (without file exclusions)"
        } else if !dep.notests {
            " (including tests)"
        } else {
            ""
        };
        self.pb.set_message(dep.importpath.clone());
        log::info!(
            "fetching {}{}{}",
            if nested { "nested " } else { "" },
            dep.importpath,
            extra
        );

        let repo = self
            .dl
            .open_remote_repo(&dep.repository, dep.vcs, self.insecure)?;
        let wc = self.dl.acquire(repo.as_ref(), "", "", &dep.revision)?;
        let dst = vendor_dir.join(&dep.importpath);
        stage(&dst, wc.as_ref(), dep.subdir(), !dep.notests, dep.allfiles)?;

        // vendoring of vendoring
        let nested_dir = dst.join("vendor");
        let nested_manifest = nested_dir.join("manifest");
        if nested_manifest.exists() {
            let m = Manifest::read(&nested_manifest)?;
            self.pb.inc_length(m.dependencies.len() as u64);
            self.restore_all(&m.dependencies, &nested_dir, true);
        }
        Ok(())
    }
}
