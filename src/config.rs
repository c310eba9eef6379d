//! Project layout and the optional `gvend.toml`.

use anyhow::{Context, Result};
use colored::*;
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "gvend.toml";

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct GvendConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub restore: RestoreConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ProjectConfig {
    pub import_path: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RestoreConfig {
    #[serde(default = "default_connections")]
    pub connections: usize,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            connections: default_connections(),
        }
    }
}

fn default_connections() -> usize {
    8
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FetchConfig {
    /// Dotted import prefixes that still belong to the local build.
    #[serde(default)]
    pub local_prefixes: Vec<String>,
    #[serde(default)]
    pub strategy: Strategy,
}

/// How a recursive fetch discovers what is missing.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Fetch each remote import as soon as it is discovered.
    #[default]
    DepthFirst,
    /// Rebuild the import graph after every fetch and take the smallest missing path.
    Closure,
}

impl GvendConfig {
    /// Reads `gvend.toml` from `root`; absent means defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let config_str = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&config_str).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// One project being vendored into.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub vendor_dir: PathBuf,
    pub manifest_file: PathBuf,
    /// The project's own import path; empty disables the self-vendoring guard.
    pub import_path: String,
    pub config: GvendConfig,
}

impl Workspace {
    pub fn discover(root: &Path) -> Result<Self> {
        let config = GvendConfig::load(root)?;
        let import_path = match &config.project.import_path {
            Some(p) => p.trim_matches('/').to_string(),
            None => match infer_import_path(root, std::env::var_os("GOPATH")) {
                Some(p) => p,
                None => {
                    eprintln!(
                        "{} Could not determine the project import path; set [project] import_path in {}",
                        "!".yellow(),
                        CONFIG_FILE
                    );
                    String::new()
                }
            },
        };
        log::debug!("workspace {} ({:?})", root.display(), import_path);
        let mut ws = Self::with_import_path(root, &import_path);
        ws.config = config;
        Ok(ws)
    }

    pub fn with_import_path(root: &Path, import_path: &str) -> Self {
        let vendor_dir = root.join("vendor");
        Self {
            root: root.to_path_buf(),
            manifest_file: vendor_dir.join("manifest"),
            vendor_dir,
            import_path: import_path.to_string(),
            config: GvendConfig::default(),
        }
    }

    pub fn local_prefixes(&self) -> &[String] {
        &self.config.fetch.local_prefixes
    }
}

/// Import path of `root` relative to the first `GOPATH` entry containing it.
pub fn infer_import_path(root: &Path, gopath: Option<OsString>) -> Option<String> {
    let entries: Vec<PathBuf> = match gopath {
        Some(value) if !value.is_empty() => std::env::split_paths(&value).collect(),
        _ => vec![dirs::home_dir()?.join("go")],
    };
    entries.iter().find_map(|entry| {
        let rel = root.strip_prefix(entry.join("src")).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    })
}
