//! Manifest listing.
//!
//! Templates use `{{.Field}}` placeholders over the manifest record:
//! `Importpath`, `Repository`, `VCS`, `Revision`, `Branch`, `Path`,
//! `NoTests` and `AllFiles`. Tabs separate columns.

use crate::config::Workspace;
use crate::error::{Result, VendorError};
use crate::imports::{scan_project_imports, strip_vendor};
use crate::manifest::{Dependency, Manifest};
use crate::ui::TabWriter;
use std::collections::BTreeSet;

pub const DEFAULT_FORMAT: &str = "{{.Importpath}}\t{{.Repository}}{{.Path}}\t{{.Branch}}\t{{.Revision}}";

fn field(dep: &Dependency, name: &str) -> Option<String> {
    Some(match name {
        "Importpath" => dep.importpath.clone(),
        "Repository" => dep.repository.clone(),
        "VCS" => dep.vcs.to_string(),
        "Revision" => dep.revision.clone(),
        "Branch" => dep.branch.clone(),
        "Path" => dep.path.clone(),
        "NoTests" => dep.notests.to_string(),
        "AllFiles" => dep.allfiles.to_string(),
        _ => return None,
    })
}

/// Expands a template for one dependency.
pub fn render(template: &str, dep: &Dependency) -> Result<String> {
    let bad = |msg: String| VendorError::user(format!("template {template:?}: {msg}"));
    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| bad("unclosed action".to_string()))?;
        let action = after[..end].trim();
        let name = action
            .strip_prefix('.')
            .ok_or_else(|| bad(format!("unsupported action {action:?}")))?;
        let value = field(dep, name).ok_or_else(|| bad(format!("no field {name:?}")))?;
        out.push_str(&value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Dependencies no project file imports by exact path.
pub fn orphans(ws: &Workspace, manifest: &Manifest) -> Result<Vec<Dependency>> {
    let imported: BTreeSet<String> = scan_project_imports(&ws.root, &ws.import_path, false)?
        .iter()
        .map(|i| strip_vendor(i).to_string())
        .collect();
    Ok(manifest
        .dependencies
        .iter()
        .filter(|d| !imported.contains(&d.importpath))
        .cloned()
        .collect())
}

/// Renders the manifest, one aligned line per dependency.
pub fn list_dependencies(ws: &Workspace, template: &str, orphan: bool) -> Result<Vec<String>> {
    let manifest = Manifest::read(&ws.manifest_file)?;
    let deps = if orphan {
        orphans(ws, &manifest)?
    } else {
        manifest.dependencies
    };
    let mut w = TabWriter::new(1);
    for dep in &deps {
        w.push(&render(template, dep)?);
    }
    Ok(w.lines())
}
