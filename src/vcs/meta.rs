//! `<meta name="go-import">` discovery for vanity import paths.

use super::VcsKind;
use crate::error::{Result, VendorError};
use crate::importpath::is_within;
use regex::Regex;
use std::sync::LazyLock;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s+([^>]*?)/?>").expect("valid regex"));
static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});
static HEAD_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head>|<body").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaImport {
    pub prefix: String,
    pub vcs: String,
    pub repo_root: String,
}

/// Extracts go-import declarations from the head of an HTML document.
pub fn parse_meta_go_imports(html: &str) -> Vec<MetaImport> {
    let head = match HEAD_END.find(html) {
        Some(m) => &html[..m.start()],
        None => html,
    };
    let mut imports = Vec::new();
    for tag in META_TAG.captures_iter(head) {
        let mut name = None;
        let mut content = None;
        for attr in ATTR.captures_iter(&tag[1]) {
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .map(|m| m.as_str().to_string());
            match attr[1].to_ascii_lowercase().as_str() {
                "name" => name = value,
                "content" => content = value,
                _ => {}
            }
        }
        if name.as_deref() != Some("go-import") {
            continue;
        }
        let Some(content) = content else { continue };
        let fields: Vec<&str> = content.split_whitespace().collect();
        if let [prefix, vcs, root] = fields.as_slice() {
            imports.push(MetaImport {
                prefix: prefix.to_string(),
                vcs: vcs.to_string(),
                repo_root: root.to_string(),
            });
        }
    }
    imports
}

fn fetch(scheme: &str, path: &str) -> Result<String> {
    let url = format!("{scheme}://{path}?go-get=1");
    log::debug!("probing {url}");
    let mut response = ureq::get(&url).call().map_err(|e| VendorError::Network {
        url: url.clone(),
        reason: e.to_string(),
    })?;
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| VendorError::Network {
            url,
            reason: e.to_string(),
        })
}

/// Fetches metadata over https, falling back to http only when insecure.
pub fn fetch_metadata(path: &str, insecure: bool) -> Result<String> {
    match fetch("https", path) {
        Ok(body) => Ok(body),
        Err(err) if !insecure => Err(err),
        Err(_) => fetch("http", path),
    }
}

/// Resolves `path` to exactly one go-import declaration.
pub fn resolve(path: &str, insecure: bool) -> Result<(MetaImport, VcsKind)> {
    let body = fetch_metadata(path, insecure).map_err(|e| VendorError::RepositoryResolution {
        path: path.to_string(),
        reason: format!("unable to determine remote metadata protocol: {e}"),
    })?;
    select(path, parse_meta_go_imports(&body))
}

fn select(path: &str, imports: Vec<MetaImport>) -> Result<(MetaImport, VcsKind)> {
    let fail = |reason: String| VendorError::RepositoryResolution {
        path: path.to_string(),
        reason,
    };
    let mut matching = imports.into_iter().filter(|im| is_within(path, &im.prefix));
    let found = matching
        .next()
        .ok_or_else(|| fail("go-import metadata not found".to_string()))?;
    if matching.next().is_some() {
        return Err(fail(format!("multiple meta tags match import path {path:?}")));
    }
    let kind = VcsKind::parse(&found.vcs)
        .ok_or_else(|| fail(format!("unsupported vcs {:?}", found.vcs)))?;
    Ok((found, kind))
}
