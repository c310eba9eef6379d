//! Import path to repository deduction.
//!
//! Well-known hosts are mapped directly; explicit `.git`/`.hg`/`.bzr`/`.svn`
//! path suffixes name the repository root; anything else is resolved through
//! the `?go-get=1` metadata probe.

use super::{RemoteRepo, RepoResolver, VcsKind, meta, new_remote_repo};
use crate::error::{Result, VendorError};
use crate::importpath::strip_scheme;
use regex::Regex;
use std::sync::{Arc, LazyLock};

static VALID_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9-]+)(\.[A-Za-z0-9-]+)+(:[0-9]+)?(/[A-Za-z0-9_.~+-]+)*$").expect("valid regex")
});
static VCS_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<root>[A-Za-z0-9.-]+(?::[0-9]+)?/[A-Za-z0-9_.~/-]*?\.(?P<vcs>bzr|git|hg|svn))(?:/(?P<extra>[A-Za-z0-9_.~/-]+))?$")
        .expect("valid regex")
});
static GOPKG_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.v[0-9]+$").expect("valid regex"));

/// Resolver backed by real VCS backends and HTTP metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct VcsResolver;

impl RepoResolver for VcsResolver {
    fn deduce(&self, import_path: &str, insecure: bool) -> Result<(Arc<dyn RemoteRepo>, String)> {
        let (url, kind, extra) = deduce_location(import_path, insecure)?;
        log::debug!("{import_path} -> {kind} {url} (+{extra:?})");
        Ok((new_remote_repo(&url, kind), extra))
    }

    fn open(&self, url: &str, kind: VcsKind, insecure: bool) -> Result<Arc<dyn RemoteRepo>> {
        if let Some(scheme) = scheme_of(url) {
            check_scheme(url, scheme, insecure)?;
        }
        Ok(new_remote_repo(url, kind))
    }
}

fn scheme_of(path: &str) -> Option<&str> {
    path.find("://").map(|idx| &path[..idx])
}

fn check_scheme(path: &str, scheme: &str, insecure: bool) -> Result<()> {
    match scheme {
        "https" | "ssh" | "git+ssh" | "file" => Ok(()),
        "http" | "git" if insecure => Ok(()),
        "http" | "git" => Err(VendorError::RepositoryResolution {
            path: path.to_string(),
            reason: format!("{scheme} is an insecure protocol, use --precaire to allow it"),
        }),
        other => Err(VendorError::RepositoryResolution {
            path: path.to_string(),
            reason: format!("unknown scheme {other:?}"),
        }),
    }
}

/// Returns (repository URL, VCS kind, subpath inside the repository).
pub fn deduce_location(import_path: &str, insecure: bool) -> Result<(String, VcsKind, String)> {
    let scheme = scheme_of(import_path);
    if let Some(s) = scheme {
        check_scheme(import_path, s, insecure)?;
    }
    let path = strip_scheme(import_path);
    let fail = |reason: &str| VendorError::RepositoryResolution {
        path: import_path.to_string(),
        reason: reason.to_string(),
    };

    if !VALID_PATH.is_match(&path) {
        return Err(fail("not a valid import path"));
    }
    if !path.contains('/') {
        return Err(fail("not a remote import path"));
    }

    let url = |root: &str| format!("{}://{}", scheme.unwrap_or("https"), root);
    let segments: Vec<&str> = path.split('/').collect();
    let rest = |n: usize| segments.get(n..).map(|s| s.join("/")).unwrap_or_default();

    match segments[0] {
        "github.com" | "bitbucket.org" => {
            if segments.len() < 3 {
                return Err(fail("repository owner and name required"));
            }
            let root = segments[..3].join("/");
            Ok((url(&root), VcsKind::Git, rest(3)))
        }
        "launchpad.net" => Ok((url(&segments[..2].join("/")), VcsKind::Bzr, rest(2))),
        "golang.org" if segments.get(1) == Some(&"x") && segments.len() >= 3 => Ok((
            format!("https://go.googlesource.com/{}", segments[2]),
            VcsKind::Git,
            rest(3),
        )),
        "gopkg.in" => {
            let end = segments
                .iter()
                .position(|s| GOPKG_VERSION.is_match(s))
                .filter(|&i| i == 1 || i == 2)
                .ok_or_else(|| fail("gopkg.in path has no .vN version"))?;
            Ok((url(&segments[..=end].join("/")), VcsKind::Git, rest(end + 1)))
        }
        _ => {
            if let Some(caps) = VCS_SUFFIX.captures(&path) {
                let kind = VcsKind::parse(&caps["vcs"]).ok_or_else(|| fail("unknown vcs"))?;
                let extra = caps
                    .name("extra")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                return Ok((url(&caps["root"]), kind, extra));
            }
            let (found, kind) = meta::resolve(&path, insecure)?;
            if let Some(s) = scheme_of(&found.repo_root) {
                check_scheme(&path, s, insecure)?;
            }
            let extra = path
                .strip_prefix(&found.prefix)
                .unwrap_or_default()
                .trim_matches('/')
                .to_string();
            Ok((found.repo_root, kind, extra))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deduce(path: &str) -> (String, VcsKind, String) {
        deduce_location(path, false).unwrap()
    }

    #[test]
    fn test_github() {
        assert_eq!(
            deduce("github.com/pkg/errors"),
            ("https://github.com/pkg/errors".into(), VcsKind::Git, "".into())
        );
        assert_eq!(
            deduce("github.com/a/b/c/d").2,
            "c/d",
            "subpath is everything after owner/repo"
        );
        assert!(deduce_location("github.com/a", false).is_err());
    }

    #[test]
    fn test_golang_x_and_gopkg() {
        assert_eq!(
            deduce("golang.org/x/net/context"),
            ("https://go.googlesource.com/net".into(), VcsKind::Git, "context".into())
        );
        assert_eq!(
            deduce("gopkg.in/yaml.v2"),
            ("https://gopkg.in/yaml.v2".into(), VcsKind::Git, "".into())
        );
        assert_eq!(
            deduce("gopkg.in/user/pkg.v3/sub"),
            ("https://gopkg.in/user/pkg.v3".into(), VcsKind::Git, "sub".into())
        );
    }

    #[test]
    fn test_vcs_suffix() {
        assert_eq!(
            deduce("example.org/repo.hg/pkg/x"),
            ("https://example.org/repo.hg".into(), VcsKind::Hg, "pkg/x".into())
        );
        assert_eq!(
            deduce("ssh://git.corp.example/team/tool.git"),
            ("ssh://git.corp.example/team/tool.git".into(), VcsKind::Git, "".into())
        );
    }

    #[test]
    fn test_insecure_scheme_requires_flag() {
        let err = deduce_location("http://example.org/r.git", false).unwrap_err();
        assert!(matches!(err, VendorError::RepositoryResolution { .. }));
        assert!(deduce_location("http://example.org/r.git", true).is_ok());
    }

    #[test]
    fn test_invalid_paths() {
        assert!(deduce_location("fmt", false).is_err());
        assert!(deduce_location("example.org", false).is_err());
        assert!(deduce_location("example.org/a b", false).is_err());
    }

    #[test]
    fn test_open_checks_scheme() {
        let resolver = VcsResolver;
        assert!(resolver.open("http://example.org/r", VcsKind::Git, false).is_err());
        let repo = resolver
            .open("https://example.org/r", VcsKind::Hg, false)
            .unwrap();
        assert_eq!(repo.kind(), VcsKind::Hg);
        assert_eq!(repo.url(), "https://example.org/r");
    }
}
