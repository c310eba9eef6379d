//! Error taxonomy shared by the vendoring engine.
//!
//! Command handlers wrap these in `anyhow` for reporting; the core keeps them
//! typed so callers can tell a user mistake from an internal invariant failure.

use std::path::PathBuf;

pub type Result<T, E = VendorError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum VendorError {
    /// Conflicting flags, missing arguments, refused targets.
    #[error("{0}")]
    UserInput(String),

    #[error("{0} is already vendored")]
    AlreadyVendored(String),

    #[error("cannot resolve repository for {path}: {reason}")]
    RepositoryResolution { path: String, reason: String },

    #[error("checkout of {url} failed: {reason}")]
    Checkout { url: String, reason: String },

    /// Duplicate or overlapping manifest entry. Never expected from the resolver.
    #[error("manifest consistency violated: {0}")]
    ManifestConsistency(String),

    #[error("dependency {0} not found in manifest")]
    DependencyNotFound(String),

    #[error("manifest {} does not exist", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("manifest {} is malformed: {source}", path.display())]
    ManifestCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to derive the root repo import path: {subpath:?} is not a suffix of {importpath}")]
    Derivation { importpath: String, subpath: String },

    #[error("failed to parse imports of {}: {reason}", file.display())]
    ImportParse { file: PathBuf, reason: String },

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{url}: {reason}")]
    Network { url: String, reason: String },

    /// Context added once while unwinding a recursive fetch.
    #[error("{importpath}: {source}")]
    InDependency {
        importpath: String,
        #[source]
        source: Box<VendorError>,
    },

    #[error("failed to fetch {0} dependencies")]
    RestoreFailed(usize),

    #[error("import cycle at {path} (expanding {})", stack.join(" -> "))]
    CycleDetected { path: String, stack: Vec<String> },
}

impl VendorError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VendorError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn user(msg: impl Into<String>) -> Self {
        VendorError::UserInput(msg.into())
    }

    /// Attach the failing import path unless a deeper level already did.
    pub fn within(self, importpath: &str) -> Self {
        match self {
            wrapped @ VendorError::InDependency { .. } => wrapped,
            other => VendorError::InDependency {
                importpath: importpath.to_string(),
                source: Box::new(other),
            },
        }
    }
}
