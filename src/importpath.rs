//! Helpers for slash-separated import paths.

/// True when `path` equals `parent` or lives below it, segment-wise.
pub fn is_within(path: &str, parent: &str) -> bool {
    if parent.is_empty() {
        return false;
    }
    match path.strip_prefix(parent) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Drops any `scheme://` and trailing slashes; the scheme lives in the repository URL.
pub fn strip_scheme(path: &str) -> String {
    let bare = match path.find("://") {
        Some(idx) => &path[idx + 3..],
        None => path,
    };
    // user@host forms keep only the host
    let bare = match (bare.find('@'), bare.find('/')) {
        (Some(at), Some(slash)) if at < slash => &bare[at + 1..],
        (Some(at), None) => &bare[at + 1..],
        _ => bare,
    };
    bare.trim_end_matches('/').to_string()
}

/// Lexically joins and cleans slash paths like Go's `path.Join`.
pub fn join(parts: &[&str]) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let mut absolute = false;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if segments.is_empty() && part.starts_with('/') && i == first_non_empty(parts) {
            absolute = true;
        }
        for seg in part.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    if segments.last().is_some_and(|s| *s != "..") {
                        segments.pop();
                    } else if !absolute {
                        segments.push("..");
                    }
                }
                other => segments.push(other),
            }
        }
    }
    let joined = segments.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

fn first_non_empty(parts: &[&str]) -> usize {
    parts.iter().position(|p| !p.is_empty()).unwrap_or(0)
}

/// Approximates "not a standard library package": the path contains a dot.
///
/// This is policy, not a guarantee. Prefixes listed in `local_prefixes` are
/// always treated as local.
pub fn looks_remote(path: &str, local_prefixes: &[String]) -> bool {
    if local_prefixes.iter().any(|p| is_within(path, p)) {
        return false;
    }
    path.contains('.')
}
