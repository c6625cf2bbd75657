//! Scope rules for hierarchical parameter paths.

/// Strips trailing separators; the root becomes the empty string.
fn normalize_base(base: Option<&str>) -> &str {
    base.map(|b| b.trim_end_matches('/')).unwrap_or("")
}

/// Returns the parent of `path`, or `""` for a top-level entry.
pub fn parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Decides whether `candidate` belongs to the fetch rooted at `base`.
///
/// Non-recursive fetches take only direct children of `base`. Recursive ones
/// take everything beneath it. `None` (or `"/"`) is the root of the store.
pub fn in_scope(candidate: &str, base: Option<&str>, recursive: bool) -> bool {
    let base = normalize_base(base);
    if recursive {
        candidate
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    } else {
        parent(candidate) == base
    }
}

/// `full_path` with `base` removed, when it lies under it.
pub fn strip_base<'a>(full_path: &'a str, base: Option<&str>) -> Option<&'a str> {
    let base = normalize_base(base);
    full_path
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
}

/// Whether `prefix` covers `path`, matching whole segments only.
///
/// `/service` covers `/service` and `/service/db` but not `/services/db`.
/// The empty prefix covers everything.
pub fn has_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix).is_some_and(|rest| {
        prefix.is_empty() || prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/')
    })
}
