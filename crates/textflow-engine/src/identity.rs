//! Hierarchical path and name helpers
//!
//! Paths are slash-delimited (`/looper1/loop_in`) and rooted at `/`.
//! Names are a single path component.

use crate::constants::paths::{ROOT, SEPARATOR};
use crate::error::{NodeEngineError, Result};

/// Check that a name can be used as a path component
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && name != "."
        && name != "..";
    if valid {
        Ok(())
    } else {
        Err(NodeEngineError::InvalidName(name.to_string()))
    }
}

/// Join a parent path and a child name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("{}{}", ROOT, name)
    } else {
        format!("{}{}{}", parent, SEPARATOR, name)
    }
}

/// Parent path of `path` (`/` for top-level nodes)
pub fn parent_path(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(0) | None => ROOT,
        Some(pos) => &path[..pos],
    }
}

/// Number of components in a path (`/a` → 1, `/a/b` → 2)
pub fn depth(path: &str) -> usize {
    path.split(SEPARATOR).filter(|c| !c.is_empty()).count()
}

/// Whether `path` lies strictly below `ancestor`
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return path != ROOT;
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}

/// Replace the `old_prefix` of `path` with `new_prefix`
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> String {
    if path == old_prefix {
        new_prefix.to_string()
    } else {
        format!("{}{}", new_prefix, &path[old_prefix.len()..])
    }
}

/// Split a trailing run of digits off a name (`text12` → (`text`, Some(12)))
pub fn split_numeric_suffix(name: &str) -> (&str, Option<u64>) {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let suffix = &name[stem.len()..];
    if stem.is_empty() {
        return (name, None);
    }
    (stem, suffix.parse().ok())
}

/// First name derived from `base` for which `taken` is false
///
/// An existing numeric suffix is incremented, otherwise one is appended.
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let (stem, suffix) = split_numeric_suffix(base);
    let mut n = suffix.map(|n| n + 1).unwrap_or(1);
    loop {
        let candidate = format!("{}{}", stem, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
