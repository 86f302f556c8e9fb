//! Lexical path handling
//!
//! Cgroup paths and mount destinations are compared as strings, so they are
//! normalised purely lexically: no symlink resolution, no filesystem access.

use std::path::Path;

/// Return the shortest path equivalent to `path` by purely lexical processing.
///
/// Repeated separators collapse, `.` segments vanish, `..` removes the segment
/// before it (and is dropped at the root), and trailing separators are
/// removed. An empty input yields `"."`.
#[must_use]
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Whether `path` is absolute and already in [`clean`] form
#[must_use]
pub fn is_clean_absolute(path: &str) -> bool {
    path.starts_with('/') && clean(path) == path
}

/// Resolve `path` against `base` when relative, then clean it
#[must_use]
pub fn absolutize(path: &str, base: &Path) -> String {
    if path.starts_with('/') {
        clean(path)
    } else {
        clean(&format!("{}/{path}", base.display()))
    }
}
