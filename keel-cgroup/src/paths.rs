//! Controller-to-path mapping and the unified single-path contract

use keel_core::{Error, Result, path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Key reserved for the unified hierarchy
pub const UNIFIED_KEY: &str = "";

/// Absolute cgroup path per controller
///
/// cgroup v1 keys entries by controller name (`cpu`, `memory`, ...). cgroup
/// v2 has exactly one path, keyed by the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSet(BTreeMap<String, String>);

impl PathSet {
    /// An empty set ("no path known yet")
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding only the unified path
    #[must_use]
    pub fn unified(path: impl Into<String>) -> Self {
        let mut set = Self::new();
        set.insert(UNIFIED_KEY, path);
        set
    }

    /// Add or replace the path for `controller`
    pub fn insert(&mut self, controller: impl Into<String>, path: impl Into<String>) {
        self.0.insert(controller.into(), path.into());
    }

    /// Path for `controller`
    #[must_use]
    pub fn get(&self, controller: &str) -> Option<&str> {
        self.0.get(controller).map(String::as_str)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no entry exists
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(controller, path)` pairs in controller order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Reduce `paths` to the single unified cgroup path
///
/// More than one entry means stale per-controller bookkeeping. A missing
/// unified key is an empty path, which is legal. A non-empty path must be
/// absolute and lexically clean.
///
/// # Errors
/// Returns a validation error for a multi-entry set or a malformed path
pub fn resolve_unified_path(paths: &PathSet) -> Result<String> {
    if paths.len() > 1 {
        let entries: Vec<String> = paths.iter().map(|(k, v)| format!("{k:?}: {v:?}")).collect();
        return Err(Error::validation(format!(
            "inconsistent paths: expected a single unified path, got {{{}}}",
            entries.join(", ")
        )));
    }

    let resolved = paths.get(UNIFIED_KEY).unwrap_or_default();
    if !resolved.is_empty() && !path::is_clean_absolute(resolved) {
        return Err(Error::validation(format!(
            "inconsistent paths: invalid path {resolved:?}"
        )));
    }

    debug!(path = resolved, "Resolved unified cgroup path");
    Ok(resolved.to_string())
}
