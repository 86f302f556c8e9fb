//! Where runtime state lives

use keel_core::host::ROOT_USER;
use keel_core::path::absolutize;
use keel_core::{Error, HostContext, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// State root for real root and for callers without `$XDG_RUNTIME_DIR`
pub const DEFAULT_RUNTIME_ROOT: &str = "/run/keel";

const RUNTIME_SUBDIR: &str = "keel";

/// Whether `$XDG_RUNTIME_DIR` should relocate runtime state
///
/// Real root keeps the fixed [`DEFAULT_RUNTIME_ROOT`] even when the variable
/// is set (e.g. `/run/user/0` from a login session). Inside a user namespace
/// euid 0 only stays on the fixed path when `$USER` is exactly `root`.
#[must_use]
pub fn should_honor_runtime_dir_override(
    euid: u32,
    in_user_namespace: bool,
    user: Option<&str>,
) -> bool {
    if euid != 0 {
        return true;
    }
    if !in_user_namespace {
        return false;
    }
    user != Some(ROOT_USER)
}

/// Make an explicit `--root` absolute against `cwd` and clean it
///
/// # Errors
/// Validation error when the result is `/`: `/` itself, enough `..`
/// segments, or an empty value or `.` while `cwd` is `/`.
pub fn revise_root_dir(raw: &str, cwd: &Path) -> Result<PathBuf> {
    let root = absolutize(raw, cwd);
    if root == "/" {
        return Err(Error::validation("option --root argument should not be set to /"));
    }
    Ok(PathBuf::from(root))
}

/// Directory runtime state is kept in
///
/// An explicit root wins after [`revise_root_dir`]. Otherwise
/// `$XDG_RUNTIME_DIR/keel` when the override is honoured, else
/// [`DEFAULT_RUNTIME_ROOT`].
///
/// # Errors
/// Propagates [`revise_root_dir`] failures
pub fn runtime_root(host: &HostContext, explicit: Option<&str>, cwd: &Path) -> Result<PathBuf> {
    if let Some(raw) = explicit {
        return revise_root_dir(raw, cwd);
    }

    let honor =
        should_honor_runtime_dir_override(host.euid, host.in_user_namespace, host.user.as_deref());
    let root = match &host.xdg_runtime_dir {
        Some(dir) if honor => dir.join(RUNTIME_SUBDIR),
        _ => PathBuf::from(DEFAULT_RUNTIME_ROOT),
    };

    debug!(root = %root.display(), honor, "Selected runtime root");
    Ok(root)
}
