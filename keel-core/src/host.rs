//! Host state snapshots
//!
//! Everything here reads ambient process or kernel state exactly once and
//! hands back a plain value, so policy and factory code can take it as an
//! explicit input and stay deterministic under test.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Error, Result};

/// Default mount point of the cgroup filesystem
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Account name that marks the real root user
pub const ROOT_USER: &str = "root";

const UID_MAP_PATH: &str = "/proc/self/uid_map";

/// Which cgroup hierarchy the kernel exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CgroupMode {
    /// cgroup v1: one hierarchy per controller
    Legacy,
    /// cgroup v2: a single unified hierarchy
    Unified,
}

impl CgroupMode {
    /// Detect the mode of the cgroup filesystem mounted at [`CGROUP_ROOT`]
    ///
    /// # Errors
    /// Returns a system error if `statfs(2)` fails for any reason other than
    /// the mount point being absent
    pub fn detect() -> Result<Self> {
        Self::detect_at(Path::new(CGROUP_ROOT))
    }

    /// Detect the mode of the cgroup filesystem mounted at `root`
    ///
    /// An absent mount point counts as legacy.
    ///
    /// # Errors
    /// Returns a system error if `statfs(2)` fails with anything but `ENOENT`
    pub fn detect_at(root: &Path) -> Result<Self> {
        use nix::sys::statfs::{CGROUP2_SUPER_MAGIC, statfs};

        let mode = match statfs(root) {
            Ok(stat) if stat.filesystem_type() == CGROUP2_SUPER_MAGIC => Self::Unified,
            Ok(_) | Err(nix::errno::Errno::ENOENT) => Self::Legacy,
            Err(e) => return Err(Error::System(e)),
        };

        debug!(root = %root.display(), ?mode, "Detected cgroup mode");
        Ok(mode)
    }

    /// Whether this is the unified (v2) hierarchy
    #[must_use]
    pub const fn is_unified(self) -> bool {
        matches!(self, Self::Unified)
    }
}

impl fmt::Display for CgroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("v1 (legacy)"),
            Self::Unified => f.write_str("v2 (unified)"),
        }
    }
}

/// Identity and namespace facts about the calling process
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostContext {
    /// Effective user ID
    pub euid: u32,

    /// Effective group ID
    pub egid: u32,

    /// Whether the process runs inside a (non-initial) user namespace
    pub in_user_namespace: bool,

    /// Value of `$USER`, if set
    pub user: Option<String>,

    /// Value of `$XDG_RUNTIME_DIR`, if set
    pub xdg_runtime_dir: Option<PathBuf>,
}

impl HostContext {
    /// Snapshot the current process
    #[must_use]
    pub fn detect() -> Self {
        let ctx = Self {
            euid: nix::unistd::geteuid().as_raw(),
            egid: nix::unistd::getegid().as_raw(),
            in_user_namespace: running_in_user_namespace(),
            user: std::env::var("USER").ok(),
            xdg_runtime_dir: std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from),
        };

        debug!(
            euid = ctx.euid,
            egid = ctx.egid,
            userns = ctx.in_user_namespace,
            "Detected host context"
        );
        ctx
    }

    /// A context for the real root user in the initial namespace
    #[must_use]
    pub fn root() -> Self {
        Self {
            user: Some(ROOT_USER.to_string()),
            ..Self::default()
        }
    }

    /// Set effective user and group IDs
    #[must_use]
    pub const fn with_ids(mut self, euid: u32, egid: u32) -> Self {
        self.euid = euid;
        self.egid = egid;
        self
    }

    /// Set user namespace membership
    #[must_use]
    pub const fn with_user_namespace(mut self, inside: bool) -> Self {
        self.in_user_namespace = inside;
        self
    }

    /// Set the declared user name
    #[must_use]
    pub fn with_user(mut self, user: Option<&str>) -> Self {
        self.user = user.map(str::to_string);
        self
    }

    /// Set the runtime directory override
    #[must_use]
    pub fn with_xdg_runtime_dir(mut self, dir: Option<&Path>) -> Self {
        self.xdg_runtime_dir = dir.map(Path::to_path_buf);
        self
    }
}

/// Whether the calling process is inside a user namespace
///
/// Unreadable `/proc/self/uid_map` (no user namespace support) means no.
#[must_use]
pub fn running_in_user_namespace() -> bool {
    match std::fs::read_to_string(UID_MAP_PATH) {
        Ok(contents) => uid_map_in_user_namespace(&contents),
        Err(e) => {
            debug!(error = %e, "Could not read {UID_MAP_PATH}");
            false
        }
    }
}

/// Interpret the contents of a `uid_map` file
///
/// The initial namespace maps the full 32-bit range identically
/// (`0 0 4294967295`); anything else means a user namespace. Empty or
/// unparsable contents count as the initial namespace.
#[must_use]
pub fn uid_map_in_user_namespace(contents: &str) -> bool {
    let Some(line) = contents.lines().next() else {
        return false;
    };

    let fields: Vec<u64> = match line
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
    {
        Ok(fields) => fields,
        Err(_) => return false,
    };

    match fields.as_slice() {
        [inside, outside, count] => {
            !(*inside == 0 && *outside == 0 && *count == u64::from(u32::MAX))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_map_initial_namespace() {
        assert!(!uid_map_in_user_namespace(
            "         0          0 4294967295\n"
        ));
    }

    #[test]
    fn test_uid_map_user_namespace() {
        assert!(uid_map_in_user_namespace("         0       1000          1\n"));
        assert!(uid_map_in_user_namespace(
            "0 100000 65536\n65536 200000 1000\n"
        ));
    }

    #[test]
    fn test_uid_map_degenerate() {
        assert!(!uid_map_in_user_namespace(""));
        assert!(!uid_map_in_user_namespace("garbage"));
        assert!(!uid_map_in_user_namespace("0 0"));
    }

    #[test]
    fn test_detect_missing_root_is_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-mount");
        assert_eq!(CgroupMode::detect_at(&missing).unwrap(), CgroupMode::Legacy);
    }

    #[test]
    fn test_detect_plain_directory_is_legacy() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(CgroupMode::detect_at(dir.path()).unwrap(), CgroupMode::Legacy);
    }

    #[test]
    fn test_context_builder() {
        let ctx = HostContext::root()
            .with_ids(1000, 1000)
            .with_user_namespace(true)
            .with_user(Some("alice"))
            .with_xdg_runtime_dir(Some(Path::new("/run/user/1000")));

        assert_eq!(ctx.euid, 1000);
        assert!(ctx.in_user_namespace);
        assert_eq!(ctx.user.as_deref(), Some("alice"));
        assert_eq!(ctx.xdg_runtime_dir, Some(PathBuf::from("/run/user/1000")));
    }
}
