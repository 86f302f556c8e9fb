//! Direct-filesystem backends
//!
//! Shared plumbing for the v1 and v2 managers that write controller files
//! themselves, plus the provider that builds them.

use keel_core::{Error, ProcessId, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::config::CgroupConfig;
use crate::factory::BackendProvider;
use crate::legacy::LegacyFsManager;
use crate::manager::{CgroupManager, ManagerKind};
use crate::paths::PathSet;
use crate::unified::UnifiedFsManager;
use crate::{CGROUP_ROOT, PROCS_FILE};

/// Builds the filesystem managers below a cgroup mount point
///
/// Service-manager kinds are rejected: delegating to unit lifecycles needs a
/// provider that speaks to the service manager.
#[derive(Debug, Clone)]
pub struct FsProvider {
    root: PathBuf,
}

impl FsProvider {
    /// Provider for the host's cgroup mount
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(CGROUP_ROOT)
    }

    /// Provider for a cgroup hierarchy mounted at `root`
    #[must_use]
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Mount point managers are created under
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unsupported(kind: ManagerKind) -> Error {
        Error::environment(format!(
            "no service-manager backend available for {kind}; use the cgroupfs driver"
        ))
    }
}

impl Default for FsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendProvider for FsProvider {
    fn legacy_filesystem(
        &self,
        config: &CgroupConfig,
        paths: PathSet,
    ) -> Result<Box<dyn CgroupManager>> {
        Ok(Box::new(LegacyFsManager::new(&self.root, config, paths)?))
    }

    fn legacy_service_manager(
        &self,
        _config: &CgroupConfig,
        _paths: PathSet,
    ) -> Result<Box<dyn CgroupManager>> {
        Err(Self::unsupported(ManagerKind::LegacyServiceManager))
    }

    fn unified_filesystem(
        &self,
        config: &CgroupConfig,
        path: String,
    ) -> Result<Box<dyn CgroupManager>> {
        Ok(Box::new(UnifiedFsManager::new(&self.root, config, &path)?))
    }

    fn unified_service_manager(
        &self,
        _config: &CgroupConfig,
        _path: String,
    ) -> Result<Box<dyn CgroupManager>> {
        Err(Self::unsupported(ManagerKind::UnifiedServiceManager))
    }
}

/// Contents for `pids.max`, `None` when the limit is unset (`0`)
pub(crate) fn pids_max_value(limit: i64) -> Option<String> {
    match limit {
        0 => None,
        l if l < 0 => Some("max".to_string()),
        l => Some(l.to_string()),
    }
}

/// Write `value` to the control file `file` in `dir`
///
/// Rootless managers usually lack write access to controller files; for them
/// permission errors are logged and skipped.
pub(crate) async fn write_control(
    dir: &Path,
    file: &str,
    value: &str,
    rootless: bool,
) -> Result<()> {
    let path = dir.join(file);
    debug!(file = %path.display(), value, "Writing cgroup control file");

    match fs::write(&path, value).await {
        Ok(()) => Ok(()),
        Err(e) if rootless && e.kind() == std::io::ErrorKind::PermissionDenied => {
            warn!(file = %path.display(), "Permission denied in rootless mode, skipping");
            Ok(())
        }
        Err(e) => Err(Error::io(&path, e)),
    }
}

/// Create the cgroup `dir` if needed and move `pid` into it
pub(crate) async fn join(dir: &Path, pid: ProcessId, rootless: bool) -> Result<()> {
    if let Err(e) = fs::create_dir_all(dir).await {
        if rootless && e.kind() == std::io::ErrorKind::PermissionDenied {
            warn!(cgroup = %dir.display(), "Cannot create cgroup in rootless mode, skipping");
            return Ok(());
        }
        return Err(Error::io(dir, e));
    }

    debug!(cgroup = %dir.display(), %pid, "Adding process to cgroup");
    write_control(dir, PROCS_FILE, &pid.to_string(), rootless).await
}

/// Remove the cgroup `dir` and every cgroup below it, deepest first
///
/// A cgroup directory that is already gone counts as removed.
pub(crate) async fn remove_tree(dir: &Path) -> Result<()> {
    let mut ordered = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut reader = match fs::read_dir(&current).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::io(&current, e)),
        };

        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| Error::io(&current, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| Error::io(entry.path(), e))?
                .is_dir();
            if is_dir {
                pending.push(entry.path());
            }
        }
        ordered.push(current);
    }

    for cgroup in ordered.iter().rev() {
        match fs::remove_dir(cgroup).await {
            Ok(()) => debug!(cgroup = %cgroup.display(), "Removed cgroup"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(cgroup, e)),
        }
    }

    Ok(())
}
