//! Service manager queries
//!
//! Cgroups can be delegated to a service manager instead of being written
//! directly. The runtime only needs two facts from it: whether it is running
//! at all, and which user owns the session bus it would talk to.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::{Error, Result};

/// Query interface to a host service manager
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Whether the service manager is running as the host's init
    fn is_running(&self) -> bool;

    /// Owning UID of the user-scoped session the caller would talk to
    ///
    /// # Errors
    /// Returns an environment error if the session cannot be queried
    async fn owner_uid(&self) -> Result<u32>;
}

/// systemd, queried through its runtime directory and `busctl`
#[derive(Debug, Clone)]
pub struct Systemd {
    runtime_dir: PathBuf,
}

impl Systemd {
    /// Directory that exists only while systemd is PID 1
    pub const RUNTIME_DIR: &'static str = "/run/systemd/system";

    /// Query the host's systemd
    #[must_use]
    pub fn new() -> Self {
        Self {
            runtime_dir: PathBuf::from(Self::RUNTIME_DIR),
        }
    }

    /// Query a systemd whose runtime directory lives elsewhere
    #[must_use]
    pub fn with_runtime_dir(runtime_dir: impl AsRef<Path>) -> Self {
        Self {
            runtime_dir: runtime_dir.as_ref().to_path_buf(),
        }
    }
}

impl Default for Systemd {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceManager for Systemd {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn is_running(&self) -> bool {
        // symlink_metadata so a dangling link still counts, as lstat would
        let running = std::fs::symlink_metadata(&self.runtime_dir).is_ok();
        debug!(dir = %self.runtime_dir.display(), running, "Checked systemd");
        running
    }

    async fn owner_uid(&self) -> Result<u32> {
        let output = Command::new("busctl")
            .args(["--user", "--no-pager", "status"])
            .output()
            .await
            .map_err(|e| Error::environment(format!("failed to execute busctl: {e}")))?;

        if !output.status.success() {
            return Err(Error::environment(format!(
                "busctl exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_owner_uid(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Extract the `OwnerUID=` value from `busctl status` output
///
/// # Errors
/// Returns an environment error if the field is missing or not a number
pub fn parse_owner_uid(status: &str) -> Result<u32> {
    let value = status
        .lines()
        .find_map(|line| line.trim().strip_prefix("OwnerUID="))
        .ok_or_else(|| Error::environment("OwnerUID not found in busctl output"))?;

    value
        .trim()
        .parse()
        .map_err(|e| Error::environment(format!("invalid OwnerUID {value:?}: {e}")))
}

/// Scripted service manager for tests (never touches the host)
#[derive(Debug, Clone, Default)]
pub struct MockServiceManager {
    running: bool,
    owner_uid: Option<u32>,
}

impl MockServiceManager {
    /// A service manager that is not running
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            running: false,
            owner_uid: None,
        }
    }

    /// A running service manager whose owner lookup returns `uid`
    #[must_use]
    pub const fn running_with_owner(uid: u32) -> Self {
        Self {
            running: true,
            owner_uid: Some(uid),
        }
    }

    /// A running service manager whose owner lookup fails
    #[must_use]
    pub const fn running_without_owner() -> Self {
        Self {
            running: true,
            owner_uid: None,
        }
    }
}

#[async_trait]
impl ServiceManager for MockServiceManager {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn owner_uid(&self) -> Result<u32> {
        self.owner_uid
            .ok_or_else(|| Error::environment("mock: no session bus"))
    }
}
