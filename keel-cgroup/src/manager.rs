//! Manager contract shared by every cgroup backend

use async_trait::async_trait;
use keel_core::{CgroupMode, ProcessId, Result};
use keel_spec::Resources;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::paths::PathSet;

/// The four cgroup backends a container can be governed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagerKind {
    /// cgroup v1, controller files written directly
    LegacyFilesystem,
    /// cgroup v1, delegated to service-manager units
    LegacyServiceManager,
    /// cgroup v2, controller files written directly
    UnifiedFilesystem,
    /// cgroup v2, delegated to service-manager units
    UnifiedServiceManager,
}

impl ManagerKind {
    /// Pick the backend for a kernel mode and service-manager flag
    ///
    /// The mapping is total: every input pair selects exactly one kind.
    #[must_use]
    pub const fn select(mode: CgroupMode, service_manager: bool) -> Self {
        match (mode, service_manager) {
            (CgroupMode::Unified, true) => Self::UnifiedServiceManager,
            (CgroupMode::Unified, false) => Self::UnifiedFilesystem,
            (CgroupMode::Legacy, true) => Self::LegacyServiceManager,
            (CgroupMode::Legacy, false) => Self::LegacyFilesystem,
        }
    }

    /// Kernel mode this backend drives
    #[must_use]
    pub const fn mode(self) -> CgroupMode {
        match self {
            Self::LegacyFilesystem | Self::LegacyServiceManager => CgroupMode::Legacy,
            Self::UnifiedFilesystem | Self::UnifiedServiceManager => CgroupMode::Unified,
        }
    }

    /// Whether this backend delegates to a service manager
    #[must_use]
    pub const fn uses_service_manager(self) -> bool {
        matches!(self, Self::LegacyServiceManager | Self::UnifiedServiceManager)
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LegacyFilesystem => "cgroupfs (v1)",
            Self::LegacyServiceManager => "systemd (v1)",
            Self::UnifiedFilesystem => "cgroupfs (v2)",
            Self::UnifiedServiceManager => "systemd (v2)",
        };
        f.write_str(name)
    }
}

/// Handle to one container's cgroup, bound for the container's lifetime
///
/// Implementations:
/// - [`LegacyFsManager`](crate::legacy::LegacyFsManager) - cgroup v1 files
/// - [`UnifiedFsManager`](crate::unified::UnifiedFsManager) - cgroup v2 files
/// - [`MockManager`](crate::MockManager) - testing without filesystem
///
/// A manager must not be shared between containers.
#[async_trait]
pub trait CgroupManager: Send + Sync + fmt::Debug {
    /// Which backend this is
    fn kind(&self) -> ManagerKind;

    /// Create the cgroup if needed and move `pid` into it
    async fn apply(&self, pid: ProcessId) -> Result<()>;

    /// Write resource limits
    async fn set(&self, resources: &Resources) -> Result<()>;

    /// Paths this manager controls
    fn paths(&self) -> PathSet;

    /// PIDs attached directly to the container's cgroup
    async fn pids(&self) -> Result<Vec<ProcessId>>;

    /// PIDs in the container's cgroup and all of its descendants
    async fn all_pids(&self) -> Result<Vec<ProcessId>>;

    /// Remove the cgroup
    async fn destroy(&self) -> Result<()>;
}
