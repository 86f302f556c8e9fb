//! Cgroup manager selection

use keel_core::{CgroupMode, Error, Result, ServiceManager};
use tracing::{debug, info};

use crate::config::CgroupConfig;
use crate::manager::{CgroupManager, ManagerKind};
use crate::paths::{PathSet, resolve_unified_path};

/// Constructs concrete managers, one method per [`ManagerKind`]
///
/// The factory only decides; building the backend is the provider's job.
pub trait BackendProvider: Send + Sync {
    /// cgroup v1 manager writing controller files directly
    fn legacy_filesystem(
        &self,
        config: &CgroupConfig,
        paths: PathSet,
    ) -> Result<Box<dyn CgroupManager>>;

    /// cgroup v1 manager delegating to the service manager
    fn legacy_service_manager(
        &self,
        config: &CgroupConfig,
        paths: PathSet,
    ) -> Result<Box<dyn CgroupManager>>;

    /// cgroup v2 manager writing controller files directly
    fn unified_filesystem(
        &self,
        config: &CgroupConfig,
        path: String,
    ) -> Result<Box<dyn CgroupManager>>;

    /// cgroup v2 manager delegating to the service manager
    fn unified_service_manager(
        &self,
        config: &CgroupConfig,
        path: String,
    ) -> Result<Box<dyn CgroupManager>>;
}

/// Chooses and constructs the one correct cgroup backend
///
/// Host facts (kernel mode, service manager presence) are captured at
/// construction so every decision is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct ManagerFactory<P> {
    provider: P,
    mode: CgroupMode,
    service_manager_running: bool,
}

impl<P: BackendProvider> ManagerFactory<P> {
    /// Create a factory from known host facts
    #[must_use]
    pub const fn new(provider: P, mode: CgroupMode, service_manager_running: bool) -> Self {
        Self {
            provider,
            mode,
            service_manager_running,
        }
    }

    /// Create a factory by probing the host
    ///
    /// # Errors
    /// Returns an error if the cgroup mode cannot be detected
    pub fn detect(provider: P, service_manager: &dyn ServiceManager) -> Result<Self> {
        let mode = CgroupMode::detect()?;
        Ok(Self::new(provider, mode, service_manager.is_running()))
    }

    /// Kernel mode this factory selects for
    #[must_use]
    pub const fn mode(&self) -> CgroupMode {
        self.mode
    }

    /// The backend `config` would get, without constructing it
    ///
    /// # Errors
    /// Same contract violations as [`create`](Self::create), minus path checks
    pub fn select(&self, config: Option<&CgroupConfig>) -> Result<ManagerKind> {
        self.check(config).map(|(_, kind)| kind)
    }

    fn check<'a>(
        &self,
        config: Option<&'a CgroupConfig>,
    ) -> Result<(&'a CgroupConfig, ManagerKind)> {
        let config = config.ok_or_else(|| Error::configuration("cgroup config must not be nil"))?;

        if config.systemd && !self.service_manager_running {
            return Err(Error::environment(
                "systemd not running on this host, cannot use systemd cgroups manager",
            ));
        }

        Ok((config, ManagerKind::select(self.mode, config.systemd)))
    }

    /// Build the manager for `config`
    ///
    /// `paths` holds already-known cgroup paths and may be empty. Under v2 it
    /// must reduce to a single clean path; under v1 it is passed through.
    ///
    /// # Errors
    /// - configuration error if `config` is absent
    /// - environment error if a service manager is requested but not running
    /// - validation error if `paths` violates the unified contract
    /// - whatever the provider returns
    pub fn create(
        &self,
        config: Option<&CgroupConfig>,
        paths: &PathSet,
    ) -> Result<Box<dyn CgroupManager>> {
        let (config, kind) = self.check(config)?;

        debug!(%kind, mode = %self.mode, entries = paths.len(), "Selecting cgroup manager");

        let manager = match kind {
            ManagerKind::UnifiedServiceManager => {
                let path = resolve_unified_path(paths)?;
                self.provider.unified_service_manager(config, path)?
            }
            ManagerKind::UnifiedFilesystem => {
                let path = resolve_unified_path(paths)?;
                self.provider.unified_filesystem(config, path)?
            }
            ManagerKind::LegacyServiceManager => {
                self.provider.legacy_service_manager(config, paths.clone())?
            }
            ManagerKind::LegacyFilesystem => {
                self.provider.legacy_filesystem(config, paths.clone())?
            }
        };

        info!(%kind, "Created cgroup manager");
        Ok(manager)
    }
}
