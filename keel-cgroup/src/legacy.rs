//! cgroup v1 manager writing controller files directly
//!
//! Under v1 every controller is its own hierarchy, so the manager holds one
//! directory per controller and writes each limit into the matching one.

use async_trait::async_trait;
use keel_core::{Error, ProcessId, Result};
use keel_spec::{Cpu, DeviceRule, Memory, Pids, Resources};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::config::CgroupConfig;
use crate::fs::{join, pids_max_value, remove_tree, write_control};
use crate::manager::{CgroupManager, ManagerKind};
use crate::paths::PathSet;
use crate::pids::{CgroupFs, HostFs, collect_all};

/// Controllers a new v1 cgroup is created in
pub const LEGACY_CONTROLLERS: [&str; 4] = ["cpu", "devices", "memory", "pids"];

/// Manager for one container across the v1 controller hierarchies
#[derive(Debug, Clone)]
pub struct LegacyFsManager {
    paths: PathSet,
    rootless: bool,
}

impl LegacyFsManager {
    /// Bind to `paths`, or derive `root/<controller>/<parent>/<name>` for
    /// each of [`LEGACY_CONTROLLERS`] when `paths` is empty
    ///
    /// # Errors
    /// Configuration error if `paths` is empty and `config` has no name
    pub fn new(root: &Path, config: &CgroupConfig, paths: PathSet) -> Result<Self> {
        let paths = if paths.is_empty() {
            let relative = config.relative_path().ok_or_else(|| {
                Error::configuration("cgroup name is required when no cgroup paths are known")
            })?;
            LEGACY_CONTROLLERS
                .iter()
                .map(|ctrl| {
                    let dir = root.join(ctrl).join(&relative);
                    (*ctrl, dir.display().to_string())
                })
                .collect()
        } else {
            paths
        };

        debug!(controllers = paths.len(), rootless = config.rootless, "Binding v1 cgroups");

        Ok(Self {
            paths,
            rootless: config.rootless,
        })
    }

    fn controller(&self, name: &str) -> Option<PathBuf> {
        self.paths.get(name).map(PathBuf::from)
    }

    /// Directory PIDs are read from: devices, as every container has it
    fn primary(&self) -> Result<PathBuf> {
        self.controller("devices")
            .or_else(|| self.paths.iter().next().map(|(_, p)| PathBuf::from(p)))
            .ok_or_else(|| Error::configuration("no v1 cgroup paths known"))
    }

    async fn set_memory(&self, dir: &Path, memory: &Memory) -> Result<()> {
        let limit = memory.limit.unwrap_or(0);
        let swap = memory.swap.unwrap_or(0);

        // memsw must never drop below the memory limit, so the write order
        // depends on whether the limits are growing.
        if limit != 0 && swap != 0 {
            let current = self.current_limit(dir).await?;
            let growing = swap == -1 || current.is_some_and(|cur| cur < swap);

            if growing {
                self.write(dir, "memory.memsw.limit_in_bytes", swap).await?;
                return self.write(dir, "memory.limit_in_bytes", limit).await;
            }
        }

        if limit != 0 {
            self.write(dir, "memory.limit_in_bytes", limit).await?;
        }
        if swap != 0 {
            self.write(dir, "memory.memsw.limit_in_bytes", swap).await?;
        }
        Ok(())
    }

    /// Current `memory.limit_in_bytes`, `None` when a rootless caller
    /// cannot read it
    async fn current_limit(&self, dir: &Path) -> Result<Option<i64>> {
        let file = dir.join("memory.limit_in_bytes");
        let contents = match fs::read_to_string(&file).await {
            Ok(contents) => contents,
            Err(e) if self.rootless => {
                debug!(
                    file = %file.display(),
                    error = %e,
                    "Cannot read memory limit in rootless mode"
                );
                return Ok(None);
            }
            Err(e) => return Err(Error::io(&file, e)),
        };

        contents
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::validation(format!("{}: {e}", file.display())))
    }

    async fn set_cpu(&self, dir: &Path, cpu: &Cpu) -> Result<()> {
        if let Some(shares) = cpu.shares.filter(|s| *s != 0) {
            self.write(dir, "cpu.shares", shares).await?;
        }
        if let Some(period) = cpu.period.filter(|p| *p != 0) {
            self.write(dir, "cpu.cfs_period_us", period).await?;
        }
        if let Some(quota) = cpu.quota.filter(|q| *q != 0) {
            self.write(dir, "cpu.cfs_quota_us", quota).await?;
        }
        Ok(())
    }

    async fn set_pids(&self, dir: &Path, pids: &Pids) -> Result<()> {
        match pids_max_value(pids.limit) {
            Some(value) => write_control(dir, "pids.max", &value, self.rootless).await,
            None => Ok(()),
        }
    }

    async fn set_devices(&self, dir: &Path, rules: &[DeviceRule]) -> Result<()> {
        for rule in rules {
            let file = if rule.allow {
                "devices.allow"
            } else {
                "devices.deny"
            };
            write_control(dir, file, &device_rule_value(rule), self.rootless).await?;
        }
        Ok(())
    }

    async fn write(&self, dir: &Path, file: &str, value: impl ToString + Send) -> Result<()> {
        write_control(dir, file, &value.to_string(), self.rootless).await
    }
}

#[async_trait]
impl CgroupManager for LegacyFsManager {
    fn kind(&self) -> ManagerKind {
        ManagerKind::LegacyFilesystem
    }

    async fn apply(&self, pid: ProcessId) -> Result<()> {
        for (controller, path) in self.paths.iter() {
            debug!(%controller, "Joining v1 controller");
            join(Path::new(path), pid, self.rootless).await?;
        }
        Ok(())
    }

    async fn set(&self, resources: &Resources) -> Result<()> {
        if let (Some(memory), Some(dir)) = (&resources.memory, self.controller("memory")) {
            self.set_memory(&dir, memory).await?;
        }
        if let (Some(cpu), Some(dir)) = (&resources.cpu, self.controller("cpu")) {
            self.set_cpu(&dir, cpu).await?;
        }
        if let (Some(pids), Some(dir)) = (&resources.pids, self.controller("pids")) {
            self.set_pids(&dir, pids).await?;
        }
        if let Some(dir) = self.controller("devices") {
            self.set_devices(&dir, &resources.devices).await?;
        }
        Ok(())
    }

    fn paths(&self) -> PathSet {
        self.paths.clone()
    }

    async fn pids(&self) -> Result<Vec<ProcessId>> {
        HostFs.read_procs(&self.primary()?).await
    }

    async fn all_pids(&self) -> Result<Vec<ProcessId>> {
        collect_all(&HostFs, &self.primary()?).await
    }

    async fn destroy(&self) -> Result<()> {
        for (_, path) in self.paths.iter() {
            remove_tree(Path::new(path)).await?;
        }
        Ok(())
    }
}

/// `devices.allow`/`devices.deny` line, e.g. `c 1:3 rwm`
#[must_use]
pub fn device_rule_value(rule: &DeviceRule) -> String {
    let number = |n: Option<i64>| n.map_or_else(|| "*".to_string(), |n| n.to_string());
    format!(
        "{} {}:{} {}",
        rule.kind.as_deref().unwrap_or("a"),
        number(rule.major),
        number(rule.minor),
        rule.access.as_deref().unwrap_or("rwm"),
    )
}
