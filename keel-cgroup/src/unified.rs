//! cgroup v2 manager writing controller files directly

use async_trait::async_trait;
use keel_core::{Error, ProcessId, Result};
use keel_spec::{Cpu, Memory, Pids, Resources};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::CgroupConfig;
use crate::fs::{join, pids_max_value, remove_tree, write_control};
use crate::manager::{CgroupManager, ManagerKind};
use crate::paths::PathSet;
use crate::pids::{CgroupFs, HostFs, collect_all};

/// Manager for a single node in the unified hierarchy
#[derive(Debug, Clone)]
pub struct UnifiedFsManager {
    path: PathBuf,
    rootless: bool,
}

impl UnifiedFsManager {
    /// Bind to `path`, or to `root/<parent>/<name>` when `path` is empty
    ///
    /// # Errors
    /// Configuration error if `path` is empty and `config` has no name
    pub fn new(root: &Path, config: &CgroupConfig, path: &str) -> Result<Self> {
        let path = if path.is_empty() {
            let relative = config.relative_path().ok_or_else(|| {
                Error::configuration("cgroup name is required when no cgroup path is known")
            })?;
            root.join(relative)
        } else {
            PathBuf::from(path)
        };

        debug!(cgroup = %path.display(), rootless = config.rootless, "Binding unified cgroup");

        Ok(Self {
            path,
            rootless: config.rootless,
        })
    }

    /// The cgroup directory
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, file: &str, value: &str) -> Result<()> {
        write_control(&self.path, file, value, self.rootless).await
    }

    async fn set_memory(&self, memory: &Memory) -> Result<()> {
        let limit = memory.limit.unwrap_or(0);
        let swap = memory_swap_value(memory.swap.unwrap_or(0), limit)?;

        if swap != 0 {
            self.write("memory.swap.max", &limit_value(swap)).await?;
        }
        if limit != 0 {
            self.write("memory.max", &limit_value(limit)).await?;
        }
        Ok(())
    }

    async fn set_cpu(&self, cpu: &Cpu) -> Result<()> {
        if let Some(shares) = cpu.shares.filter(|s| *s != 0) {
            self.write("cpu.weight", &shares_to_weight(shares).to_string()).await?;
        }
        if let Some(max) = cpu_max_value(cpu.quota, cpu.period) {
            self.write("cpu.max", &max).await?;
        }
        Ok(())
    }

    async fn set_pids(&self, pids: &Pids) -> Result<()> {
        match pids_max_value(pids.limit) {
            Some(value) => self.write("pids.max", &value).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CgroupManager for UnifiedFsManager {
    fn kind(&self) -> ManagerKind {
        ManagerKind::UnifiedFilesystem
    }

    async fn apply(&self, pid: ProcessId) -> Result<()> {
        join(&self.path, pid, self.rootless).await
    }

    async fn set(&self, resources: &Resources) -> Result<()> {
        if let Some(memory) = &resources.memory {
            self.set_memory(memory).await?;
        }
        if let Some(cpu) = &resources.cpu {
            self.set_cpu(cpu).await?;
        }
        if let Some(pids) = &resources.pids {
            self.set_pids(pids).await?;
        }
        if !resources.devices.is_empty() {
            warn!(
                rules = resources.devices.len(),
                "Device rules need an eBPF program under cgroup v2, not applied"
            );
        }
        Ok(())
    }

    fn paths(&self) -> PathSet {
        PathSet::unified(self.path.display().to_string())
    }

    async fn pids(&self) -> Result<Vec<ProcessId>> {
        HostFs.read_procs(&self.path).await
    }

    async fn all_pids(&self) -> Result<Vec<ProcessId>> {
        collect_all(&HostFs, &self.path).await
    }

    async fn destroy(&self) -> Result<()> {
        remove_tree(&self.path).await
    }
}

/// `-1` means unlimited, spelled `max` in v2 files
fn limit_value(value: i64) -> String {
    if value == -1 {
        "max".to_string()
    } else {
        value.to_string()
    }
}

/// Convert a v1 memory+swap limit into a v2 swap-only limit
///
/// `0` means unset on both sides.
pub fn memory_swap_value(swap: i64, memory: i64) -> Result<i64> {
    // Unlimited memory with unset swap means unlimited swap too.
    if memory == -1 && swap == 0 {
        return Ok(-1);
    }
    if swap == -1 || swap == 0 {
        return Ok(swap);
    }
    if memory == 0 || memory == -1 {
        return Err(Error::validation("unable to set swap limit without memory limit"));
    }
    if memory < 0 {
        return Err(Error::validation(format!("invalid memory value: {memory}")));
    }
    if swap < memory {
        return Err(Error::validation("memory+swap limit should be >= memory limit"));
    }
    Ok(swap - memory)
}

/// Map v1 `cpu.shares` (2..=262144) onto v2 `cpu.weight` (1..=10000)
#[must_use]
pub const fn shares_to_weight(shares: u64) -> u64 {
    if shares == 0 {
        return 0;
    }
    1 + (shares.saturating_sub(2) * 9999) / 262_142
}

/// Contents for `cpu.max`, `None` when neither quota nor period is set
#[must_use]
pub fn cpu_max_value(quota: Option<i64>, period: Option<u64>) -> Option<String> {
    let quota = quota.unwrap_or(0);
    let period = period.unwrap_or(0);
    if quota == 0 && period == 0 {
        return None;
    }

    let mut value = if quota > 0 {
        quota.to_string()
    } else {
        "max".to_string()
    };
    if period != 0 {
        value.push(' ');
        value.push_str(&period.to_string());
    }
    Some(value)
}
