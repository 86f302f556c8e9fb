//! Check command implementation

use anyhow::{Context, Result};
use keel_cgroup::{CgroupConfig, FsProvider, ManagerFactory, PathSet, resolve_unified_path};
use keel_core::{CgroupMode, HostContext, ServiceManager, Systemd};
use keel_policy::{RootlessOverride, runtime_root, should_use_rootless_manager};
use tracing::debug;

pub struct Options {
    pub root: Option<String>,
    pub rootless: RootlessOverride,
    pub systemd_cgroup: bool,
    pub cgroup_path: Option<String>,
}

pub async fn execute(options: Options) -> Result<()> {
    let host = HostContext::detect();
    let systemd = Systemd::new();

    let cwd = std::env::current_dir().context("Failed to get working directory")?;
    let root = runtime_root(&host, options.root.as_deref(), &cwd)?;

    let rootless =
        should_use_rootless_manager(options.rootless, &host, options.systemd_cgroup, &systemd)
            .await;

    let factory = ManagerFactory::detect(FsProvider::new(), &systemd)
        .context("Failed to detect cgroup mode")?;
    let config = CgroupConfig::new()
        .with_systemd(options.systemd_cgroup)
        .with_rootless(rootless);
    let kind = factory.select(Some(&config))?;

    debug!(%kind, rootless, "Resolved cgroup setup");

    println!("cgroup mode: {}", factory.mode());
    println!("systemd running: {}", systemd.is_running());
    println!("rootless: {rootless}");
    println!("manager: {kind}");

    if let Some(path) = options.cgroup_path {
        let path = if factory.mode() == CgroupMode::Unified {
            resolve_unified_path(&PathSet::unified(path))?
        } else {
            path
        };
        println!("cgroup path: {path}");
    }

    println!("runtime root: {}", root.display());
    Ok(())
}
