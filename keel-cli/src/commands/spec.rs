//! Spec command implementation

use anyhow::{Context, Result, bail};
use keel_core::{CgroupMode, HostContext};
use std::path::Path;
use tracing::info;

const CONFIG_FILE: &str = "config.json";

pub async fn execute(bundle: &Path, rootless: bool) -> Result<()> {
    let config = bundle.join(CONFIG_FILE);
    if tokio::fs::try_exists(&config)
        .await
        .with_context(|| format!("Failed to check {}", config.display()))?
    {
        bail!("File {} exists. Remove it first", config.display());
    }

    let mode = CgroupMode::detect().context("Failed to detect cgroup mode")?;
    let mut spec = keel_spec::example(mode);

    if rootless {
        let host = HostContext::detect();
        keel_spec::to_rootless(&mut spec, host.euid, host.egid);
        info!(uid = host.euid, gid = host.egid, "Adapted spec for rootless use");
    }

    spec.save(&config)
        .await
        .with_context(|| format!("Failed to write {}", config.display()))?;

    info!(path = %config.display(), %mode, "Wrote spec");
    Ok(())
}
