//! Ps command implementation

use anyhow::{Context, Result};
use keel_cgroup::{HostFs, collect_all};
use std::path::Path;

pub async fn execute(cgroup: &Path, json: bool) -> Result<()> {
    tracing::debug!(cgroup = %cgroup.display(), "Listing cgroup processes");

    let pids = collect_all(&HostFs, cgroup)
        .await
        .with_context(|| format!("Failed to list processes in {}", cgroup.display()))?;

    if json {
        println!("{}", serde_json::to_string(&pids)?);
    } else {
        for pid in &pids {
            println!("{pid}");
        }
    }

    Ok(())
}
