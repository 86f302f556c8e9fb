use crate::cli::{Cli, Commands};
use anyhow::Result;

pub mod check;
pub mod ps;
pub mod spec;

/// Dispatch command to appropriate handler
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Spec {
            bundle,
            rootless_spec,
        } => spec::execute(&bundle, rootless_spec).await,

        Commands::Ps { cgroup_path, json } => ps::execute(&cgroup_path, json).await,

        Commands::Check { cgroup_path } => {
            let options = check::Options {
                root: cli.root,
                rootless: cli.rootless,
                systemd_cgroup: cli.systemd_cgroup,
                cgroup_path,
            };
            check::execute(options).await
        }
    }
}
