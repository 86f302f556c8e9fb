//! CLI argument definitions

use clap::{Parser, Subcommand};
use keel_policy::RootlessOverride;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Keel cgroup and rootless runtime layer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Root directory for runtime state
    #[arg(long, global = true)]
    pub root: Option<String>,

    /// Use the rootless cgroup manager: true, false or auto
    #[arg(long, global = true, env = "KEEL_ROOTLESS", default_value = "auto")]
    pub rootless: RootlessOverride,

    /// Manage cgroups through systemd
    #[arg(long, global = true)]
    pub systemd_cgroup: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a baseline config.json into a bundle
    Spec {
        /// Bundle directory
        #[arg(short, long, default_value = ".")]
        bundle: PathBuf,

        /// Adapt the spec for an unprivileged user
        #[arg(long)]
        rootless_spec: bool,
    },

    /// List every PID under a cgroup directory
    Ps {
        /// Cgroup directory to walk
        cgroup_path: PathBuf,

        /// Print a JSON array instead of one PID per line
        #[arg(long)]
        json: bool,
    },

    /// Show which cgroup manager and runtime root would be used
    Check {
        /// Already-known cgroup path to validate
        #[arg(long)]
        cgroup_path: Option<String>,
    },
}
