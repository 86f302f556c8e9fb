//! Cgroup management with pluggable backends
//!
//! This crate decides which cgroup backend governs a container and provides
//! the read path over a cgroup subtree:
//! - [`ManagerFactory`] maps kernel mode and config onto one [`ManagerKind`]
//! - [`resolve_unified_path`] enforces the single-path contract of cgroup v2
//! - [`collect_all`] enumerates every PID under a cgroup directory
//! - [`FsProvider`] builds the direct-filesystem managers for v1 and v2

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod factory;
pub mod fs;
pub mod legacy;
pub mod manager;
pub mod mock;
pub mod paths;
pub mod pids;
pub mod unified;

pub use config::CgroupConfig;
pub use factory::{BackendProvider, ManagerFactory};
pub use fs::FsProvider;
pub use legacy::LegacyFsManager;
pub use manager::{CgroupManager, ManagerKind};
pub use mock::{MockManager, MockProvider};
pub use paths::{PathSet, resolve_unified_path};
pub use pids::{CgroupFs, HostFs, MockCgroupFs, MockTree, collect_all};
pub use unified::UnifiedFsManager;

pub use keel_core::host::CGROUP_ROOT;

/// File listing the PIDs attached directly to a cgroup node (v1 and v2)
pub const PROCS_FILE: &str = "cgroup.procs";
