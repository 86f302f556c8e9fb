//! Keel Core - Foundation types, errors, and host checks
//!
//! This crate provides the shared vocabulary used throughout Keel: the error
//! kinds every component returns, strongly typed identifiers, lexical path
//! handling, and the checks that snapshot host state (cgroup mode, effective
//! IDs, user namespace membership, service manager).

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod host;
pub mod path;
pub mod service;
pub mod types;

pub use error::{Error, Result};
pub use host::{CgroupMode, HostContext};
pub use service::{MockServiceManager, ServiceManager, Systemd};
pub use types::{ContainerId, ProcessId};
