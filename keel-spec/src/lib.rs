//! Runtime specification for container setup
//!
//! This crate provides the declarative document that drives namespace and
//! mount setup:
//! - [`Spec`] and its parts, serialised in the conventional `config.json` layout
//! - [`example`] - a baseline spec for a minimal interactive shell
//! - [`to_rootless`] - adapt a privileged spec for an unprivileged caller
//! - [`NamespaceType`] - namespace kinds and their `CLONE_NEW*` flags

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod example;
pub mod namespace;
pub mod rootless;
pub mod spec;

pub use example::example;
pub use namespace::{Namespace, NamespaceType};
pub use rootless::to_rootless;
pub use spec::{
    Capabilities, Cpu, DeviceRule, IdMapping, Linux, Memory, Mount, Pids, Process, Resources,
    Rlimit, Root, Spec, User,
};
