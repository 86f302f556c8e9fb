//! Privilege decisions for unprivileged and namespaced callers
//!
//! Every function here takes the host facts it needs as arguments (see
//! [`HostContext`](keel_core::HostContext)), so the decisions are
//! deterministic and testable without touching process state.
//!
//! - [`RootlessOverride`] - the tri-state `--rootless` setting
//! - [`should_use_rootless_manager`] - whether the rootless cgroup path applies
//! - [`should_honor_runtime_dir_override`] - whether `$XDG_RUNTIME_DIR` is used
//! - [`runtime_root`] / [`revise_root_dir`] - where runtime state lives

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod rootless;
pub mod runtime_dir;

pub use rootless::{RootlessOverride, should_use_rootless_manager};
pub use runtime_dir::{
    DEFAULT_RUNTIME_ROOT, revise_root_dir, runtime_root, should_honor_runtime_dir_override,
};
