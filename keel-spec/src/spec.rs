//! Runtime specification document
//!
//! Field names follow the conventional `config.json` layout so a spec
//! written here can be consumed by any runtime reading that format.

use keel_core::{Error, Result};
use nix::sched::CloneFlags;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::namespace::{self, Namespace, NamespaceType};

/// Version of the document format this crate writes
pub const SPEC_VERSION: &str = "1.0.2";

/// The container's declarative configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    /// Document format version
    pub oci_version: String,

    /// Root filesystem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Root>,

    /// Container process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<Process>,

    /// Hostname inside the UTS namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Mounts, applied in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,

    /// Linux-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<Linux>,
}

impl Spec {
    /// Check the document's structural invariants
    ///
    /// # Errors
    /// Returns a validation error for duplicate namespace kinds or empty ID
    /// mappings
    pub fn validate(&self) -> Result<()> {
        if let Some(linux) = &self.linux {
            linux.validate()?;
        }
        Ok(())
    }

    /// Read and validate a spec from a JSON file
    ///
    /// # Errors
    /// Returns an I/O error naming `path`, a JSON error, or a validation error
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::io(path, e))?;

        let spec: Self = serde_json::from_slice(&bytes)?;
        spec.validate()?;

        debug!(path = %path.display(), "Loaded spec");
        Ok(spec)
    }

    /// Write the spec as pretty-printed JSON
    ///
    /// # Errors
    /// Returns an I/O error naming `path` or a JSON error
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| Error::io(path, e))?;

        debug!(path = %path.display(), "Saved spec");
        Ok(())
    }
}

/// Root filesystem of the container
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Root {
    /// Path to the root filesystem, relative to the bundle
    pub path: String,

    /// Mount the root filesystem read-only
    #[serde(default)]
    pub readonly: bool,
}

/// The container's init process
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// Attach a pseudo-terminal
    #[serde(default)]
    pub terminal: bool,

    /// Identity the process runs as
    #[serde(default)]
    pub user: User,

    /// Argument vector
    pub args: Vec<String>,

    /// Environment, as `KEY=value` strings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    /// Working directory
    pub cwd: String,

    /// Set `PR_SET_NO_NEW_PRIVS`
    #[serde(default)]
    pub no_new_privileges: bool,

    /// Capability sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,

    /// Resource limits applied with `setrlimit(2)`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rlimits: Vec<Rlimit>,
}

/// Process identity inside the container
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID
    pub uid: u32,

    /// Group ID
    pub gid: u32,

    /// Supplementary group IDs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_gids: Vec<u32>,
}

/// Capability sets, as `CAP_*` names
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Bounding set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounding: Vec<String>,

    /// Effective set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effective: Vec<String>,

    /// Inheritable set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inheritable: Vec<String>,

    /// Permitted set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permitted: Vec<String>,

    /// Ambient set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ambient: Vec<String>,
}

impl Capabilities {
    /// The same capabilities in the bounding, effective, permitted, and ambient sets
    #[must_use]
    pub fn mirrored<S: AsRef<str>>(caps: &[S]) -> Self {
        let caps: Vec<String> = caps.iter().map(|c| c.as_ref().to_string()).collect();
        Self {
            bounding: caps.clone(),
            effective: caps.clone(),
            inheritable: Vec::new(),
            permitted: caps.clone(),
            ambient: caps,
        }
    }
}

/// A POSIX resource limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rlimit {
    /// Limit name, e.g. `RLIMIT_NOFILE`
    #[serde(rename = "type")]
    pub kind: String,

    /// Hard limit
    pub hard: u64,

    /// Soft limit
    pub soft: u64,
}

/// A filesystem mount
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mount {
    /// Mount point inside the container
    pub destination: String,

    /// Filesystem type
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Device, directory, or pseudo-filesystem name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Mount options: flags and `key=value` pairs, kept as opaque tokens
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Mount {
    /// Create a mount
    #[must_use]
    pub fn new(destination: &str, kind: &str, source: &str, options: &[&str]) -> Self {
        Self {
            destination: destination.to_string(),
            kind: kind.to_string(),
            source: source.to_string(),
            options: options.iter().map(ToString::to_string).collect(),
        }
    }

    /// Whether the destination is lexically `path`
    #[must_use]
    pub fn targets(&self, path: &str) -> bool {
        keel_core::path::clean(&self.destination) == path
    }

    /// Drop every option whose key is one of `keys` (`key=value` form)
    pub fn remove_keyed_options(&mut self, keys: &[&str]) {
        self.options.retain(|option| {
            !keys.iter().any(|key| {
                option
                    .strip_prefix(key)
                    .is_some_and(|rest| rest.starts_with('='))
            })
        });
    }
}

/// Linux-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linux {
    /// UID translation for the user namespace
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uid_mappings: Vec<IdMapping>,

    /// GID translation for the user namespace
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gid_mappings: Vec<IdMapping>,

    /// Resource-control limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,

    /// Namespaces, at most one per kind
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<Namespace>,

    /// Paths masked inside the container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masked_paths: Vec<String>,

    /// Paths remounted read-only inside the container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readonly_paths: Vec<String>,
}

impl Linux {
    /// The entry for `kind`, if requested
    #[must_use]
    pub fn namespace(&self, kind: NamespaceType) -> Option<&Namespace> {
        self.namespaces.iter().find(|ns| ns.kind == kind)
    }

    /// Whether a namespace of `kind` is requested
    #[must_use]
    pub fn has_namespace(&self, kind: NamespaceType) -> bool {
        self.namespace(kind).is_some()
    }

    /// Flags for every namespace that must be created
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        namespace::clone_flags(&self.namespaces)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for ns in &self.namespaces {
            if !seen.insert(ns.kind) {
                return Err(Error::validation(format!(
                    "duplicate {} namespace entry",
                    ns.kind
                )));
            }
        }

        for mapping in self.uid_mappings.iter().chain(&self.gid_mappings) {
            mapping.validate()?;
        }

        Ok(())
    }
}

/// One range of a UID or GID translation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapping {
    /// First ID inside the container
    #[serde(rename = "containerID")]
    pub container_id: u32,

    /// First ID on the host
    #[serde(rename = "hostID")]
    pub host_id: u32,

    /// Number of IDs in the range
    pub size: u32,
}

impl IdMapping {
    /// Create a mapping range
    ///
    /// # Errors
    /// Returns a validation error if `size` is zero
    pub fn new(host_id: u32, container_id: u32, size: u32) -> Result<Self> {
        let mapping = Self {
            container_id,
            host_id,
            size,
        };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Map the single host ID `host_id` to container ID 0
    #[must_use]
    pub const fn root(host_id: u32) -> Self {
        Self {
            container_id: 0,
            host_id,
            size: 1,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::validation(format!(
                "id mapping {} -> {} has zero size",
                self.host_id, self.container_id
            )));
        }
        Ok(())
    }
}

/// Resource-control limits
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resources {
    /// Device access rules, evaluated in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceRule>,

    /// Memory limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Memory>,

    /// CPU limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Cpu>,

    /// Process-count limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pids: Option<Pids>,
}

impl Resources {
    /// Whether no limit of any kind is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
            && self.memory.is_none()
            && self.cpu.is_none()
            && self.pids.is_none()
    }
}

/// A device access rule
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceRule {
    /// Allow (true) or deny (false) matching devices
    pub allow: bool,

    /// Device type: `a`, `c`, or `b`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Major number, all when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<i64>,

    /// Minor number, all when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<i64>,

    /// Access mask built from `r`, `w`, `m`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
}

/// Memory limits, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Memory {
    /// Memory usage limit, `-1` for unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    /// Memory plus swap limit, `-1` for unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap: Option<i64>,
}

/// CPU limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cpu {
    /// Relative weight (v1 shares scale, 2 to 262144)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<u64>,

    /// Microseconds of CPU time allowed per period, `-1` for unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<i64>,

    /// Period length in microseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u64>,
}

/// Process-count limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pids {
    /// Maximum number of tasks
    ///
    /// `0` leaves the current limit untouched; any negative value means
    /// unlimited.
    pub limit: i64,
}
