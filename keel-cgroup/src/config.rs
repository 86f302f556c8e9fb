//! Cgroup configuration handed to the manager factory

use keel_core::ContainerId;
use keel_core::path::clean;
use keel_spec::Resources;
use serde::{Deserialize, Serialize};

/// What the caller wants from the cgroup layer
///
/// Owned by the caller and only ever borrowed by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CgroupConfig {
    /// Leaf cgroup name, usually the container ID
    pub name: Option<ContainerId>,

    /// Parent cgroup (or slice, for service-manager backends)
    pub parent: Option<String>,

    /// Delegate cgroup lifecycle to the service manager
    pub systemd: bool,

    /// Caller lacks write access to most controller files
    pub rootless: bool,

    /// Limits to apply
    pub resources: Resources,
}

impl CgroupConfig {
    /// Create an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the leaf cgroup name
    #[must_use]
    pub fn with_name(mut self, name: ContainerId) -> Self {
        self.name = Some(name);
        self
    }

    /// Set the parent cgroup
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Request the service-manager-mediated driver
    #[must_use]
    pub const fn with_systemd(mut self, systemd: bool) -> Self {
        self.systemd = systemd;
        self
    }

    /// Mark the caller as unprivileged
    #[must_use]
    pub const fn with_rootless(mut self, rootless: bool) -> Self {
        self.rootless = rootless;
        self
    }

    /// Set resource limits
    #[must_use]
    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    /// Cgroup path below a hierarchy root, e.g. `keel/web-1`
    ///
    /// `None` when no name is configured. The parent is cleaned as if rooted
    /// at `/`, so `..` segments can never climb above the hierarchy root.
    #[must_use]
    pub fn relative_path(&self) -> Option<String> {
        let name = self.name.as_ref()?;
        let parent = self.parent.as_deref().unwrap_or_default();
        let rooted = clean(&format!("/{parent}/{name}"));

        Some(rooted.trim_start_matches('/').to_string())
    }
}
