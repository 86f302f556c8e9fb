//! Namespace kinds requested by a spec

use nix::sched::CloneFlags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of Linux namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceType {
    /// Process-ID namespace
    Pid,
    /// Network namespace
    Network,
    /// Mount namespace
    Mount,
    /// Inter-process-communication namespace
    Ipc,
    /// UTS (hostname) namespace
    Uts,
    /// User namespace (UID/GID mapping)
    User,
    /// Cgroup-hierarchy namespace
    Cgroup,
}

impl NamespaceType {
    /// Every kind, in the order the kernel documents them
    pub const ALL: [Self; 7] = [
        Self::Pid,
        Self::Network,
        Self::Mount,
        Self::Ipc,
        Self::Uts,
        Self::User,
        Self::Cgroup,
    ];

    /// The `unshare(2)`/`clone(2)` flag creating this namespace
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Pid => CloneFlags::CLONE_NEWPID,
            Self::Network => CloneFlags::CLONE_NEWNET,
            Self::Mount => CloneFlags::CLONE_NEWNS,
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
            Self::User => CloneFlags::CLONE_NEWUSER,
            Self::Cgroup => CloneFlags::CLONE_NEWCGROUP,
        }
    }

    /// Name of the namespace link under `/proc/<pid>/ns`
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Pid => "pid",
            Self::Network => "net",
            Self::Mount => "mnt",
            Self::Ipc => "ipc",
            Self::Uts => "uts",
            Self::User => "user",
            Self::Cgroup => "cgroup",
        }
    }
}

impl fmt::Display for NamespaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}

/// A namespace entry: create a new namespace of `kind`, or join `path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace kind
    #[serde(rename = "type")]
    pub kind: NamespaceType,

    /// Existing namespace to join instead of creating one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Namespace {
    /// Request a fresh namespace of `kind`
    #[must_use]
    pub const fn new(kind: NamespaceType) -> Self {
        Self { kind, path: None }
    }
}

impl From<NamespaceType> for Namespace {
    fn from(kind: NamespaceType) -> Self {
        Self::new(kind)
    }
}

/// Combine the flags for every namespace that must be freshly created
///
/// Entries carrying a `path` are joined with `setns(2)` instead and
/// contribute nothing.
#[must_use]
pub fn clone_flags<'a>(namespaces: impl IntoIterator<Item = &'a Namespace>) -> CloneFlags {
    namespaces
        .into_iter()
        .filter(|ns| ns.path.is_none())
        .fold(CloneFlags::empty(), |flags, ns| flags | ns.kind.clone_flag())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Namespace::new(NamespaceType::Network)).unwrap();
        assert_eq!(json, r#"{"type":"network"}"#);

        let ns: Namespace =
            serde_json::from_str(r#"{"type":"cgroup","path":"/proc/1/ns/cgroup"}"#).unwrap();
        assert_eq!(ns.kind, NamespaceType::Cgroup);
        assert_eq!(ns.path.as_deref(), Some("/proc/1/ns/cgroup"));
    }

    #[test]
    fn test_clone_flags_conversion() {
        let namespaces = [
            Namespace::new(NamespaceType::Pid),
            Namespace::new(NamespaceType::Network),
        ];

        let flags = clone_flags(&namespaces);
        assert!(flags.contains(CloneFlags::CLONE_NEWPID));
        assert!(flags.contains(CloneFlags::CLONE_NEWNET));
        assert!(!flags.contains(CloneFlags::CLONE_NEWNS));
    }

    #[test]
    fn test_joined_namespace_has_no_flag() {
        let namespaces = [
            Namespace::new(NamespaceType::Mount),
            Namespace {
                kind: NamespaceType::Network,
                path: Some("/var/run/netns/blue".to_string()),
            },
        ];

        assert_eq!(clone_flags(&namespaces), CloneFlags::CLONE_NEWNS);
    }

    #[test]
    fn test_proc_names() {
        let names: Vec<&str> = NamespaceType::ALL.iter().map(|ns| ns.proc_name()).collect();
        assert_eq!(names, ["pid", "net", "mnt", "ipc", "uts", "user", "cgroup"]);
    }
}
