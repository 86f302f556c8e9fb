//! Baseline spec for a minimal interactive shell container

use keel_core::CgroupMode;
use tracing::debug;

use crate::namespace::{Namespace, NamespaceType};
use crate::spec::{
    Capabilities, DeviceRule, Linux, Mount, Process, Resources, Rlimit, Root, SPEC_VERSION, Spec,
    User,
};

const DEFAULT_CAPABILITIES: [&str; 3] = ["CAP_AUDIT_WRITE", "CAP_KILL", "CAP_NET_BIND_SERVICE"];

const MASKED_PATHS: [&str; 10] = [
    "/proc/acpi",
    "/proc/asound",
    "/proc/kcore",
    "/proc/keys",
    "/proc/latency_stats",
    "/proc/timer_list",
    "/proc/timer_stats",
    "/proc/sched_debug",
    "/sys/firmware",
    "/proc/scsi",
];

const READONLY_PATHS: [&str; 5] = [
    "/proc/bus",
    "/proc/fs",
    "/proc/irq",
    "/proc/sys",
    "/proc/sysrq-trigger",
];

/// Build a complete, internally consistent spec running `sh` on a terminal
///
/// The cgroup namespace is only requested when `mode` is the unified
/// hierarchy.
#[must_use]
pub fn example(mode: CgroupMode) -> Spec {
    let mut namespaces: Vec<Namespace> = [
        NamespaceType::Pid,
        NamespaceType::Network,
        NamespaceType::Ipc,
        NamespaceType::Uts,
        NamespaceType::Mount,
    ]
    .into_iter()
    .map(Namespace::new)
    .collect();

    if mode.is_unified() {
        namespaces.push(Namespace::new(NamespaceType::Cgroup));
    }

    debug!(%mode, namespaces = namespaces.len(), "Building example spec");

    Spec {
        oci_version: SPEC_VERSION.to_string(),
        root: Some(Root {
            path: "rootfs".to_string(),
            readonly: true,
        }),
        process: Some(Process {
            terminal: true,
            user: User::default(),
            args: vec!["sh".to_string()],
            env: vec![
                "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string(),
                "TERM=xterm".to_string(),
            ],
            cwd: "/".to_string(),
            no_new_privileges: true,
            capabilities: Some(Capabilities::mirrored(&DEFAULT_CAPABILITIES)),
            rlimits: vec![Rlimit {
                kind: "RLIMIT_NOFILE".to_string(),
                hard: 1024,
                soft: 1024,
            }],
        }),
        hostname: Some("keel".to_string()),
        mounts: default_mounts(),
        linux: Some(Linux {
            masked_paths: MASKED_PATHS.iter().map(ToString::to_string).collect(),
            readonly_paths: READONLY_PATHS.iter().map(ToString::to_string).collect(),
            resources: Some(Resources {
                devices: vec![DeviceRule {
                    allow: false,
                    access: Some("rwm".to_string()),
                    ..DeviceRule::default()
                }],
                ..Resources::default()
            }),
            namespaces,
            ..Linux::default()
        }),
    }
}

fn default_mounts() -> Vec<Mount> {
    vec![
        Mount::new("/proc", "proc", "proc", &[]),
        Mount::new(
            "/dev",
            "tmpfs",
            "tmpfs",
            &["nosuid", "strictatime", "mode=755", "size=65536k"],
        ),
        Mount::new(
            "/dev/pts",
            "devpts",
            "devpts",
            &[
                "nosuid",
                "noexec",
                "newinstance",
                "ptmxmode=0666",
                "mode=0620",
                "gid=5",
            ],
        ),
        Mount::new(
            "/dev/shm",
            "tmpfs",
            "shm",
            &["nosuid", "noexec", "nodev", "mode=1777", "size=65536k"],
        ),
        Mount::new(
            "/dev/mqueue",
            "mqueue",
            "mqueue",
            &["nosuid", "noexec", "nodev"],
        ),
        Mount::new("/sys", "sysfs", "sysfs", &["nosuid", "noexec", "nodev", "ro"]),
        Mount::new(
            "/sys/fs/cgroup",
            "cgroup",
            "cgroup",
            &["nosuid", "noexec", "nodev", "relatime", "ro"],
        ),
    ]
}
