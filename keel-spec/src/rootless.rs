//! Adapt a privileged spec for an unprivileged caller

use tracing::debug;

use crate::namespace::{Namespace, NamespaceType};
use crate::spec::{IdMapping, Mount, Spec};

/// Options of the bind mount replacing sysfs
const SYS_BIND_OPTIONS: [&str; 5] = ["rbind", "nosuid", "noexec", "nodev", "ro"];

/// Rewrite `spec` in place so it can be started by the host user `uid`/`gid`
///
/// - the network namespace and any user namespace are dropped, then exactly
///   one fresh user namespace is appended
/// - UID and GID tables become a single entry mapping `uid`/`gid` to 0
/// - the `/sys` mount becomes a read-only recursive bind of the host's `/sys`
///   (sysfs cannot be mounted without privilege)
/// - `uid=`/`gid=` options are stripped from every other mount
/// - all resource-control limits are cleared
///
/// The transform is total and idempotent in shape. Clone the spec first if
/// the privileged form is still needed.
pub fn to_rootless(spec: &mut Spec, uid: u32, gid: u32) {
    let linux = spec.linux.get_or_insert_with(Default::default);

    linux
        .namespaces
        .retain(|ns| !matches!(ns.kind, NamespaceType::Network | NamespaceType::User));
    linux.namespaces.push(Namespace::new(NamespaceType::User));

    linux.uid_mappings = vec![IdMapping::root(uid)];
    linux.gid_mappings = vec![IdMapping::root(gid)];

    linux.resources = None;

    for mount in &mut spec.mounts {
        if mount.targets("/sys") {
            *mount = Mount::new("/sys", "none", "/sys", &SYS_BIND_OPTIONS);
        } else {
            mount.remove_keyed_options(&["uid", "gid"]);
        }
    }

    debug!(uid, gid, mounts = spec.mounts.len(), "Converted spec to rootless");
}
