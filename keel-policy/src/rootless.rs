//! Whether the rootless cgroup manager must be used

use keel_core::{Error, HostContext, Result, ServiceManager};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Tri-state `--rootless` setting
///
/// Serialized with the same spelling the command line accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RootlessOverride {
    /// Decide from the host
    #[default]
    Auto,
    /// Always use the rootless path
    Enabled,
    /// Never use the rootless path
    Disabled,
}

impl RootlessOverride {
    /// The forced value, `None` for auto
    #[must_use]
    pub const fn forced(self) -> Option<bool> {
        match self {
            Self::Auto => None,
            Self::Enabled => Some(true),
            Self::Disabled => Some(false),
        }
    }
}

impl From<bool> for RootlessOverride {
    fn from(value: bool) -> Self {
        if value { Self::Enabled } else { Self::Disabled }
    }
}

impl FromStr for RootlessOverride {
    type Err = Error;

    /// Empty or `auto` (any case) is auto; otherwise the usual boolean
    /// spellings `1 t T TRUE true True 0 f F FALSE false False`.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        match s {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(Self::Enabled),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(Self::Disabled),
            other => Err(Error::validation(format!(
                "invalid rootless value {other:?}: expected true, false or auto"
            ))),
        }
    }
}

impl TryFrom<String> for RootlessOverride {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RootlessOverride> for String {
    fn from(value: RootlessOverride) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RootlessOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Enabled => "true",
            Self::Disabled => "false",
        })
    }
}

/// Decide whether the rootless cgroup manager applies
///
/// An explicit override always wins. Under auto:
/// - non-zero euid: rootless
/// - euid 0 in the initial user namespace: real root, not rootless
/// - euid 0 in a user namespace with the systemd driver: rootless unless the
///   session bus is owned by UID 0; an owner lookup that fails counts as UID 0
/// - euid 0 in a user namespace with the cgroupfs driver: rootless, as access
///   to the cgroup tree cannot be confirmed
///
/// Parsing the raw flag is where this decision can fail; see
/// [`RootlessOverride::from_str`].
pub async fn should_use_rootless_manager(
    explicit: RootlessOverride,
    host: &HostContext,
    systemd_requested: bool,
    service_manager: &dyn ServiceManager,
) -> bool {
    if let Some(forced) = explicit.forced() {
        debug!(rootless = forced, "Rootless mode set explicitly");
        return forced;
    }
    if host.euid != 0 {
        return true;
    }
    if !host.in_user_namespace {
        return false;
    }
    if !systemd_requested {
        return true;
    }

    let owner = match service_manager.owner_uid().await {
        Ok(uid) => uid,
        Err(e) => {
            warn!(
                error = %e,
                manager = service_manager.name(),
                "Failed to get the session owner UID, assuming 0"
            );
            0
        }
    };
    debug!(owner, "Session owner inside user namespace");
    owner != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::MockServiceManager;

    fn in_userns() -> HostContext {
        HostContext::root().with_user_namespace(true)
    }

    #[test]
    fn test_parse_bool_spellings() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(s.parse::<RootlessOverride>().unwrap(), RootlessOverride::Enabled);
        }
        for s in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(s.parse::<RootlessOverride>().unwrap(), RootlessOverride::Disabled);
        }
        for s in ["", "auto", "AUTO", "Auto"] {
            assert_eq!(s.parse::<RootlessOverride>().unwrap(), RootlessOverride::Auto);
        }
    }

    #[test]
    fn test_parse_rejects_other_values() {
        for s in ["yes", "tRUE", "2", " true"] {
            let err = s.parse::<RootlessOverride>().unwrap_err();
            assert!(matches!(err, Error::Validation { .. }), "{s}");
        }
    }

    #[tokio::test]
    async fn test_explicit_override_wins() {
        let sm = MockServiceManager::absent();
        let root = HostContext::root();
        let user = HostContext::root().with_ids(1000, 1000);

        assert!(should_use_rootless_manager(RootlessOverride::Enabled, &root, false, &sm).await);
        assert!(!should_use_rootless_manager(RootlessOverride::Disabled, &user, false, &sm).await);
    }

    #[tokio::test]
    async fn test_auto_truth_table() {
        let auto = RootlessOverride::Auto;
        let user = HostContext::root().with_ids(1000, 1000);
        let absent = MockServiceManager::absent();

        assert!(should_use_rootless_manager(auto, &user, false, &absent).await);
        assert!(!should_use_rootless_manager(auto, &HostContext::root(), true, &absent).await);

        let root_owned = MockServiceManager::running_with_owner(0);
        assert!(!should_use_rootless_manager(auto, &in_userns(), true, &root_owned).await);

        let user_owned = MockServiceManager::running_with_owner(1000);
        assert!(should_use_rootless_manager(auto, &in_userns(), true, &user_owned).await);

        let failing = MockServiceManager::running_without_owner();
        assert!(!should_use_rootless_manager(auto, &in_userns(), true, &failing).await);

        assert!(should_use_rootless_manager(auto, &in_userns(), false, &root_owned).await);
    }

    #[test]
    fn test_display_roundtrip() {
        let all = [
            RootlessOverride::Auto,
            RootlessOverride::Enabled,
            RootlessOverride::Disabled,
        ];
        for value in all {
            assert_eq!(value.to_string().parse::<RootlessOverride>().unwrap(), value);
        }
        assert_eq!(RootlessOverride::from(true), RootlessOverride::Enabled);
    }
}
