use keel_core::{HostContext, MockServiceManager};
use keel_policy::*;
use std::path::{Path, PathBuf};

struct Case {
    flag: &'static str,
    euid: u32,
    userns: bool,
    systemd: bool,
    service_manager: MockServiceManager,
    expected: bool,
}

#[tokio::test]
async fn test_rootless_decision_from_raw_flag() {
    let cases = [
        Case {
            flag: "true",
            euid: 0,
            userns: false,
            systemd: false,
            service_manager: MockServiceManager::absent(),
            expected: true,
        },
        Case {
            flag: "false",
            euid: 1000,
            userns: true,
            systemd: false,
            service_manager: MockServiceManager::absent(),
            expected: false,
        },
        Case {
            flag: "auto",
            euid: 1000,
            userns: false,
            systemd: false,
            service_manager: MockServiceManager::absent(),
            expected: true,
        },
        Case {
            flag: "",
            euid: 0,
            userns: false,
            systemd: false,
            service_manager: MockServiceManager::absent(),
            expected: false,
        },
        Case {
            flag: "auto",
            euid: 0,
            userns: true,
            systemd: true,
            service_manager: MockServiceManager::running_with_owner(0),
            expected: false,
        },
        Case {
            flag: "auto",
            euid: 0,
            userns: true,
            systemd: true,
            service_manager: MockServiceManager::running_without_owner(),
            expected: false,
        },
        Case {
            flag: "auto",
            euid: 0,
            userns: true,
            systemd: true,
            service_manager: MockServiceManager::running_with_owner(1000),
            expected: true,
        },
        Case {
            flag: "AUTO",
            euid: 0,
            userns: true,
            systemd: false,
            service_manager: MockServiceManager::absent(),
            expected: true,
        },
    ];

    for case in cases {
        let explicit: RootlessOverride = case.flag.parse().unwrap();
        let host = HostContext::root()
            .with_ids(case.euid, case.euid)
            .with_user_namespace(case.userns);

        let decided =
            should_use_rootless_manager(explicit, &host, case.systemd, &case.service_manager).await;
        assert_eq!(
            decided, case.expected,
            "flag={:?} euid={} userns={}",
            case.flag, case.euid, case.userns
        );
    }
}

#[test]
fn test_invalid_flag_is_an_error() {
    assert!("maybe".parse::<RootlessOverride>().is_err());
}

#[test]
fn test_namespaced_root_uses_xdg_unless_user_is_root() {
    let xdg = Path::new("/run/user/0");
    let host = HostContext::root()
        .with_user_namespace(true)
        .with_xdg_runtime_dir(Some(xdg));

    assert_eq!(
        runtime_root(&host, None, Path::new("/")).unwrap(),
        PathBuf::from(DEFAULT_RUNTIME_ROOT)
    );

    let host = host.with_user(Some("builder"));
    assert_eq!(runtime_root(&host, None, Path::new("/")).unwrap(), xdg.join("keel"));

    let host = host.with_user(None);
    assert_eq!(runtime_root(&host, None, Path::new("/")).unwrap(), xdg.join("keel"));
}

#[test]
fn test_rootless_override_json_uses_flag_spelling() {
    for flag in ["auto", "true", "false"] {
        let value: RootlessOverride = flag.parse().unwrap();
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, format!("\"{flag}\""));
        assert_eq!(serde_json::from_str::<RootlessOverride>(&json).unwrap(), value);
    }

    let value: RootlessOverride = serde_json::from_str("\"T\"").unwrap();
    assert_eq!(value, RootlessOverride::Enabled);
    assert!(serde_json::from_str::<RootlessOverride>("\"enabled\"").is_err());
}
