use keel_core::{CgroupMode, Error};
use keel_spec::*;

#[test]
fn test_rootless_strips_ownership_but_keeps_flags() {
    let mut spec = example(CgroupMode::Legacy);
    for mount in &mut spec.mounts {
        mount.options = vec![
            "uid=1000".to_string(),
            "gid=1000".to_string(),
            "nosuid".to_string(),
        ];
    }

    to_rootless(&mut spec, 1000, 1000);

    for mount in &spec.mounts {
        if mount.destination == "/sys" {
            assert_eq!(mount.options, ["rbind", "nosuid", "noexec", "nodev", "ro"]);
            continue;
        }
        assert!(mount.options.contains(&"nosuid".to_string()));
        assert!(!mount.options.iter().any(|o| o.starts_with("uid=")));
        assert!(!mount.options.iter().any(|o| o.starts_with("gid=")));
    }
}

#[test]
fn test_rootless_twice_keeps_one_user_namespace() {
    let mut spec = example(CgroupMode::Unified);
    to_rootless(&mut spec, 1000, 1000);
    to_rootless(&mut spec, 1000, 1000);

    let linux = spec.linux.as_ref().unwrap();
    let users = linux
        .namespaces
        .iter()
        .filter(|ns| ns.kind == NamespaceType::User)
        .count();
    assert_eq!(users, 1);
    assert!(!linux.has_namespace(NamespaceType::Network));
    assert!(spec.validate().is_ok());
}

#[test]
fn test_rootless_clone_flags() {
    use nix::sched::CloneFlags;

    let mut spec = example(CgroupMode::Legacy);
    to_rootless(&mut spec, 1000, 1000);

    let flags = spec.linux.unwrap().clone_flags();
    assert!(flags.contains(CloneFlags::CLONE_NEWUSER));
    assert!(!flags.contains(CloneFlags::CLONE_NEWNET));
}

#[test]
fn test_example_json_layout() {
    let value = serde_json::to_value(example(CgroupMode::Unified)).unwrap();

    assert_eq!(value["ociVersion"], "1.0.2");
    assert_eq!(value["root"]["readonly"], true);
    assert_eq!(value["process"]["noNewPrivileges"], true);
    assert_eq!(value["process"]["rlimits"][0]["type"], "RLIMIT_NOFILE");
    assert_eq!(value["linux"]["namespaces"][5]["type"], "cgroup");
    assert_eq!(value["linux"]["resources"]["devices"][0]["access"], "rwm");
    assert!(value["linux"]["maskedPaths"].is_array());
    assert!(value["linux"]["readonlyPaths"].is_array());
    assert!(value["linux"].get("uidMappings").is_none());
}

#[tokio::test]
async fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let mut spec = example(CgroupMode::Legacy);
    to_rootless(&mut spec, 1000, 100);
    spec.save(&path).await.unwrap();

    let loaded = Spec::load(&path).await.unwrap();
    assert_eq!(loaded, spec);
}

#[tokio::test]
async fn test_load_missing_file_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");

    let err = Spec::load(&path).await.unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(err.to_string().contains("missing.json"));
}

#[tokio::test]
async fn test_load_rejects_duplicate_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    tokio::fs::write(
        &path,
        r#"{"ociVersion":"1.0.2","linux":{"namespaces":[{"type":"user"},{"type":"user"}]}}"#,
    )
    .await
    .unwrap();

    let err = Spec::load(&path).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn test_load_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();

    assert!(matches!(
        Spec::load(&path).await.unwrap_err(),
        Error::Json(_)
    ));
}
