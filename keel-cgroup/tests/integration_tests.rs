use keel_cgroup::*;
use keel_core::{CgroupMode, ContainerId, Error, MockServiceManager, ProcessId};
use keel_spec::{Pids, Resources};
use std::path::Path;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("keel_cgroup=debug")
        .with_test_writer()
        .try_init();
}

fn config(name: &str) -> CgroupConfig {
    CgroupConfig::new()
        .with_name(ContainerId::new(name).unwrap())
        .with_parent("keel")
}

#[tokio::test]
async fn test_unified_lifecycle_on_tempdir() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let provider = FsProvider::with_root(root.path());
    let factory = ManagerFactory::new(provider, CgroupMode::Unified, false);

    let manager = factory.create(Some(&config("web")), &PathSet::new()).unwrap();
    assert_eq!(manager.kind(), ManagerKind::UnifiedFilesystem);

    let cgroup = root.path().join("keel/web");
    assert_eq!(manager.paths(), PathSet::unified(cgroup.display().to_string()));

    let pid = ProcessId::from_raw(1000);
    manager.apply(pid).await.unwrap();
    manager
        .set(&Resources {
            pids: Some(Pids { limit: 32 }),
            ..Resources::default()
        })
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(cgroup.join("pids.max")).unwrap(), "32");
    assert_eq!(manager.pids().await.unwrap(), [pid]);
}

#[tokio::test]
async fn test_all_pids_walks_real_directories() {
    let root = tempfile::tempdir().unwrap();
    let cgroup = root.path().join("keel/web");
    for (dir, pids) in [("", "1\n"), ("a", "3\n4\n"), ("a/deep", "5\n"), ("b", "")] {
        let dir = cgroup.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(PROCS_FILE), pids).unwrap();
    }

    let provider = FsProvider::with_root(root.path());
    let factory = ManagerFactory::new(provider, CgroupMode::Unified, false);
    let manager = factory.create(Some(&config("web")), &PathSet::new()).unwrap();

    let pids: Vec<i32> = manager
        .all_pids()
        .await
        .unwrap()
        .into_iter()
        .map(ProcessId::as_raw)
        .collect();
    assert_eq!(pids, [1, 3, 4, 5]);
}

#[tokio::test]
async fn test_legacy_lifecycle_on_tempdir() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let provider = FsProvider::with_root(root.path());
    let factory = ManagerFactory::new(provider, CgroupMode::Legacy, false);

    let manager = factory.create(Some(&config("db")), &PathSet::new()).unwrap();
    assert_eq!(manager.kind(), ManagerKind::LegacyFilesystem);
    assert!(manager.paths().get("memory").is_some());

    let pid = ProcessId::from_raw(2000);
    manager.apply(pid).await.unwrap();
    assert_eq!(manager.all_pids().await.unwrap(), [pid]);
}

#[tokio::test]
async fn test_detect_with_mock_service_manager() {
    let absent = MockServiceManager::absent();
    let factory = ManagerFactory::detect(MockProvider::new(), &absent).unwrap();

    let err = factory
        .create(Some(&CgroupConfig::new().with_systemd(true)), &PathSet::new())
        .unwrap_err();
    assert!(matches!(err, Error::Environment { .. }));

    let running = MockServiceManager::running_with_owner(1000);
    let factory = ManagerFactory::detect(MockProvider::new(), &running).unwrap();
    let kind = factory
        .select(Some(&CgroupConfig::new().with_systemd(true)))
        .unwrap();
    assert!(kind.uses_service_manager());
    assert_eq!(kind.mode(), factory.mode());
}

#[tokio::test]
async fn test_collect_all_tolerates_concurrent_migration() {
    let tree = MockTree::new()
        .with_cgroup("/cg", &[10])
        .with_cgroup("/cg/a", &[20])
        .with_cgroup("/cg/b", &[30]);

    // PID 30 moves from b into a right after a was read: it is missed.
    let fs = MockCgroupFs::new(tree).with_hook("/cg/a", |tree| {
        tree.move_pid(30, "/cg/b", "/cg/a");
    });

    let pids: Vec<i32> = collect_all(&fs, Path::new("/cg"))
        .await
        .unwrap()
        .into_iter()
        .map(ProcessId::as_raw)
        .collect();
    assert_eq!(pids, [10, 20]);
}

#[test]
fn test_config_json_roundtrip() {
    let config = config("web").with_rootless(true);
    let json = serde_json::to_string(&config).unwrap();
    let back: CgroupConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);

    let paths: PathSet = serde_json::from_str(r#"{"": "/sys/fs/cgroup/x"}"#).unwrap();
    assert_eq!(resolve_unified_path(&paths).unwrap(), "/sys/fs/cgroup/x");
}

#[tokio::test]
async fn test_parent_cannot_escape_cgroup_root() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("cgroup");
    let factory = ManagerFactory::new(FsProvider::with_root(&root), CgroupMode::Unified, false);
    let config = CgroupConfig::new()
        .with_name(ContainerId::new("web").unwrap())
        .with_parent("../outside");

    let manager = factory.create(Some(&config), &PathSet::new()).unwrap();
    manager.apply(ProcessId::from_raw(7)).await.unwrap();

    assert!(root.join("outside/web").join(PROCS_FILE).exists());
    assert!(!tmp.path().join("outside").exists());

    // The reported paths feed straight back into the factory.
    let again = factory.create(Some(&config), &manager.paths()).unwrap();
    assert_eq!(again.paths(), manager.paths());
}
