//! In-memory backends for testing (no cgroup filesystem required)

use async_trait::async_trait;
use keel_core::{ProcessId, Result};
use keel_spec::Resources;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::CgroupConfig;
use crate::factory::BackendProvider;
use crate::manager::{CgroupManager, ManagerKind};
use crate::paths::PathSet;

/// Provider handing out [`MockManager`]s for every kind
///
/// # Example
/// ```
/// use keel_cgroup::{CgroupConfig, ManagerFactory, ManagerKind, MockProvider, PathSet};
/// use keel_core::CgroupMode;
///
/// let factory = ManagerFactory::new(MockProvider::new(), CgroupMode::Unified, false);
/// let manager = factory
///     .create(Some(&CgroupConfig::new()), &PathSet::unified("/sys/fs/cgroup/demo"))
///     .unwrap();
///
/// assert_eq!(manager.kind(), ManagerKind::UnifiedFilesystem);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockProvider;

impl MockProvider {
    /// Create a new mock provider
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BackendProvider for MockProvider {
    fn legacy_filesystem(
        &self,
        config: &CgroupConfig,
        paths: PathSet,
    ) -> Result<Box<dyn CgroupManager>> {
        Ok(Box::new(MockManager::new(ManagerKind::LegacyFilesystem, config, paths)))
    }

    fn legacy_service_manager(
        &self,
        config: &CgroupConfig,
        paths: PathSet,
    ) -> Result<Box<dyn CgroupManager>> {
        Ok(Box::new(MockManager::new(
            ManagerKind::LegacyServiceManager,
            config,
            paths,
        )))
    }

    fn unified_filesystem(
        &self,
        config: &CgroupConfig,
        path: String,
    ) -> Result<Box<dyn CgroupManager>> {
        Ok(Box::new(MockManager::new(
            ManagerKind::UnifiedFilesystem,
            config,
            PathSet::unified(path),
        )))
    }

    fn unified_service_manager(
        &self,
        config: &CgroupConfig,
        path: String,
    ) -> Result<Box<dyn CgroupManager>> {
        Ok(Box::new(MockManager::new(
            ManagerKind::UnifiedServiceManager,
            config,
            PathSet::unified(path),
        )))
    }
}

/// Manager recording every call instead of touching the filesystem
#[derive(Clone)]
pub struct MockManager {
    kind: ManagerKind,
    paths: PathSet,
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    config: CgroupConfig,
    processes: Vec<ProcessId>,
    resources: Option<Resources>,
    destroyed: bool,
    call_count: usize,
}

impl MockManager {
    /// Create a mock manager of `kind`
    #[must_use]
    pub fn new(kind: ManagerKind, config: &CgroupConfig, paths: PathSet) -> Self {
        Self {
            kind,
            paths,
            state: Arc::new(Mutex::new(MockState {
                config: config.clone(),
                ..MockState::default()
            })),
        }
    }

    /// Get the number of manager calls made (for testing)
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.call_count
    }

    /// Check if a process has been applied
    pub async fn has_process(&self, pid: ProcessId) -> bool {
        self.state.lock().await.processes.contains(&pid)
    }

    /// Last resources written (for testing)
    pub async fn resources(&self) -> Option<Resources> {
        self.state.lock().await.resources.clone()
    }

    /// Configuration the manager was built from
    pub async fn config(&self) -> CgroupConfig {
        self.state.lock().await.config.clone()
    }

    /// Whether destroy has been called
    pub async fn is_destroyed(&self) -> bool {
        self.state.lock().await.destroyed
    }
}

impl std::fmt::Debug for MockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockManager")
            .field("kind", &self.kind)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CgroupManager for MockManager {
    fn kind(&self) -> ManagerKind {
        self.kind
    }

    async fn apply(&self, pid: ProcessId) -> Result<()> {
        let mut state = self.state.lock().await;

        if !state.processes.contains(&pid) {
            state.processes.push(pid);
        }
        state.call_count += 1;

        tracing::debug!(
            pid = pid.as_raw(),
            total_processes = state.processes.len(),
            "Mock: Applied process"
        );

        Ok(())
    }

    async fn set(&self, resources: &Resources) -> Result<()> {
        let mut state = self.state.lock().await;
        state.resources = Some(resources.clone());
        state.call_count += 1;

        tracing::debug!(empty = resources.is_empty(), "Mock: Set resources");

        Ok(())
    }

    fn paths(&self) -> PathSet {
        self.paths.clone()
    }

    async fn pids(&self) -> Result<Vec<ProcessId>> {
        let mut state = self.state.lock().await;
        state.call_count += 1;
        Ok(state.processes.clone())
    }

    async fn all_pids(&self) -> Result<Vec<ProcessId>> {
        self.pids().await
    }

    async fn destroy(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.call_count += 1;

        let process_count = state.processes.len();
        state.processes.clear();
        state.resources = None;
        state.destroyed = true;

        tracing::debug!(processes_removed = process_count, "Mock: Destroyed");

        Ok(())
    }
}
