//! Process enumeration over a cgroup subtree
//!
//! The cgroup filesystem is kernel-maintained shared state with no
//! user-space lock. Sub-cgroups appear and vanish, and processes migrate,
//! while a walk is in progress, so [`collect_all`] returns a best-effort
//! snapshot: a PID moved into an already-visited node is missed, and a PID
//! moved from a visited node into a pending one is reported twice. A node
//! that vanishes mid-walk fails the whole collection. Callers treat the
//! result as a membership query, not an atomic listing.

use async_trait::async_trait;
use keel_core::{Error, ProcessId, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::PROCS_FILE;

/// An entry of a cgroup directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Full path
    pub path: PathBuf,
    /// Whether the entry is a directory (a child cgroup)
    pub is_dir: bool,
}

/// Read access to a cgroup hierarchy
#[async_trait]
pub trait CgroupFs: Send + Sync {
    /// Whether `path` is a directory; symlinks are not followed
    async fn is_dir(&self, path: &Path) -> Result<bool>;

    /// Entries directly inside `dir`
    async fn read_dir(&self, dir: &Path) -> Result<Vec<Entry>>;

    /// PIDs listed in the process-list file of `dir`
    async fn read_procs(&self, dir: &Path) -> Result<Vec<ProcessId>>;
}

/// Collect the PIDs of `root` and every cgroup below it
///
/// Nodes are visited depth-first, parents before children, siblings in
/// lexical order. Each node contributes its process-list file in file order.
/// A non-directory `root` yields no PIDs.
///
/// # Errors
/// Any read or traversal error aborts the walk; no partial result is returned.
pub async fn collect_all<F: CgroupFs + ?Sized>(fs: &F, root: &Path) -> Result<Vec<ProcessId>> {
    let mut pids = Vec::new();

    if !fs.is_dir(root).await? {
        debug!(root = %root.display(), "Not a cgroup directory, nothing to collect");
        return Ok(pids);
    }

    let mut pending = vec![root.to_path_buf()];
    let mut visited = 0usize;

    while let Some(dir) = pending.pop() {
        let found = fs.read_procs(&dir).await?;
        trace!(cgroup = %dir.display(), count = found.len(), "Read process list");
        pids.extend(found);
        visited += 1;

        let mut children: Vec<PathBuf> = fs
            .read_dir(&dir)
            .await?
            .into_iter()
            .filter(|entry| entry.is_dir)
            .map(|entry| entry.path)
            .collect();
        children.sort();
        pending.extend(children.into_iter().rev());
    }

    debug!(
        root = %root.display(),
        cgroups = visited,
        pids = pids.len(),
        "Collected cgroup processes"
    );
    Ok(pids)
}

/// Parse the contents of a process-list file
///
/// # Errors
/// Returns a validation error naming `file` for a malformed line
pub fn parse_procs(file: &Path, contents: &str) -> Result<Vec<ProcessId>> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<ProcessId>()
                .map_err(|e| Error::validation(format!("{}: {e}", file.display())))
        })
        .collect()
}

/// The host's cgroup filesystem, read through `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

#[async_trait]
impl CgroupFs for HostFs {
    async fn is_dir(&self, path: &Path) -> Result<bool> {
        let meta = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        Ok(meta.is_dir())
    }

    async fn read_dir(&self, dir: &Path) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| Error::io(dir, e))?;

        while let Some(entry) = reader.next_entry().await.map_err(|e| Error::io(dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| Error::io(&path, e))?;
            entries.push(Entry {
                path,
                is_dir: file_type.is_dir(),
            });
        }

        Ok(entries)
    }

    async fn read_procs(&self, dir: &Path) -> Result<Vec<ProcessId>> {
        let file = dir.join(PROCS_FILE);
        let contents = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| Error::io(&file, e))?;
        parse_procs(&file, &contents)
    }
}

/// In-memory cgroup tree for [`MockCgroupFs`]
#[derive(Debug, Clone, Default)]
pub struct MockTree {
    cgroups: BTreeMap<PathBuf, Vec<ProcessId>>,
    files: BTreeSet<PathBuf>,
}

impl MockTree {
    /// Create an empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cgroup with its attached PIDs
    #[must_use]
    pub fn with_cgroup(mut self, path: impl AsRef<Path>, pids: &[i32]) -> Self {
        self.add_cgroup(path, pids);
        self
    }

    /// Add a regular file (e.g. a controller file)
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.files.insert(path.as_ref().to_path_buf());
        self
    }

    /// Add or replace a cgroup
    pub fn add_cgroup(&mut self, path: impl AsRef<Path>, pids: &[i32]) {
        self.cgroups.insert(
            path.as_ref().to_path_buf(),
            pids.iter().copied().map(ProcessId::from_raw).collect(),
        );
    }

    /// Remove a cgroup and everything below it
    pub fn remove_cgroup(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.cgroups.retain(|p, _| !p.starts_with(path));
        self.files.retain(|p| !p.starts_with(path));
    }

    /// Move `pid` from one cgroup to another, as a migrating process would
    pub fn move_pid(&mut self, pid: i32, from: impl AsRef<Path>, to: impl AsRef<Path>) {
        let pid = ProcessId::from_raw(pid);
        if let Some(list) = self.cgroups.get_mut(from.as_ref()) {
            list.retain(|p| *p != pid);
        }
        if let Some(list) = self.cgroups.get_mut(to.as_ref()) {
            list.push(pid);
        }
    }
}

type Hook = Box<dyn FnOnce(&mut MockTree) + Send>;

/// Deterministic [`CgroupFs`] double
///
/// Hooks fire once, right after the process list of their cgroup is read,
/// which lets tests mutate the tree between two traversal steps.
#[derive(Default)]
pub struct MockCgroupFs {
    state: Mutex<MockFsState>,
}

#[derive(Default)]
struct MockFsState {
    tree: MockTree,
    hooks: HashMap<PathBuf, Vec<Hook>>,
    reads: Vec<PathBuf>,
}

impl MockCgroupFs {
    /// Serve `tree`
    #[must_use]
    pub fn new(tree: MockTree) -> Self {
        Self {
            state: Mutex::new(MockFsState {
                tree,
                ..MockFsState::default()
            }),
        }
    }

    /// Run `hook` once, after the process list of `cgroup` has been read
    #[must_use]
    pub fn with_hook(
        mut self,
        cgroup: impl AsRef<Path>,
        hook: impl FnOnce(&mut MockTree) + Send + 'static,
    ) -> Self {
        self.state
            .get_mut()
            .hooks
            .entry(cgroup.as_ref().to_path_buf())
            .or_default()
            .push(Box::new(hook));
        self
    }

    /// Cgroups whose process list was read, in order (for testing)
    pub async fn reads(&self) -> Vec<PathBuf> {
        self.state.lock().await.reads.clone()
    }
}

impl std::fmt::Debug for MockCgroupFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCgroupFs").finish_non_exhaustive()
    }
}

fn not_found(path: &Path) -> Error {
    Error::io(path, std::io::Error::from(std::io::ErrorKind::NotFound))
}

#[async_trait]
impl CgroupFs for MockCgroupFs {
    async fn is_dir(&self, path: &Path) -> Result<bool> {
        let state = self.state.lock().await;
        if state.tree.cgroups.contains_key(path) {
            Ok(true)
        } else if state.tree.files.contains(path) {
            Ok(false)
        } else {
            Err(not_found(path))
        }
    }

    async fn read_dir(&self, dir: &Path) -> Result<Vec<Entry>> {
        let state = self.state.lock().await;
        if !state.tree.cgroups.contains_key(dir) {
            return Err(not_found(dir));
        }

        let cgroups = state.tree.cgroups.keys().map(|p| (p, true));
        let files = state.tree.files.iter().map(|p| (p, false));

        Ok(cgroups
            .chain(files)
            .filter(|(p, _)| p.parent() == Some(dir))
            .map(|(p, is_dir)| Entry {
                path: p.clone(),
                is_dir,
            })
            .collect())
    }

    async fn read_procs(&self, dir: &Path) -> Result<Vec<ProcessId>> {
        let mut state = self.state.lock().await;
        let pids = state
            .tree
            .cgroups
            .get(dir)
            .cloned()
            .ok_or_else(|| not_found(&dir.join(PROCS_FILE)))?;

        state.reads.push(dir.to_path_buf());
        if let Some(hooks) = state.hooks.remove(dir) {
            for hook in hooks {
                hook(&mut state.tree);
            }
        }

        Ok(pids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pids: &[ProcessId]) -> Vec<i32> {
        pids.iter().map(|p| p.as_raw()).collect()
    }

    fn sample_tree() -> MockTree {
        MockTree::new()
            .with_cgroup("/cg", &[1, 2])
            .with_cgroup("/cg/a", &[3])
            .with_cgroup("/cg/b", &[])
            .with_file("/cg/cgroup.procs")
            .with_file("/cg/a/memory.max")
    }

    #[tokio::test]
    async fn test_collects_whole_subtree() {
        let fs = MockCgroupFs::new(sample_tree());
        let pids = collect_all(&fs, Path::new("/cg")).await.unwrap();

        assert_eq!(raw(&pids), [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_depth_first_order() {
        let tree = MockTree::new()
            .with_cgroup("/cg", &[])
            .with_cgroup("/cg/b", &[20])
            .with_cgroup("/cg/a", &[10])
            .with_cgroup("/cg/a/z", &[11])
            .with_cgroup("/cg/a/y", &[12]);
        let fs = MockCgroupFs::new(tree);

        let pids = collect_all(&fs, Path::new("/cg")).await.unwrap();
        assert_eq!(raw(&pids), [10, 12, 11, 20]);
        assert_eq!(
            fs.reads().await,
            ["/cg", "/cg/a", "/cg/a/y", "/cg/a/z", "/cg/b"].map(PathBuf::from)
        );
    }

    #[tokio::test]
    async fn test_file_root_yields_nothing() {
        let fs = MockCgroupFs::new(sample_tree());
        let pids = collect_all(&fs, Path::new("/cg/cgroup.procs")).await.unwrap();
        assert!(pids.is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_fails() {
        let fs = MockCgroupFs::new(sample_tree());
        let err = collect_all(&fs, Path::new("/nope")).await.unwrap_err();
        assert!(err.is_io_kind(std::io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_pid_moved_into_visited_node_is_missed() {
        let tree = MockTree::new()
            .with_cgroup("/cg", &[1])
            .with_cgroup("/cg/a", &[2])
            .with_cgroup("/cg/b", &[3]);
        let fs =
            MockCgroupFs::new(tree).with_hook("/cg/a", |tree| tree.move_pid(3, "/cg/b", "/cg"));

        let pids = collect_all(&fs, Path::new("/cg")).await.unwrap();
        assert_eq!(raw(&pids), [1, 2]);
    }

    #[tokio::test]
    async fn test_pid_moved_into_pending_node_is_seen_twice() {
        let tree = MockTree::new()
            .with_cgroup("/cg", &[1])
            .with_cgroup("/cg/a", &[2]);
        let fs =
            MockCgroupFs::new(tree).with_hook("/cg", |tree| tree.move_pid(1, "/cg", "/cg/a"));

        let pids = collect_all(&fs, Path::new("/cg")).await.unwrap();
        assert_eq!(raw(&pids), [1, 2, 1]);
    }

    #[tokio::test]
    async fn test_vanishing_cgroup_aborts_without_partial_result() {
        let tree = MockTree::new()
            .with_cgroup("/cg", &[1])
            .with_cgroup("/cg/a", &[2])
            .with_cgroup("/cg/b", &[3]);
        let fs = MockCgroupFs::new(tree).with_hook("/cg/a", |tree| tree.remove_cgroup("/cg/b"));

        let err = collect_all(&fs, Path::new("/cg")).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("/cg/b"));
    }

    #[test]
    fn test_parse_procs() {
        let file = Path::new("/cg/cgroup.procs");
        assert_eq!(raw(&parse_procs(file, "1\n22\n\n333\n").unwrap()), [1, 22, 333]);
        assert!(parse_procs(file, "").unwrap().is_empty());

        let err = parse_procs(file, "1\nxyz\n").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(err.to_string().contains("/cg/cgroup.procs"));
    }

    #[tokio::test]
    async fn test_host_fs_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        tokio::fs::create_dir_all(root.join("a")).await.unwrap();
        tokio::fs::create_dir_all(root.join("b")).await.unwrap();
        tokio::fs::write(root.join(PROCS_FILE), "1\n2\n").await.unwrap();
        tokio::fs::write(root.join("a").join(PROCS_FILE), "3\n").await.unwrap();
        tokio::fs::write(root.join("b").join(PROCS_FILE), "").await.unwrap();

        let mut pids = raw(&collect_all(&HostFs, root).await.unwrap());
        pids.sort_unstable();
        assert_eq!(pids, [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_host_fs_missing_procs_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("a")).await.unwrap();
        tokio::fs::write(dir.path().join(PROCS_FILE), "1\n").await.unwrap();

        let err = collect_all(&HostFs, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains(PROCS_FILE));
    }
}
