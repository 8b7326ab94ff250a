/// Scanner module: owns one scan session.
///
/// A [`Scanner`] holds the tree, the job queue, the exclude rules and the
/// optional remote listing service. Nothing here spawns threads: the caller
/// drives the scan by calling [`Scanner::tick`] from its own loop (or
/// [`Scanner::run_to_completion`] when it has nothing else to do).
///
/// Scan locations are plain paths, `file://` URLs (local), or any other
/// `scheme://` URL (remote, via the installed [`DirectoryService`]).
pub mod local;
pub mod queue;
pub mod remote;

pub use local::LocalDirReadJob;
pub use queue::{JobContext, JobQueue, JobStatus, ReadJob, TickStatus};
pub use remote::{DirectoryService, ListingEvent, RemoteDirReadJob, RemoteEntry};

use crate::cache::{self, CacheReadJob, CacheReader};
use crate::error::{CoreError, Result};
use crate::exclude::{ExcludeRuleConfig, ExcludeRules};
use crate::model::{DirTree, EntryStat, FileNode, NodeIndex};
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Scan options, usually the `[scan]` table of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Descend into directories on other filesystems.
    pub cross_filesystems: bool,
    pub exclude: Vec<ExcludeRuleConfig>,
}

/// Where the current tree came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMethod {
    Local,
    Remote,
    Cache,
}

/// A scan session.
pub struct Scanner {
    tree: DirTree,
    queue: JobQueue,
    rules: ExcludeRules,
    settings: ScanSettings,
    service: Option<Box<dyn DirectoryService>>,
    read_method: Option<ReadMethod>,
    started: Option<Instant>,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("tree", &self.tree)
            .field("queue", &self.queue)
            .field("settings", &self.settings)
            .field("read_method", &self.read_method)
            .finish()
    }
}

/// Pause between ticks while every queued job is waiting on a listing.
const WAIT_INTERVAL: Duration = Duration::from_millis(2);

/// Local path for a location, or `None` for a remote URL.
fn local_path(location: &str) -> Option<&str> {
    if let Some(path) = location.strip_prefix("file://") {
        Some(path)
    } else if location.contains("://") {
        None
    } else {
        Some(location)
    }
}

/// Strip trailing slashes, keeping a lone `/` and the slash after a scheme.
fn normalize(location: &str) -> &str {
    let trimmed = location.trim_end_matches('/');
    if trimmed.len() == location.len() {
        location
    } else if trimmed.is_empty() || trimmed.ends_with(':') {
        &location[..trimmed.len() + 1]
    } else {
        trimmed
    }
}

impl Scanner {
    /// Create a scanner, compiling the configured exclude rules.
    pub fn new(settings: ScanSettings) -> Result<Self> {
        let rules = ExcludeRules::from_config(&settings.exclude)?;
        Ok(Self {
            tree: DirTree::new(),
            queue: JobQueue::new(),
            rules,
            settings,
            service: None,
            read_method: None,
            started: None,
        })
    }

    pub fn tree(&self) -> &DirTree {
        &self.tree
    }

    /// Mutable tree access, e.g. to subscribe observers or change the
    /// selection.
    pub fn tree_mut(&mut self) -> &mut DirTree {
        &mut self.tree
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn rules(&self) -> &ExcludeRules {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut ExcludeRules {
        &mut self.rules
    }

    pub fn set_cross_filesystems(&mut self, cross: bool) {
        self.settings.cross_filesystems = cross;
    }

    pub fn set_directory_service(&mut self, service: Box<dyn DirectoryService>) {
        self.service = Some(service);
    }

    pub fn read_method(&self) -> Option<ReadMethod> {
        self.read_method
    }

    /// `true` while jobs are queued.
    pub fn is_busy(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Drop the current tree and start reading `location`.
    pub fn start_reading(&mut self, location: &str) -> Result<NodeIndex> {
        self.queue.abort(&mut self.tree);
        self.tree.clear();

        let root = match local_path(location) {
            Some(path) => {
                let path = normalize(path);
                let meta = std::fs::metadata(path)?;
                if !meta.is_dir() {
                    return Err(CoreError::NotADirectory(path.to_string()));
                }
                info!("Starting local scan of {path}");
                let root = self
                    .tree
                    .set_root(FileNode::new_dir(path, EntryStat::from_metadata(&meta)));
                self.queue
                    .enqueue(&mut self.tree, Box::new(LocalDirReadJob::new(root, path)));
                self.read_method = Some(ReadMethod::Local);
                root
            }
            None => {
                if self.service.is_none() {
                    return Err(CoreError::NoDirectoryService(location.to_string()));
                }
                let url = normalize(location);
                info!("Starting remote scan of {url}");
                let mut node = FileNode::new_dir(url, EntryStat::directory());
                node.is_local = false;
                let root = self.tree.set_root(node);
                self.queue
                    .enqueue(&mut self.tree, Box::new(RemoteDirReadJob::new(root, url)));
                self.read_method = Some(ReadMethod::Remote);
                root
            }
        };
        self.started = Some(Instant::now());
        Ok(root)
    }

    /// Run the head job once.
    pub fn tick(&mut self) -> TickStatus {
        let status = self.queue.tick(
            &mut self.tree,
            &self.rules,
            &self.settings,
            self.service.as_deref_mut(),
        );
        if status == TickStatus::Idle {
            if let Some(started) = self.started.take() {
                info!(
                    "Scan complete: {} nodes in {:?}",
                    self.tree.len(),
                    started.elapsed()
                );
            }
        }
        status
    }

    /// Tick until the queue is empty, sleeping briefly whenever all that is
    /// left is waiting on remote listings.
    pub fn run_to_completion(&mut self) {
        while self.tick() == TickStatus::Busy {
            if self.queue.is_stalled() {
                std::thread::sleep(WAIT_INTERVAL);
            }
        }
    }

    /// `true` while every queued job is waiting on a listing.
    pub fn is_waiting(&self) -> bool {
        self.queue.is_stalled()
    }

    /// Drop all queued jobs, marking their directories aborted.
    pub fn abort(&mut self) {
        self.queue.abort(&mut self.tree);
        self.started = None;
    }

    /// Re-read the directory owning `node`, replacing its subtree.
    ///
    /// Files and dot-entries refresh their directory. Refreshing the root
    /// restarts the whole scan. An explicit refresh ignores exclude rules
    /// for the refreshed directory itself. Returns the new node.
    pub fn refresh(&mut self, node: NodeIndex) -> Result<NodeIndex> {
        let mut dir = node;
        while !self.tree.get(dir).is_some_and(|n| n.is_dir() && !n.is_dot_entry()) {
            dir = self.tree.parent(dir).ok_or(CoreError::EmptyTree)?;
        }

        let Some(parent) = self.tree.parent(dir) else {
            return self.refresh_all();
        };

        let location = self.tree.full_path(dir);
        let old = self.tree.node(dir);
        let name = old.name.clone();
        let is_local = old.is_local;
        info!("Refreshing {location}");

        self.queue.kill_all(&mut self.tree, dir);
        self.tree.delete_subtree(dir);

        let fresh = if is_local {
            match std::fs::symlink_metadata(&location) {
                Ok(meta) => {
                    let node = FileNode::new_dir(name, EntryStat::from_metadata(&meta));
                    let child = self.tree.insert_child(parent, node);
                    self.queue
                        .enqueue(&mut self.tree, Box::new(LocalDirReadJob::new(child, location)));
                    child
                }
                Err(err) => {
                    warn!("Cannot stat {location}: {err}");
                    let child = self.tree.insert_child(parent, FileNode::new_error(name));
                    self.tree.finalize_local(child);
                    return Ok(child);
                }
            }
        } else {
            let mut node = FileNode::new_dir(name, EntryStat::directory());
            node.is_local = false;
            let child = self.tree.insert_child(parent, node);
            self.queue
                .enqueue(&mut self.tree, Box::new(RemoteDirReadJob::new(child, location)));
            child
        };
        self.started.get_or_insert_with(Instant::now);
        Ok(fresh)
    }

    /// Restart the scan from the root's location.
    pub fn refresh_all(&mut self) -> Result<NodeIndex> {
        let root = self.tree.root().ok_or(CoreError::EmptyTree)?;
        let location = self.tree.full_path(root);
        self.start_reading(&location)
    }

    /// Write the whole tree to a cache file.
    pub fn write_cache(&self, path: impl AsRef<Path>) -> Result<()> {
        let root = self.tree.root().ok_or(CoreError::EmptyTree)?;
        cache::write_cache(&self.tree, root, path)
    }

    /// Drop the current tree and replay a cache file instead.
    pub fn read_cache(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let reader = CacheReader::open(path.as_ref())?;
        self.queue.abort(&mut self.tree);
        self.tree.clear();
        info!("Reading cache file {}", path.as_ref().display());
        self.queue
            .enqueue(&mut self.tree, Box::new(CacheReadJob::new(reader, None)));
        self.read_method = Some(ReadMethod::Cache);
        self.started = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_split_into_local_and_remote() {
        assert_eq!(local_path("/home/me"), Some("/home/me"));
        assert_eq!(local_path("file:///home/me"), Some("/home/me"));
        assert_eq!(local_path("relative/dir"), Some("relative/dir"));
        assert_eq!(local_path("sftp://host/dir"), None);
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        assert_eq!(normalize("/home/me/"), "/home/me");
        assert_eq!(normalize("/home/me"), "/home/me");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("///"), "/");
    }

    #[test]
    fn remote_scan_needs_a_service() {
        let mut scanner = Scanner::new(ScanSettings::default()).unwrap();
        let err = scanner.start_reading("sftp://host/dir").unwrap_err();
        assert!(matches!(err, CoreError::NoDirectoryService(_)));
    }

    #[test]
    fn bad_exclude_rule_fails_construction() {
        let settings = ScanSettings {
            exclude: vec![ExcludeRuleConfig::new("[")],
            ..ScanSettings::default()
        };
        assert!(matches!(
            Scanner::new(settings),
            Err(CoreError::InvalidExcludePattern(_))
        ));
    }
}
