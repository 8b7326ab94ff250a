/// Local filesystem read job: lists one directory per `read()` call.
///
/// Every entry is `lstat`ed (symlinks are never followed). Subdirectories
/// are inserted immediately and get their own job unless they are excluded
/// or sit on another filesystem; those become on-request-only nodes.
use super::queue::{JobContext, JobStatus, ReadJob};
use crate::cache::{CacheReader, CACHE_FILE_NAME};
use crate::model::{EntryStat, FileNode, FileType, NodeIndex, ReadState};
use compact_str::CompactString;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct LocalDirReadJob {
    dir: NodeIndex,
    path: PathBuf,
}

impl LocalDirReadJob {
    pub fn new(dir: NodeIndex, path: impl Into<PathBuf>) -> Self {
        Self {
            dir,
            path: path.into(),
        }
    }

    /// Open `cache_path` if its first directory is exactly the one being read.
    fn matching_cache(&self, cache_path: &Path, dir_path: &str) -> Option<CacheReader> {
        match CacheReader::first_dir(cache_path) {
            Ok(Some(first)) if first == dir_path => match CacheReader::open(cache_path) {
                Ok(reader) => {
                    info!("Using cache file {}", cache_path.display());
                    Some(reader)
                }
                Err(err) => {
                    warn!("Cannot use cache file {}: {err}", cache_path.display());
                    None
                }
            },
            Ok(Some(first)) => {
                debug!(
                    "Cache file {} is for {first}, not {dir_path}",
                    cache_path.display()
                );
                None
            }
            Ok(None) => None,
            Err(err) => {
                debug!("Ignoring cache file {}: {err}", cache_path.display());
                None
            }
        }
    }

    /// Insert one listed entry. Returns a reader when the entry is a cache
    /// file for this very directory.
    fn add_entry(
        &self,
        ctx: &mut JobContext<'_>,
        name: CompactString,
        path: PathBuf,
        meta: io::Result<Metadata>,
        dir_device: u64,
        dir_path: &str,
    ) -> Option<CacheReader> {
        let meta = match meta {
            Ok(meta) => meta,
            Err(err) => {
                warn!("Cannot stat {}: {err}", path.display());
                let placeholder = ctx.tree.insert_child(self.dir, FileNode::new_error(name));
                ctx.tree.finalize_local(placeholder);
                return None;
            }
        };
        let stat = EntryStat::from_metadata(&meta);

        if stat.file_type == FileType::Directory {
            let full = child_path(dir_path, &name);
            let child = ctx.tree.insert_child(self.dir, FileNode::new_dir(name, stat));

            if let Some(rule) = ctx.rules.matching_rule(&full) {
                debug!("Excluding {full} (rule {})", rule.pattern());
                ctx.tree.set_excluded(child, true);
                ctx.tree.set_read_state(child, ReadState::OnRequestOnly);
                ctx.tree.finalize_local(child);
            } else if stat.device != dir_device {
                ctx.tree.set_mount_point(child, true);
                if ctx.settings.cross_filesystems {
                    debug!("Crossing filesystem boundary at {full}");
                    ctx.enqueue(Box::new(LocalDirReadJob::new(child, path)));
                } else {
                    debug!("Not crossing filesystem boundary at {full}");
                    ctx.tree.set_read_state(child, ReadState::OnRequestOnly);
                    ctx.tree.finalize_local(child);
                }
            } else {
                ctx.enqueue(Box::new(LocalDirReadJob::new(child, path)));
            }
            return None;
        }

        if name == CACHE_FILE_NAME {
            if let Some(reader) = self.matching_cache(&path, dir_path) {
                return Some(reader);
            }
        }
        ctx.tree.insert_child(self.dir, FileNode::new_file(name, stat));
        None
    }
}

pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

impl ReadJob for LocalDirReadJob {
    fn dir(&self) -> Option<NodeIndex> {
        Some(self.dir)
    }

    fn read(&mut self, ctx: &mut JobContext<'_>) -> JobStatus {
        if !ctx.tree.contains(self.dir) {
            return JobStatus::Finished;
        }
        ctx.tree.set_read_state(self.dir, ReadState::Reading);
        ctx.tree.progress(format!("Reading {}", self.path.display()));

        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Cannot open directory {}: {err}", self.path.display());
                ctx.tree.set_read_state(self.dir, ReadState::Error);
                ctx.tree.finalize_local(self.dir);
                return JobStatus::Finished;
            }
        };

        let dir_device = ctx.tree.node(self.dir).device;
        let dir_path = ctx.tree.full_path(self.dir);

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error reading {}: {err}", self.path.display());
                    continue;
                }
            };
            let name = CompactString::new(entry.file_name().to_string_lossy());
            let path = entry.path();
            let meta = fs::symlink_metadata(&path);
            if let Some(reader) = self.add_entry(ctx, name, path, meta, dir_device, &dir_path) {
                return JobStatus::UseCache(reader);
            }
        }

        ctx.tree.set_read_state(self.dir, ReadState::Finished);
        ctx.tree.finalize_local(self.dir);
        JobStatus::Finished
    }
}
