/// Cache file reading and replay.
///
/// [`CacheReader`] validates the header on open and then hands out data
/// lines. [`CacheReadJob`] replays those lines into the tree a bounded
/// number per tick, so huge cache files do not stall the host loop.
use super::{is_ignorable, parse_line, CacheLine, CACHE_HEADER, LINES_PER_TICK};
use crate::error::{CoreError, Result};
use crate::model::{DirTree, FileNode, NodeIndex, ReadState};
use crate::scanner::{JobContext, JobStatus, ReadJob};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

type Decoder = zstd::Decoder<'static, BufReader<File>>;

pub struct CacheReader {
    path: PathBuf,
    lines: BufReader<Decoder>,
    line_no: u64,
    buf: String,
}

impl std::fmt::Debug for CacheReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheReader")
            .field("path", &self.path)
            .field("line_no", &self.line_no)
            .finish()
    }
}

impl CacheReader {
    /// Open a cache file and check its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = Self {
            path: path.to_path_buf(),
            lines: BufReader::new(zstd::Decoder::new(file)?),
            line_no: 0,
            buf: String::new(),
        };

        let mut header = String::new();
        let valid = match reader.lines.read_line(&mut header) {
            Ok(n) => n > 0 && header.trim_end() == CACHE_HEADER,
            Err(err) => {
                debug!("{}: header unreadable: {err}", path.display());
                false
            }
        };
        if !valid {
            warn!("{} is not a cache file", path.display());
            return Err(CoreError::BadCacheHeader {
                path: path.display().to_string(),
            });
        }
        reader.line_no = 1;
        Ok(reader)
    }

    /// Path of the first directory in a cache file, without reading the rest.
    pub fn first_dir(path: impl AsRef<Path>) -> Result<Option<String>> {
        let mut reader = Self::open(path)?;
        while let Some(line) = reader.next_line()? {
            if let Some(parsed) = parse_line(line) {
                return Ok(parsed.is_dir().then_some(parsed.name));
            }
        }
        Ok(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line number of the line last returned by [`next_line`](Self::next_line).
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    /// The next data line, skipping blanks and comments.
    pub fn next_line(&mut self) -> io::Result<Option<&str>> {
        loop {
            self.buf.clear();
            if self.lines.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if !is_ignorable(&self.buf) {
                return Ok(Some(self.buf.trim_end_matches(['\n', '\r'])));
            }
        }
    }
}

/// Split a directory path into parent path and last component.
fn split_path(path: &str) -> Option<(&str, &str)> {
    let pos = path.rfind('/')?;
    let name = &path[pos + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if pos == 0 { "/" } else { &path[..pos] };
    Some((parent, name))
}

/// Replays a cache file into the tree.
///
/// The first directory line becomes the new root (no parent) or a child of
/// `parent`. Later directory lines are attached to the directory named by
/// their parent path. Directories matching an exclude rule are inserted as
/// excluded and their cached content is skipped.
pub struct CacheReadJob {
    reader: CacheReader,
    parent: Option<NodeIndex>,
    toplevel: Option<NodeIndex>,
    last_dir: Option<NodeIndex>,
    last_dir_path: String,
    /// Set while the lines belong to a directory that was not materialised.
    skipping: bool,
    /// Every directory read so far, in file order.
    dirs: Vec<NodeIndex>,
    entries: u64,
}

impl CacheReadJob {
    pub fn new(reader: CacheReader, parent: Option<NodeIndex>) -> Self {
        Self {
            reader,
            parent,
            toplevel: None,
            last_dir: None,
            last_dir_path: String::new(),
            skipping: false,
            dirs: Vec::new(),
            entries: 0,
        }
    }

    fn add(&mut self, ctx: &mut JobContext<'_>, line: CacheLine) {
        if line.is_dir() {
            self.add_dir(ctx, line);
        } else if !self.skipping {
            match self.last_dir {
                Some(dir) => {
                    ctx.tree.insert_child(dir, FileNode::new_file(line.name, line.stat));
                    self.entries += 1;
                }
                None => debug!("Cached entry {} has no directory", line.name),
            }
        }
    }

    fn add_dir(&mut self, ctx: &mut JobContext<'_>, line: CacheLine) {
        let CacheLine { name: path, stat } = line;

        let dir = if self.toplevel.is_none() {
            let dir = match self.parent {
                None => ctx.tree.set_root(FileNode::new_dir(path.as_str(), stat)),
                Some(parent) if ctx.tree.contains(parent) => {
                    let name = split_path(&path).map_or(path.as_str(), |(_, name)| name);
                    ctx.tree.insert_child(parent, FileNode::new_dir(name, stat))
                }
                Some(_) => {
                    warn!("Cache target vanished, skipping {}", self.reader.path().display());
                    self.skipping = true;
                    return;
                }
            };
            self.toplevel = Some(dir);
            dir
        } else {
            let Some(parent) = self.parent_for(ctx.tree, &path) else {
                debug!("Skipping cached directory {path} without a parent");
                self.skipping = true;
                self.last_dir = None;
                self.last_dir_path.clear();
                return;
            };
            let name = split_path(&path).map_or(path.as_str(), |(_, name)| name);
            let dir = ctx.tree.insert_child(parent, FileNode::new_dir(name, stat));

            if ctx.rules.matches(&path) {
                debug!("Excluding cached directory {path}");
                ctx.tree.set_excluded(dir, true);
                ctx.tree.set_read_state(dir, ReadState::OnRequestOnly);
                ctx.tree.finalize_local(dir);
                self.skipping = true;
                self.last_dir = Some(dir);
                self.last_dir_path = path;
                return;
            }
            dir
        };

        ctx.tree.set_read_state(dir, ReadState::Reading);
        self.dirs.push(dir);
        self.entries += 1;
        self.skipping = false;
        self.last_dir = Some(dir);
        self.last_dir_path = path;
    }

    /// The directory a cached directory line belongs under, if it was
    /// materialised and is not excluded.
    fn parent_for(&self, tree: &DirTree, path: &str) -> Option<NodeIndex> {
        let toplevel = self.toplevel?;
        let (parent_path, _) = split_path(path)?;
        let parent = if parent_path == self.last_dir_path {
            self.last_dir?
        } else {
            tree.locate(parent_path, false)?
        };
        let info = tree.get(parent)?.dir()?;
        (!info.is_excluded && tree.is_in_subtree(parent, toplevel)).then_some(parent)
    }

    /// Close every directory read, children before parents.
    fn finish(&mut self, tree: &mut DirTree) {
        for &dir in self.dirs.iter().rev() {
            if !tree.contains(dir) {
                continue;
            }
            if tree.read_state(dir) == ReadState::Reading {
                tree.set_read_state(dir, ReadState::Finished);
            }
            tree.finalize_local(dir);
        }
        if self.toplevel.is_none() {
            warn!("Cache file {} holds no directory", self.reader.path().display());
        }
        info!(
            "Loaded {} entries from cache {}",
            self.entries,
            self.reader.path().display()
        );
    }
}

impl ReadJob for CacheReadJob {
    fn dir(&self) -> Option<NodeIndex> {
        self.parent
    }

    fn read(&mut self, ctx: &mut JobContext<'_>) -> JobStatus {
        for _ in 0..LINES_PER_TICK {
            let parsed = match self.reader.next_line() {
                Ok(Some(line)) => parse_line(line),
                Ok(None) => {
                    self.finish(ctx.tree);
                    return JobStatus::Finished;
                }
                Err(err) => {
                    warn!(
                        "{}:{}: read error, stopping: {err}",
                        self.reader.path().display(),
                        self.reader.line_no()
                    );
                    self.finish(ctx.tree);
                    return JobStatus::Finished;
                }
            };
            match parsed {
                Some(line) => self.add(ctx, line),
                None => warn!(
                    "{}:{}: skipping malformed line",
                    self.reader.path().display(),
                    self.reader.line_no()
                ),
            }
        }
        ctx.tree.progress(format!(
            "Reading cache {}: {} entries",
            self.reader.path().display(),
            self.entries
        ));
        JobStatus::Yield
    }

    fn abort(&mut self, tree: &mut DirTree) {
        for &dir in &self.dirs {
            if tree.contains(dir) && tree.read_state(dir) == ReadState::Reading {
                tree.set_read_state(dir, ReadState::Aborted);
            }
        }
        if let Some(parent) = self.parent {
            tree.read_job_finished(parent);
        }
    }
}
