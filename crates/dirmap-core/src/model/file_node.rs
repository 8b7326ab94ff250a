/// A single node in the arena-allocated directory tree.
///
/// Nodes are stored in a flat slot vector owned by [`DirTree`](super::DirTree).
/// Parent-child relationships use [`NodeIndex`] handles rather than pointers:
/// the parent link is a plain back-reference, children form a singly-linked
/// sibling list, and directory-only data sits behind [`NodeKind::Dir`].
use compact_str::CompactString;
use std::cell::Cell;
use std::fs::Metadata;

/// Display name of every dot-entry.
pub const DOT_ENTRY_NAME: &str = "<Files>";

/// Bytes per allocation block as reported by `st_blocks`.
pub const BLOCK_SIZE: u64 = 512;

/// Stable handle into the tree arena.
///
/// Carries the slot generation so a handle to a deleted node is detected
/// instead of silently aliasing whatever reuses the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex {
    slot: u32,
    generation: u32,
}

impl NodeIndex {
    #[inline]
    pub(crate) fn new(slot: usize, generation: u32) -> Self {
        debug_assert!(slot <= u32::MAX as usize, "NodeIndex overflow");
        Self {
            slot: slot as u32,
            generation,
        }
    }

    /// Slot position in the arena.
    #[inline]
    pub fn idx(self) -> usize {
        self.slot as usize
    }

    #[inline]
    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

/// Filesystem entry type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FileType {
    #[default]
    Regular,
    Directory,
    Symlink,
    BlockDevice,
    CharDevice,
    /// FIFOs and sockets.
    Special,
}

/// Progress of reading one directory level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadState {
    Queued,
    Reading,
    Finished,
    /// Deliberately not read (mount point, excluded); may be read on request.
    OnRequestOnly,
    Error,
    Aborted,
}

/// Raw attributes of one directory entry, independent of where they came
/// from (lstat, a cache line, or a remote listing).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryStat {
    pub byte_size: u64,
    pub blocks: u64,
    pub links: u64,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: i64,
    pub device: u64,
    pub file_type: FileType,
}

impl EntryStat {
    /// Attributes for a directory with nothing known about it.
    pub fn directory() -> Self {
        Self {
            links: 1,
            file_type: FileType::Directory,
            ..Self::default()
        }
    }

    /// Build from `lstat`-style metadata.
    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::{FileTypeExt, MetadataExt};

        let ft = meta.file_type();
        let file_type = if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else if ft.is_block_device() {
            FileType::BlockDevice
        } else if ft.is_char_device() {
            FileType::CharDevice
        } else if ft.is_fifo() || ft.is_socket() {
            FileType::Special
        } else {
            FileType::Regular
        };

        Self {
            byte_size: meta.size(),
            blocks: meta.blocks(),
            links: meta.nlink(),
            mtime: meta.mtime(),
            device: meta.dev(),
            file_type,
        }
    }

    /// Build from metadata on platforms without `st_blocks`/`st_dev`.
    #[cfg(not(unix))]
    pub fn from_metadata(meta: &Metadata) -> Self {
        let ft = meta.file_type();
        let file_type = if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else {
            FileType::Regular
        };
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Self {
            byte_size: meta.len(),
            blocks: meta.len().div_ceil(BLOCK_SIZE),
            links: 1,
            mtime,
            device: 0,
            file_type,
        }
    }
}

/// Subtree totals cached on every directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub total_size: u64,
    pub total_blocks: u64,
    pub total_items: u64,
    pub total_files: u64,
    pub total_subdirs: u64,
    pub latest_mtime: i64,
}

impl Summary {
    /// Fold another contribution into this one. Counters add, mtime takes the max.
    pub fn absorb(&mut self, other: &Summary) {
        self.total_size += other.total_size;
        self.total_blocks += other.total_blocks;
        self.total_items += other.total_items;
        self.total_files += other.total_files;
        self.total_subdirs += other.total_subdirs;
        self.latest_mtime = self.latest_mtime.max(other.latest_mtime);
    }
}

/// Directory-only state.
#[derive(Debug)]
pub struct DirInfo {
    /// Head of the real children list. Plain files live in the dot-entry
    /// while one exists.
    pub first_child: Option<NodeIndex>,
    pub dot_entry: Option<NodeIndex>,
    pub is_dot_entry: bool,
    pub is_mount_point: bool,
    pub is_excluded: bool,
    pub(crate) read_state: ReadState,
    pub(crate) pending_read_jobs: u32,
    pub(crate) summary: Cell<Summary>,
    pub(crate) dirty: Cell<bool>,
}

impl DirInfo {
    fn new(is_dot_entry: bool, own: Summary) -> Self {
        Self {
            first_child: None,
            dot_entry: None,
            is_dot_entry,
            is_mount_point: false,
            is_excluded: false,
            read_state: if is_dot_entry {
                ReadState::Finished
            } else {
                ReadState::Queued
            },
            pending_read_jobs: 0,
            summary: Cell::new(own),
            dirty: Cell::new(false),
        }
    }

    /// Number of read jobs targeting this directory or anything below it.
    pub fn pending_read_jobs(&self) -> u32 {
        self.pending_read_jobs
    }

    /// `true` while the cached summary needs a recompute.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }
}

/// File/directory discriminant.
#[derive(Debug)]
pub enum NodeKind {
    File,
    Dir(Box<DirInfo>),
}

/// A single file or directory in the tree.
#[derive(Debug)]
pub struct FileNode {
    /// Entry name only. The root node carries the full path it was scanned from.
    pub name: CompactString,
    /// Size as reported by the filesystem, before hard-link division.
    pub byte_size: u64,
    pub blocks: u64,
    pub links: u64,
    pub mtime: i64,
    pub device: u64,
    pub file_type: FileType,
    /// `false` for entries that came from a remote listing service.
    pub is_local: bool,
    /// Regular file with fewer allocated bytes than its logical size.
    pub is_sparse: bool,
    pub parent: Option<NodeIndex>,
    pub next_sibling: Option<NodeIndex>,
    pub kind: NodeKind,
}

impl FileNode {
    fn from_stat(name: CompactString, stat: EntryStat, kind: NodeKind) -> Self {
        let is_sparse = stat.file_type == FileType::Regular
            && stat.blocks > 0
            && stat.blocks * BLOCK_SIZE < stat.byte_size;
        Self {
            name,
            byte_size: stat.byte_size,
            blocks: stat.blocks,
            links: stat.links,
            mtime: stat.mtime,
            device: stat.device,
            file_type: stat.file_type,
            is_local: true,
            is_sparse,
            parent: None,
            next_sibling: None,
            kind,
        }
    }

    /// Create a non-directory node.
    pub fn new_file(name: impl Into<CompactString>, stat: EntryStat) -> Self {
        Self::from_stat(name.into(), stat, NodeKind::File)
    }

    /// Create a directory node. Its dot-entry is attached on insertion.
    pub fn new_dir(name: impl Into<CompactString>, mut stat: EntryStat) -> Self {
        stat.file_type = FileType::Directory;
        let mut node = Self::from_stat(name.into(), stat, NodeKind::File);
        let own = node.own_summary();
        node.kind = NodeKind::Dir(Box::new(DirInfo::new(false, own)));
        node
    }

    /// Create a placeholder for an entry that could not be stat'ed.
    pub fn new_error(name: impl Into<CompactString>) -> Self {
        let mut node = Self::new_dir(name, EntryStat::directory());
        if let NodeKind::Dir(dir) = &mut node.kind {
            dir.read_state = ReadState::Error;
        }
        node
    }

    pub(crate) fn new_dot_entry(parent: NodeIndex, is_local: bool) -> Self {
        let mut node = Self::from_stat(
            CompactString::const_new(DOT_ENTRY_NAME),
            EntryStat::directory(),
            NodeKind::Dir(Box::new(DirInfo::new(true, Summary::default()))),
        );
        node.links = 1;
        node.is_local = is_local;
        node.parent = Some(parent);
        node
    }

    /// Size counted towards totals: hard-linked files contribute
    /// `byte_size / links` so each link carries a share. Directory link
    /// counts reflect subdirectories, not sharing, and are ignored.
    pub fn size(&self) -> u64 {
        if self.links > 1 && self.file_type != FileType::Directory {
            self.byte_size / self.links
        } else {
            self.byte_size
        }
    }

    /// The raw attributes this node was built from.
    pub fn stat(&self) -> EntryStat {
        EntryStat {
            byte_size: self.byte_size,
            blocks: self.blocks,
            links: self.links,
            mtime: self.mtime,
            device: self.device,
            file_type: self.file_type,
        }
    }

    /// Bytes actually allocated on disk.
    pub fn allocated_size(&self) -> u64 {
        self.blocks * BLOCK_SIZE
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Dir(_))
    }

    #[inline]
    pub fn is_dot_entry(&self) -> bool {
        matches!(&self.kind, NodeKind::Dir(d) if d.is_dot_entry)
    }

    /// Regular files are the only entries counted as "files" in summaries.
    #[inline]
    pub fn is_regular_file(&self) -> bool {
        self.file_type == FileType::Regular && !self.is_dir()
    }

    #[inline]
    pub fn dir(&self) -> Option<&DirInfo> {
        match &self.kind {
            NodeKind::Dir(d) => Some(d),
            NodeKind::File => None,
        }
    }

    #[inline]
    pub fn dir_mut(&mut self) -> Option<&mut DirInfo> {
        match &mut self.kind {
            NodeKind::Dir(d) => Some(d),
            NodeKind::File => None,
        }
    }

    /// The node's own values before any children are folded in.
    pub(crate) fn own_summary(&self) -> Summary {
        Summary {
            total_size: self.size(),
            total_blocks: self.blocks,
            total_items: 0,
            total_files: 0,
            total_subdirs: 0,
            latest_mtime: self.mtime,
        }
    }
}
