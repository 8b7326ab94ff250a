/// Data model for the scanned directory tree.
///
/// Re-exports the arena-allocated tree and its node types.
pub mod dir_tree;
pub mod file_node;
pub mod size;

pub use dir_tree::{Children, DirTree};
pub use file_node::{
    DirInfo, EntryStat, FileNode, FileType, NodeIndex, NodeKind, ReadState, Summary, BLOCK_SIZE,
    DOT_ENTRY_NAME,
};
