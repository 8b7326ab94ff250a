/// Largest individual files below a node.
use crate::model::{DirTree, NodeIndex};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargestFile {
    pub index: NodeIndex,
    /// Full path (reconstructed).
    pub path: String,
    /// Size as counted in totals (hard links share).
    pub size: u64,
}

/// The `n` largest non-directory entries at or below `start`, largest first.
///
/// Keeps a min-heap of size `n` so the walk stays O(total · log n).
pub fn top_files(tree: &DirTree, start: NodeIndex, n: usize) -> Vec<LargestFile> {
    if n == 0 || !tree.contains(start) {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<(u64, NodeIndex)>> = BinaryHeap::with_capacity(n + 1);
    let mut stack = vec![start];
    while let Some(idx) = stack.pop() {
        let node = tree.node(idx);
        if node.is_dir() {
            stack.extend(tree.children_with_dot_entry(idx));
            continue;
        }
        heap.push(Reverse((node.size(), idx)));
        if heap.len() > n {
            heap.pop();
        }
    }

    let mut largest: Vec<(u64, NodeIndex)> = heap.into_iter().map(|Reverse(entry)| entry).collect();
    largest.sort_by(|a, b| b.cmp(a));
    largest
        .into_iter()
        .map(|(size, index)| LargestFile {
            index,
            path: tree.full_path(index),
            size,
        })
        .collect()
}
