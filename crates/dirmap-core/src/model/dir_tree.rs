/// Arena-backed directory tree with lazily recomputed subtree summaries.
///
/// All nodes live in a single slot vector. Relationships between nodes use
/// [`NodeIndex`] handles, so deleting a whole subtree is a matter of freeing
/// its slots; any stale handle is rejected by the generation check.
///
/// Directory summaries are cached in `Cell`s so read-only callers (the
/// treemap layout, reports) can trigger the lazy recompute through `&self`.
use super::file_node::{FileNode, NodeIndex, NodeKind, ReadState, Summary};
use crate::events::{Observer, TreeEvent};
use crossbeam_channel::Receiver;
use tracing::debug;

struct Slot {
    generation: u32,
    node: Option<FileNode>,
}

/// The scanned tree of one scan session.
pub struct DirTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
    root: Option<NodeIndex>,
    selection: Vec<NodeIndex>,
    observers: Vec<Observer>,
}

impl Default for DirTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DirTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirTree")
            .field("len", &self.len)
            .field("root", &self.root)
            .field("selection", &self.selection)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Iterator over a sibling list.
pub struct Children<'a> {
    tree: &'a DirTree,
    next: Option<NodeIndex>,
}

impl Iterator for Children<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let current = self.next?;
        self.next = self.tree.node(current).next_sibling;
        Some(current)
    }
}

impl DirTree {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            root: None,
            selection: Vec::new(),
            observers: Vec::new(),
        }
    }

    // ── Arena ──────────────────────────────────────────────────────

    fn alloc(&mut self, node: FileNode) -> NodeIndex {
        self.len += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.node = Some(node);
            NodeIndex::new(slot as usize, entry.generation)
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeIndex::new(self.slots.len() - 1, 0)
        }
    }

    fn release(&mut self, index: NodeIndex) {
        let slot = &mut self.slots[index.idx()];
        if slot.generation == index.generation() && slot.node.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index.idx() as u32);
            self.len -= 1;
        }
    }

    /// Look up a node, returning `None` for stale or foreign handles.
    pub fn get(&self, index: NodeIndex) -> Option<&FileNode> {
        self.slots
            .get(index.idx())
            .filter(|s| s.generation == index.generation())
            .and_then(|s| s.node.as_ref())
    }

    fn get_mut(&mut self, index: NodeIndex) -> Option<&mut FileNode> {
        self.slots
            .get_mut(index.idx())
            .filter(|s| s.generation == index.generation())
            .and_then(|s| s.node.as_mut())
    }

    /// Get the node behind a live handle.
    ///
    /// Panics on a stale handle, the same way indexing a `Vec` out of
    /// bounds does.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &FileNode {
        match self.get(index) {
            Some(node) => node,
            None => panic!("stale node handle {index:?}"),
        }
    }

    fn node_mut(&mut self, index: NodeIndex) -> &mut FileNode {
        match self.get_mut(index) {
            Some(node) => node,
            None => panic!("stale node handle {index:?}"),
        }
    }

    fn dir_mut(&mut self, index: NodeIndex) -> &mut super::file_node::DirInfo {
        match self.node_mut(index).dir_mut() {
            Some(dir) => dir,
            None => panic!("node {index:?} is not a directory"),
        }
    }

    #[inline]
    pub fn contains(&self, index: NodeIndex) -> bool {
        self.get(index).is_some()
    }

    /// Number of live nodes, dot-entries included.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    #[inline]
    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.get(index).and_then(|n| n.parent)
    }

    /// Every live node in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &FileNode)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.node
                .as_ref()
                .map(|n| (NodeIndex::new(i, slot.generation), n))
        })
    }

    /// Real children of a directory (not its dot-entry).
    pub fn children(&self, index: NodeIndex) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(index).and_then(|n| n.dir()).and_then(|d| d.first_child),
        }
    }

    /// Real children followed by the dot-entry, if any.
    pub fn children_with_dot_entry(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.children(index).chain(self.dot_entry(index))
    }

    /// Children plus dot-entry, sorted by total size descending.
    pub fn children_sorted_by_size(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<(NodeIndex, u64)> = self
            .children_with_dot_entry(index)
            .map(|c| (c, self.total_size(c)))
            .collect();
        children.sort_by(|a, b| b.1.cmp(&a.1));
        children.into_iter().map(|(c, _)| c).collect()
    }

    #[inline]
    pub fn dot_entry(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.get(index).and_then(|n| n.dir()).and_then(|d| d.dot_entry)
    }

    /// `true` if `index` is `ancestor` or lies below it.
    pub fn is_in_subtree(&self, index: NodeIndex, ancestor: NodeIndex) -> bool {
        let mut current = Some(index);
        while let Some(idx) = current {
            if idx == ancestor {
                return true;
            }
            current = self.parent(idx);
        }
        false
    }

    // ── Observers ──────────────────────────────────────────────────

    /// Register a callback that receives every tree event.
    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    /// Register a channel observer and return its receiving end.
    pub fn subscribe_channel(&mut self) -> Receiver<TreeEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.observers.push(Box::new(move |event: &TreeEvent| {
            let _ = tx.send(event.clone());
        }));
        rx
    }

    pub(crate) fn emit(&mut self, event: TreeEvent) {
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
    }

    /// Send advisory progress text to observers.
    pub fn progress(&mut self, text: impl Into<String>) {
        self.emit(TreeEvent::Progress(text.into()));
    }

    // ── Structure ──────────────────────────────────────────────────

    /// Replace the whole tree with a new root. Returns the root handle.
    pub fn set_root(&mut self, node: FileNode) -> NodeIndex {
        self.clear();
        let is_dir = node.is_dir();
        let is_local = node.is_local;
        let root = self.alloc(node);
        self.root = Some(root);
        self.emit(TreeEvent::ChildAdded(root));
        if is_dir {
            let dot = self.alloc(FileNode::new_dot_entry(root, is_local));
            self.dir_mut(root).dot_entry = Some(dot);
            self.emit(TreeEvent::ChildAdded(dot));
        }
        root
    }

    /// Delete everything. Slots are kept so old handles stay detectably stale.
    pub fn clear(&mut self) {
        if let Some(root) = self.root {
            self.delete_subtree(root);
        }
        self.root = None;
    }

    /// Insert `node` under `parent`.
    ///
    /// Directories always become real children; anything else goes into the
    /// parent's dot-entry while it has one. A new directory gets its own
    /// dot-entry, and observers hear about both.
    pub fn insert_child(&mut self, parent: NodeIndex, mut node: FileNode) -> NodeIndex {
        let is_dir = node.is_dir();
        let is_local = node.is_local;
        let target = if is_dir {
            parent
        } else {
            self.dot_entry(parent).unwrap_or(parent)
        };

        node.parent = Some(target);
        node.next_sibling = self.dir_mut(target).first_child;
        let child = self.alloc(node);
        self.dir_mut(target).first_child = Some(child);

        let dot = if is_dir {
            let dot = self.alloc(FileNode::new_dot_entry(child, is_local));
            self.dir_mut(child).dot_entry = Some(dot);
            Some(dot)
        } else {
            None
        };

        self.child_added(target, child);
        self.emit(TreeEvent::ChildAdded(child));
        if let Some(dot) = dot {
            self.emit(TreeEvent::ChildAdded(dot));
        }
        child
    }

    /// Remove a node and everything below it.
    ///
    /// Observers get [`TreeEvent::DeletingChild`] before anything is
    /// unlinked. The ancestors' summaries are marked dirty.
    pub fn delete_subtree(&mut self, index: NodeIndex) {
        if !self.contains(index) {
            return;
        }
        self.emit(TreeEvent::DeletingChild(index));

        let before = self.selection.len();
        let doomed: Vec<NodeIndex> = self
            .selection
            .iter()
            .copied()
            .filter(|&s| self.is_in_subtree(s, index))
            .collect();
        if !doomed.is_empty() {
            self.selection.retain(|s| !doomed.contains(s));
        }
        if self.selection.len() != before {
            let selection = self.selection.clone();
            self.emit(TreeEvent::SelectionChanged(selection));
        }

        match self.node(index).parent {
            Some(parent) => {
                // Jobs still queued below `index` will find their target gone
                // and cannot release the ancestors' counts themselves.
                let pending = self.node(index).dir().map_or(0, |d| d.pending_read_jobs);
                if pending > 0 {
                    self.release_pending_jobs(parent, pending);
                }
                self.unlink(parent, index);
                self.mark_dirty_upwards(parent);
            }
            None => {
                if self.root == Some(index) {
                    self.root = None;
                }
            }
        }

        let mut stack = vec![index];
        while let Some(idx) = stack.pop() {
            stack.extend(self.children_with_dot_entry(idx));
            self.release(idx);
        }
    }

    /// Detach `child` from `parent`'s children list or dot-entry slot.
    fn unlink(&mut self, parent: NodeIndex, child: NodeIndex) {
        let next = self.node(child).next_sibling;
        let dir = self.dir_mut(parent);
        if dir.dot_entry == Some(child) {
            dir.dot_entry = None;
            return;
        }
        if dir.first_child == Some(child) {
            dir.first_child = next;
            return;
        }
        let mut cursor = dir.first_child;
        while let Some(idx) = cursor {
            let node = self.node_mut(idx);
            if node.next_sibling == Some(child) {
                node.next_sibling = next;
                return;
            }
            cursor = node.next_sibling;
        }
    }

    // ── Aggregation ────────────────────────────────────────────────

    /// Subtree totals of a node, recomputing a dirty directory first.
    pub fn summary(&self, index: NodeIndex) -> Summary {
        let node = self.node(index);
        match node.dir() {
            None => node.own_summary(),
            Some(dir) if dir.dirty.get() => self.recalc(index),
            Some(dir) => dir.summary.get(),
        }
    }

    /// Recompute a directory's totals from scratch: own values, then the
    /// dot-entry, then every real child.
    pub fn recalc(&self, index: NodeIndex) -> Summary {
        let node = self.node(index);
        let mut summary = node.own_summary();
        if let Some(dot) = self.dot_entry(index) {
            summary.absorb(&self.contribution(dot));
        }
        for child in self.children(index) {
            summary.absorb(&self.contribution(child));
        }
        if let Some(dir) = node.dir() {
            dir.summary.set(summary);
            dir.dirty.set(false);
        }
        summary
    }

    /// What `child` adds to its parent's totals. A dot-entry is not an item
    /// of its own; every other child counts once plus its subtree.
    fn contribution(&self, child: NodeIndex) -> Summary {
        let node = self.node(child);
        let mut summary = self.summary(child);
        if node.is_dot_entry() {
            return summary;
        }
        summary.total_items += 1;
        if node.is_dir() {
            summary.total_subdirs += 1;
        } else if node.is_regular_file() {
            summary.total_files += 1;
        }
        summary
    }

    /// Fold a new child into every clean ancestor summary, starting at `dir`.
    /// Dirty summaries are left alone; their next recompute picks it up.
    fn child_added(&self, dir: NodeIndex, child: NodeIndex) {
        let delta = self.contribution(child);
        let mut current = Some(dir);
        while let Some(idx) = current {
            let node = self.node(idx);
            if let Some(info) = node.dir() {
                if !info.dirty.get() {
                    let mut summary = info.summary.get();
                    summary.absorb(&delta);
                    info.summary.set(summary);
                }
            }
            current = node.parent;
        }
    }

    /// Mark `index` and all its ancestors as needing a recompute.
    pub fn mark_dirty_upwards(&self, index: NodeIndex) {
        let mut current = Some(index);
        while let Some(idx) = current {
            let node = self.node(idx);
            if let Some(dir) = node.dir() {
                dir.dirty.set(true);
            }
            current = node.parent;
        }
    }

    #[inline]
    pub fn total_size(&self, index: NodeIndex) -> u64 {
        self.summary(index).total_size
    }

    #[inline]
    pub fn total_blocks(&self, index: NodeIndex) -> u64 {
        self.summary(index).total_blocks
    }

    #[inline]
    pub fn total_items(&self, index: NodeIndex) -> u64 {
        self.summary(index).total_items
    }

    #[inline]
    pub fn total_files(&self, index: NodeIndex) -> u64 {
        self.summary(index).total_files
    }

    #[inline]
    pub fn total_subdirs(&self, index: NodeIndex) -> u64 {
        self.summary(index).total_subdirs
    }

    #[inline]
    pub fn latest_mtime(&self, index: NodeIndex) -> i64 {
        self.summary(index).latest_mtime
    }

    // ── Read state ─────────────────────────────────────────────────

    /// Read state of a directory. A dot-entry reports its parent's state;
    /// plain files are always finished.
    pub fn read_state(&self, index: NodeIndex) -> ReadState {
        let node = self.node(index);
        match node.dir() {
            None => ReadState::Finished,
            Some(dir) if dir.is_dot_entry => match node.parent {
                Some(parent) => self.read_state(parent),
                None => ReadState::Finished,
            },
            Some(dir) => dir.read_state,
        }
    }

    /// Change a directory's read state. `Aborted` is sticky against a late
    /// `Finished`; dot-entries have no state of their own.
    pub fn set_read_state(&mut self, index: NodeIndex, state: ReadState) {
        let Some(dir) = self.get_mut(index).and_then(|n| n.dir_mut()) else {
            return;
        };
        if dir.is_dot_entry {
            return;
        }
        if dir.read_state == ReadState::Aborted && state == ReadState::Finished {
            return;
        }
        dir.read_state = state;
    }

    pub fn set_excluded(&mut self, index: NodeIndex, excluded: bool) {
        if let Some(dir) = self.get_mut(index).and_then(|n| n.dir_mut()) {
            dir.is_excluded = excluded;
        }
    }

    pub fn set_mount_point(&mut self, index: NodeIndex, mount_point: bool) {
        if let Some(dir) = self.get_mut(index).and_then(|n| n.dir_mut()) {
            dir.is_mount_point = mount_point;
        }
    }

    /// A read job targeting `index` was queued.
    pub fn read_job_added(&mut self, index: NodeIndex) {
        let mut current = Some(index);
        while let Some(idx) = current {
            let Some(node) = self.get_mut(idx) else { break };
            if let Some(dir) = node.dir_mut() {
                dir.pending_read_jobs += 1;
            }
            current = node.parent;
        }
    }

    /// A read job targeting `index` completed or was discarded.
    pub fn read_job_finished(&mut self, index: NodeIndex) {
        self.release_pending_jobs(index, 1);
    }

    fn release_pending_jobs(&mut self, index: NodeIndex, count: u32) {
        let mut current = Some(index);
        while let Some(idx) = current {
            let Some(node) = self.get_mut(idx) else { break };
            if let Some(dir) = node.dir_mut() {
                dir.pending_read_jobs = dir.pending_read_jobs.saturating_sub(count);
            }
            current = node.parent;
        }
    }

    /// A queued read job targeting `index` was aborted before it ran.
    pub fn read_job_aborted(&mut self, index: NodeIndex) {
        self.set_read_state(index, ReadState::Aborted);
        self.read_job_finished(index);
    }

    /// `true` while anything at or below this node is queued or being read.
    pub fn is_busy(&self, index: NodeIndex) -> bool {
        let node = self.node(index);
        match node.dir() {
            None => false,
            Some(dir) if dir.is_dot_entry => node.parent.is_some_and(|p| self.is_busy(p)),
            Some(dir) => {
                dir.pending_read_jobs > 0
                    || matches!(dir.read_state, ReadState::Queued | ReadState::Reading)
            }
        }
    }

    // ── Finalization ───────────────────────────────────────────────

    /// A directory level is complete: notify observers, then prune the
    /// dot-entry.
    pub fn finalize_local(&mut self, index: NodeIndex) {
        if !self.contains(index) {
            return;
        }
        self.emit(TreeEvent::Finalized(index));
        self.cleanup_dot_entry(index);
    }

    /// Keep a dot-entry only where plain files and real subdirectories
    /// coexist. Files of a directory without subdirectories move up into
    /// the directory itself; an empty dot-entry is deleted.
    pub fn cleanup_dot_entry(&mut self, index: NodeIndex) {
        let (first_child, dot) = match self.get(index).and_then(|n| n.dir()) {
            Some(dir) if !dir.is_dot_entry => (dir.first_child, dir.dot_entry),
            _ => return,
        };
        let Some(dot) = dot else { return };

        if first_child.is_none() {
            let mut moved = self.dir_mut(dot).first_child.take();
            while let Some(child) = moved {
                let head = self.dir_mut(index).first_child;
                let node = self.node_mut(child);
                moved = node.next_sibling;
                node.parent = Some(index);
                node.next_sibling = head;
                self.dir_mut(index).first_child = Some(child);
            }
            self.mark_dirty_upwards(dot);
        }

        if self.dir_mut(dot).first_child.is_none() {
            debug!("Dropping empty dot-entry of {}", self.full_path(index));
            self.delete_subtree(dot);
        }
    }

    // ── Paths ──────────────────────────────────────────────────────

    /// Reconstruct the full path for a node by walking up to the root.
    /// The root's name is already a full path; dot-entries are skipped.
    pub fn full_path(&self, index: NodeIndex) -> String {
        let mut segments: Vec<&str> = Vec::new();
        let mut current = Some(index);
        while let Some(idx) = current {
            let node = self.node(idx);
            if !node.is_dot_entry() {
                segments.push(node.name.as_str());
            }
            current = node.parent;
        }
        segments.reverse();

        let mut path = String::new();
        for segment in segments {
            if !path.is_empty() && !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(segment);
        }
        path
    }

    /// Find a node by full path. With `find_dot_entries` set, plain files
    /// held in dot-entries are found too.
    pub fn locate(&self, path: &str, find_dot_entries: bool) -> Option<NodeIndex> {
        let root = self.root?;
        let root_name = self.node(root).name.as_str();
        if path == root_name {
            return Some(root);
        }
        let rest = path.strip_prefix(root_name)?;
        let rest = if root_name.ends_with('/') {
            rest
        } else {
            rest.strip_prefix('/')?
        };

        let mut current = root;
        for component in rest.split('/').filter(|c| !c.is_empty()) {
            let found = self
                .children(current)
                .find(|&c| self.node(c).name == component)
                .or_else(|| {
                    if !find_dot_entries {
                        return None;
                    }
                    let dot = self.dot_entry(current)?;
                    self.children(dot).find(|&c| self.node(c).name == component)
                });
            current = found?;
        }
        Some(current)
    }

    // ── Selection ──────────────────────────────────────────────────

    pub fn selection(&self) -> &[NodeIndex] {
        &self.selection
    }

    /// First selected node.
    pub fn current_item(&self) -> Option<NodeIndex> {
        self.selection.first().copied()
    }

    /// Replace the selection with a single node (or nothing).
    pub fn select(&mut self, index: Option<NodeIndex>) {
        let selection: Vec<NodeIndex> = index.filter(|&i| self.contains(i)).into_iter().collect();
        if selection != self.selection {
            self.selection = selection.clone();
            self.emit(TreeEvent::SelectionChanged(selection));
        }
    }

    pub fn add_to_selection(&mut self, index: NodeIndex) {
        if self.contains(index) && !self.selection.contains(&index) {
            self.selection.push(index);
            let selection = self.selection.clone();
            self.emit(TreeEvent::SelectionChanged(selection));
        }
    }

    pub fn clear_selection(&mut self) {
        self.select(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::file_node::{EntryStat, FileType};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn file_stat(size: u64, mtime: i64) -> EntryStat {
        EntryStat {
            byte_size: size,
            blocks: size.div_ceil(512),
            links: 1,
            mtime,
            device: 1,
            file_type: FileType::Regular,
        }
    }

    fn dir_stat() -> EntryStat {
        EntryStat {
            device: 1,
            ..EntryStat::directory()
        }
    }

    /// Build:
    ///
    /// ```text
    /// /root
    ///   a/      x (100), y (300)
    ///   b.txt   (50)
    /// ```
    fn scenario() -> (DirTree, NodeIndex, NodeIndex) {
        let mut tree = DirTree::new();
        let root = tree.set_root(FileNode::new_dir("/root", dir_stat()));
        let a = tree.insert_child(root, FileNode::new_dir("a", dir_stat()));
        tree.insert_child(a, FileNode::new_file("x", file_stat(100, 10)));
        tree.insert_child(a, FileNode::new_file("y", file_stat(300, 30)));
        tree.insert_child(root, FileNode::new_file("b.txt", file_stat(50, 20)));
        tree.finalize_local(a);
        tree.finalize_local(root);
        (tree, root, a)
    }

    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }
    }

    #[test]
    fn scenario_dot_entry_holds_top_level_files() {
        let (tree, root, a) = scenario();

        let dot = tree.dot_entry(root).expect("root keeps its dot-entry");
        let files: Vec<&str> = tree.children(dot).map(|c| tree.node(c).name.as_str()).collect();
        assert_eq!(files, vec!["b.txt"]);
        assert_eq!(tree.total_size(root), 450);
        assert_eq!(tree.total_size(a), 400);
        assert_eq!(tree.total_files(root), 3);
        assert_eq!(tree.total_subdirs(root), 1);
        assert_eq!(tree.total_items(root), 4);
        assert_eq!(tree.latest_mtime(root), 30);
        // `a` has no subdirectories, so its files moved up and its dot-entry is gone.
        assert!(tree.dot_entry(a).is_none());
        assert_eq!(tree.children(a).count(), 2);
    }

    #[test]
    fn scenario_without_subdir_reparents_files() {
        let mut tree = DirTree::new();
        let root = tree.set_root(FileNode::new_dir("/root", dir_stat()));
        let b = tree.insert_child(root, FileNode::new_file("b.txt", file_stat(50, 20)));
        let dot = tree.dot_entry(root).unwrap();
        assert_eq!(tree.parent(b), Some(dot));

        tree.finalize_local(root);

        assert!(tree.dot_entry(root).is_none());
        assert!(!tree.contains(dot));
        assert_eq!(tree.parent(b), Some(root));
        assert_eq!(tree.total_size(root), 50);
        assert_eq!(tree.total_items(root), 1);
    }

    #[test]
    fn recalc_matches_definition() {
        let (tree, root, a) = scenario();
        let dot = tree.dot_entry(root).unwrap();
        let recomputed = tree.recalc(root);
        let expected = tree.node(root).size() + tree.total_size(a) + tree.total_size(dot);
        assert_eq!(recomputed.total_size, expected);
        assert_eq!(
            recomputed.latest_mtime,
            tree.latest_mtime(a).max(tree.latest_mtime(dot))
        );
    }

    #[test]
    fn incremental_equals_batch() {
        for seed in 1..40u64 {
            let mut rng = XorShift(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let mut tree = DirTree::new();
            let root = tree.set_root(FileNode::new_dir("/r", dir_stat()));
            let mut dirs = vec![root];
            for i in 0..60 {
                let parent = dirs[(rng.next() % dirs.len() as u64) as usize];
                if rng.next() % 4 == 0 {
                    let d = tree.insert_child(parent, FileNode::new_dir(format!("d{i}"), dir_stat()));
                    dirs.push(d);
                } else {
                    let size = rng.next() % 10_000;
                    let mtime = (rng.next() % 1_000) as i64;
                    tree.insert_child(parent, FileNode::new_file(format!("f{i}"), file_stat(size, mtime)));
                }
                if rng.next() % 10 == 0 {
                    // Force some levels dirty mid-stream.
                    tree.mark_dirty_upwards(parent);
                }
            }
            let incremental = tree.summary(root);
            for &d in dirs.iter().rev() {
                tree.mark_dirty_upwards(d);
            }
            assert_eq!(incremental, tree.recalc(root), "seed {seed}");
        }
    }

    #[test]
    fn delete_marks_ancestors_dirty_and_totals_shrink() {
        let (mut tree, root, a) = scenario();
        assert_eq!(tree.total_size(root), 450);
        tree.delete_subtree(a);
        assert!(tree.node(root).dir().unwrap().is_dirty());
        assert_eq!(tree.total_size(root), 50);
        assert!(!tree.contains(a));
    }

    #[test]
    fn stale_handle_is_rejected_after_slot_reuse() {
        let (mut tree, root, a) = scenario();
        tree.delete_subtree(a);
        let fresh = tree.insert_child(root, FileNode::new_file("new", file_stat(1, 1)));
        assert!(tree.get(a).is_none());
        assert!(tree.contains(fresh));
    }

    #[test]
    fn busy_propagates_to_every_ancestor() {
        let mut tree = DirTree::new();
        let root = tree.set_root(FileNode::new_dir("/r", dir_stat()));
        let mid = tree.insert_child(root, FileNode::new_dir("mid", dir_stat()));
        let leaf = tree.insert_child(mid, FileNode::new_dir("leaf", dir_stat()));
        for idx in [root, mid, leaf] {
            tree.set_read_state(idx, ReadState::Finished);
        }
        assert!(!tree.is_busy(root));

        tree.read_job_added(leaf);
        assert!(tree.is_busy(root));
        assert!(tree.is_busy(mid));
        assert!(tree.is_busy(leaf));

        tree.read_job_finished(leaf);
        assert!(!tree.is_busy(root));
        assert!(!tree.is_busy(mid));
    }

    #[test]
    fn aborted_beats_late_finished() {
        let mut tree = DirTree::new();
        let root = tree.set_root(FileNode::new_dir("/r", dir_stat()));
        tree.read_job_added(root);
        tree.read_job_aborted(root);
        tree.set_read_state(root, ReadState::Finished);
        assert_eq!(tree.read_state(root), ReadState::Aborted);
        assert!(!tree.is_busy(root));
    }

    #[test]
    fn dot_entry_reports_parent_read_state() {
        let mut tree = DirTree::new();
        let root = tree.set_root(FileNode::new_dir("/r", dir_stat()));
        let dot = tree.dot_entry(root).unwrap();
        tree.set_read_state(root, ReadState::Reading);
        assert_eq!(tree.read_state(dot), ReadState::Reading);
        assert!(tree.node(dot).is_dot_entry());
        assert!(tree.dot_entry(dot).is_none());
    }

    #[test]
    fn full_path_and_locate() {
        let (tree, root, a) = scenario();
        let x = tree.children(a).find(|&c| tree.node(c).name == "x").unwrap();
        assert_eq!(tree.full_path(x), "/root/a/x");
        let dot = tree.dot_entry(root).unwrap();
        assert_eq!(tree.full_path(dot), "/root");
        let b = tree.children(dot).next().unwrap();
        assert_eq!(tree.full_path(b), "/root/b.txt");

        assert_eq!(tree.locate("/root", false), Some(root));
        assert_eq!(tree.locate("/root/a/x", false), Some(x));
        assert_eq!(tree.locate("/root/b.txt", false), None);
        assert_eq!(tree.locate("/root/b.txt", true), Some(b));
        assert_eq!(tree.locate("/elsewhere", true), None);
    }

    #[test]
    fn root_slash_paths_do_not_double_up() {
        let mut tree = DirTree::new();
        let root = tree.set_root(FileNode::new_dir("/", dir_stat()));
        let usr = tree.insert_child(root, FileNode::new_dir("usr", dir_stat()));
        assert_eq!(tree.full_path(usr), "/usr");
        assert_eq!(tree.locate("/usr", false), Some(usr));
    }

    #[test]
    fn events_fire_for_children_dot_entries_and_deletion() {
        let mut tree = DirTree::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        tree.subscribe(Box::new(move |e: &TreeEvent| sink.borrow_mut().push(e.clone())));

        let root = tree.set_root(FileNode::new_dir("/r", dir_stat()));
        let sub = tree.insert_child(root, FileNode::new_dir("sub", dir_stat()));
        let sub_dot = tree.dot_entry(sub).unwrap();
        tree.delete_subtree(sub);

        let events = log.borrow();
        assert!(events.contains(&TreeEvent::ChildAdded(sub)));
        assert!(events.contains(&TreeEvent::ChildAdded(sub_dot)));
        assert_eq!(events.last(), Some(&TreeEvent::DeletingChild(sub)));
    }

    #[test]
    fn deleted_nodes_leave_the_selection() {
        let (mut tree, root, a) = scenario();
        let rx = tree.subscribe_channel();
        let x = tree.children(a).next().unwrap();
        tree.select(Some(x));
        tree.add_to_selection(root);
        assert_eq!(tree.selection(), &[x, root]);

        tree.delete_subtree(a);
        assert_eq!(tree.selection(), &[root]);
        let changes: Vec<TreeEvent> = rx
            .try_iter()
            .filter(|e| matches!(e, TreeEvent::SelectionChanged(_)))
            .collect();
        assert_eq!(changes.last(), Some(&TreeEvent::SelectionChanged(vec![root])));
    }
}
