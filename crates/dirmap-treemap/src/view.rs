/// Treemap view state: which node the map is rooted at, zooming, and
/// coalesced rebuilds.
///
/// The view never holds on to tree data beyond node handles. Everything is
/// re-derived from the [`DirTree`] and the current root, so zooming back
/// out needs no history.
use crate::layout::Treemap;
use crate::rect::Rect;
use crate::settings::TreemapSettings;
use dirmap_core::events::TreeEvent;
use dirmap_core::model::{DirTree, NodeIndex};
use tracing::{debug, info};

#[derive(Debug)]
pub struct TreemapView {
    settings: TreemapSettings,
    bounds: Rect,
    /// Root of the map; `None` means the tree's own root.
    root: Option<NodeIndex>,
    map: Option<Treemap>,
    stale: bool,
}

impl TreemapView {
    pub fn new(settings: TreemapSettings, bounds: Rect) -> Self {
        Self {
            settings,
            bounds,
            root: None,
            map: None,
            stale: true,
        }
    }

    pub fn treemap(&self) -> Option<&Treemap> {
        self.map.as_ref()
    }

    pub fn settings(&self) -> &TreemapSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: TreemapSettings) {
        if settings != self.settings {
            self.settings = settings;
            self.stale = true;
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        if bounds != self.bounds {
            self.bounds = bounds;
            self.stale = true;
        }
    }

    /// The node the map is (or will be) rooted at.
    pub fn current_root(&self, tree: &DirTree) -> Option<NodeIndex> {
        self.root.filter(|&r| tree.contains(r)).or_else(|| tree.root())
    }

    /// Request a rebuild on the next [`rebuild_if_stale`](Self::rebuild_if_stale).
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// React to a tree change. Structural changes only mark the map stale,
    /// so a burst of deletions or insertions costs one rebuild.
    pub fn handle_event(&mut self, event: &TreeEvent) {
        match event {
            TreeEvent::ChildAdded(_)
            | TreeEvent::DeletingChild(_)
            | TreeEvent::Finalized(_)
            | TreeEvent::FinishedReading
            | TreeEvent::AbortedReading => self.stale = true,
            TreeEvent::Progress(_) | TreeEvent::SelectionChanged(_) | TreeEvent::StartingReading => {}
        }
    }

    /// Rebuild now if anything changed since the last build. Returns
    /// `true` if a rebuild happened.
    pub fn rebuild_if_stale(&mut self, tree: &DirTree) -> bool {
        if !self.stale {
            return false;
        }
        self.rebuild(tree);
        true
    }

    /// Lay the map out again from the current root. A root that has been
    /// deleted falls back to the tree's root.
    pub fn rebuild(&mut self, tree: &DirTree) {
        if self.root.is_some_and(|r| !tree.contains(r)) {
            info!("Treemap root vanished, showing the whole tree");
            self.root = None;
        }
        self.map = self
            .current_root(tree)
            .and_then(|root| Treemap::build(tree, root, self.bounds, &self.settings));
        self.stale = false;
    }

    /// Re-root the map at the ancestor of the current item that is an
    /// immediate child of the current root. Only directories can become a
    /// root. Returns `true` if the root changed.
    pub fn zoom_in(&mut self, tree: &DirTree) -> bool {
        let (Some(root), Some(mut node)) = (self.current_root(tree), tree.current_item()) else {
            return false;
        };
        if node == root || !tree.is_in_subtree(node, root) {
            return false;
        }
        while let Some(parent) = tree.parent(node) {
            if parent == root {
                break;
            }
            node = parent;
        }
        if !tree.node(node).is_dir() {
            return false;
        }
        debug!("Zooming treemap into {}", tree.full_path(node));
        self.root = Some(node);
        self.rebuild(tree);
        true
    }

    /// Re-root the map at the current root's parent. Returns `true` if the
    /// root changed.
    pub fn zoom_out(&mut self, tree: &DirTree) -> bool {
        let Some(parent) = self.current_root(tree).and_then(|r| tree.parent(r)) else {
            return false;
        };
        debug!("Zooming treemap out to {}", tree.full_path(parent));
        self.root = if tree.parent(parent).is_none() {
            None
        } else {
            Some(parent)
        };
        self.rebuild(tree);
        true
    }

    /// `true` if zooming out would change anything.
    pub fn can_zoom_out(&self, tree: &DirTree) -> bool {
        self.current_root(tree).and_then(|r| tree.parent(r)).is_some()
    }

    /// Select the node of the deepest tile at `(x, y)`.
    pub fn select_at(&self, tree: &mut DirTree, x: i32, y: i32) -> Option<NodeIndex> {
        let map = self.map.as_ref()?;
        let node = map.tile(map.tile_at(x, y)?).node;
        tree.select(Some(node));
        Some(node)
    }

    /// Move the selection to the parent tile of the current item's tile.
    /// An item too small to have a tile of its own moves to the nearest
    /// ancestor that has one.
    pub fn select_parent(&self, tree: &mut DirTree) -> Option<NodeIndex> {
        let map = self.map.as_ref()?;
        let current = tree.current_item()?;
        let parent = match map.tile_for_node(current) {
            Some(tile) => map.tile(map.tile(tile).parent?).node,
            None => {
                let mut node = tree.parent(current)?;
                while map.tile_for_node(node).is_none() {
                    node = tree.parent(node)?;
                }
                node
            }
        };
        tree.select(Some(parent));
        Some(parent)
    }
}
