/// Treemap layout.
///
/// A [`Treemap`] is a tree of tiles built from one node of a [`DirTree`].
/// Every directory tile is cut into one tile per child (the dot-entry
/// counts as a child) in proportion to the children's total sizes, either
/// with alternating slices or with squarified rows (Bruls, Huizing,
/// van Wijk). The leaves always tile the root rectangle exactly: offsets
/// are rounded cumulatively and each level distributes its whole area over
/// its children.
use crate::color::{color_for_name, Rgb};
use crate::cushion::CushionSurface;
use crate::rect::{proportional_lengths, Orientation, Rect};
use crate::settings::TreemapSettings;
use dirmap_core::model::{DirTree, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Position of a tile in [`Treemap::tiles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileIndex(usize);

impl TileIndex {
    #[inline]
    pub fn idx(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct TreemapTile {
    pub node: NodeIndex,
    pub rect: Rect,
    pub parent: Option<TileIndex>,
    pub children: Vec<TileIndex>,
    pub depth: usize,
    pub is_dir: bool,
    /// Direction the tile's children were sliced in (slice-and-dice only).
    pub orientation: Orientation,
    /// Shaded with the cushion when rendered; directories and tiles cut
    /// short by the minimum size are flat.
    pub shaded: bool,
    pub color: Rgb,
    pub cushion: CushionSurface,
}

impl TreemapTile {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A laid-out treemap. Tile 0 is the root.
#[derive(Debug, Clone)]
pub struct Treemap {
    tiles: Vec<TreemapTile>,
    by_node: HashMap<NodeIndex, TileIndex>,
    root_node: NodeIndex,
    bounds: Rect,
    settings: TreemapSettings,
}

impl Treemap {
    /// Lay out the subtree below `root` inside `bounds`.
    ///
    /// Returns `None` if `root` is not in the tree.
    pub fn build(tree: &DirTree, root: NodeIndex, bounds: Rect, settings: &TreemapSettings) -> Option<Self> {
        let node = tree.get(root)?;
        let mut cushion = CushionSurface::new(settings.cushion_height);
        cushion.add_ridges(bounds);

        let mut map = Self {
            tiles: Vec::new(),
            by_node: HashMap::new(),
            root_node: root,
            bounds,
            settings: settings.clone(),
        };
        let is_dir = node.is_dir();
        let root_tile = map.push(TreemapTile {
            node: root,
            rect: bounds,
            parent: None,
            children: Vec::new(),
            depth: 0,
            is_dir,
            orientation: Orientation::for_rect(bounds),
            shaded: false,
            color: if is_dir { settings.dir_fill } else { color_for_name(&node.name) },
            cushion,
        });
        map.lay_out(tree, root_tile);

        debug!(
            "Treemap of {} in {}x{}: {} tiles",
            tree.full_path(root),
            bounds.width,
            bounds.height,
            map.tiles.len()
        );
        Some(map)
    }

    pub fn tiles(&self) -> &[TreemapTile] {
        &self.tiles
    }

    pub fn tile(&self, index: TileIndex) -> &TreemapTile {
        &self.tiles[index.0]
    }

    pub fn root_tile(&self) -> TileIndex {
        TileIndex(0)
    }

    /// The node the map was built from.
    pub fn root_node(&self) -> NodeIndex {
        self.root_node
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn settings(&self) -> &TreemapSettings {
        &self.settings
    }

    /// Tile showing `node`, if it got one.
    pub fn tile_for_node(&self, node: NodeIndex) -> Option<TileIndex> {
        self.by_node.get(&node).copied()
    }

    /// Deepest tile containing the pixel `(x, y)`.
    pub fn tile_at(&self, x: i32, y: i32) -> Option<TileIndex> {
        let root = self.root_tile();
        if !self.tile(root).rect.contains(x, y) {
            return None;
        }
        let mut current = root;
        'descend: loop {
            for &child in &self.tile(current).children {
                if self.tile(child).rect.contains(x, y) {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &TreemapTile> + '_ {
        self.tiles.iter().filter(|t| t.is_leaf())
    }

    fn push(&mut self, tile: TreemapTile) -> TileIndex {
        let index = TileIndex(self.tiles.len());
        self.by_node.insert(tile.node, index);
        if let Some(parent) = tile.parent {
            self.tiles[parent.0].children.push(index);
        }
        self.tiles.push(tile);
        index
    }

    // ── Subdivision ────────────────────────────────────────────────

    fn lay_out(&mut self, tree: &DirTree, root: TileIndex) {
        let mut pending = vec![root];
        while let Some(index) = pending.pop() {
            let tile = &self.tiles[index.0];
            let min = self.settings.min_tile_size;
            let tiny = tile.rect.is_empty() || tile.rect.width < min || tile.rect.height < min;
            if !tile.is_dir {
                self.tiles[index.0].shaded = self.settings.cushion_shading && !tiny;
                continue;
            }
            if tiny {
                continue;
            }

            let sized: Vec<(NodeIndex, u64)> = tree
                .children_sorted_by_size(tile.node)
                .into_iter()
                .map(|child| (child, tree.total_size(child)))
                .filter(|&(_, size)| size > 0)
                .collect();
            // A child whose share of the tile is under one pixel of area is
            // left out in both modes; the others fill the tile between them.
            let total: u128 = sized.iter().map(|&(_, size)| u128::from(size)).sum();
            let pixels = tile.rect.area() as u128;
            let items: Vec<(NodeIndex, u64)> = sized
                .into_iter()
                .filter(|&(_, size)| u128::from(size) * pixels >= total)
                .collect();
            if items.is_empty() {
                continue;
            }

            let placed = if self.settings.squarify {
                squarify(&items, tile.rect)
            } else {
                let orientation = tile.orientation;
                let weights: Vec<u64> = items.iter().map(|&(_, size)| size).collect();
                items
                    .iter()
                    .zip(tile.rect.split(orientation, &weights))
                    .map(|(&(node, _), rect)| (node, rect))
                    .collect()
            };

            for (node, rect) in placed {
                if rect.is_empty() {
                    continue;
                }
                let child = self.child_tile(tree, index, node, rect);
                let child = self.push(child);
                pending.push(child);
            }
        }
    }

    fn child_tile(&self, tree: &DirTree, parent: TileIndex, node: NodeIndex, rect: Rect) -> TreemapTile {
        let parent_tile = &self.tiles[parent.0];
        let mut cushion = parent_tile.cushion.child(self.settings.height_scale_factor);
        if self.settings.squarify {
            cushion.add_ridges(rect);
        } else {
            let along = parent_tile.orientation;
            let (start, end) = match along {
                Orientation::Horizontal => (rect.x, rect.right()),
                Orientation::Vertical => (rect.y, rect.bottom()),
            };
            cushion.add_ridge(along, start as f64, end as f64);
        }

        let file = tree.node(node);
        let is_dir = file.is_dir();
        TreemapTile {
            node,
            rect,
            parent: Some(parent),
            children: Vec::new(),
            depth: parent_tile.depth + 1,
            is_dir,
            orientation: parent_tile.orientation.flipped(),
            shaded: false,
            color: if is_dir {
                self.settings.dir_fill
            } else {
                color_for_name(&file.name)
            },
            cushion,
        }
    }
}

// ── Squarified rows ────────────────────────────────────────────────

/// Place `items` (sorted by size, largest first) in `bounds` as
/// squarified rows. Each row runs along the shorter side of what is left;
/// a row keeps taking items while that does not worsen its worst aspect
/// ratio.
fn squarify(items: &[(NodeIndex, u64)], bounds: Rect) -> Vec<(NodeIndex, Rect)> {
    let mut placed = Vec::with_capacity(items.len());
    let mut remaining = bounds;
    let mut remaining_total: u64 = items.iter().map(|&(_, size)| size).sum();
    let mut idx = 0;

    while idx < items.len() {
        if remaining.is_empty() || remaining_total == 0 {
            // Nothing left to give; the rest get no space.
            placed.extend(items[idx..].iter().map(|&(node, _)| (node, Rect::default())));
            break;
        }

        // A wide remainder gets a column on its left, a tall one a row on top.
        let row_across = Orientation::for_rect(remaining);
        let side = f64::from(remaining.length(row_across.flipped()));
        let scale = remaining.area() as f64 / remaining_total as f64;

        let start = idx;
        let mut row_total = items[idx].1;
        let mut best_worst = worst_ratio(&[row_total as f64 * scale], side, row_total as f64 * scale);
        idx += 1;
        while idx < items.len() {
            let new_total = row_total + items[idx].1;
            let trial: Vec<f64> = items[start..=idx].iter().map(|&(_, s)| s as f64 * scale).collect();
            let ratio = worst_ratio(&trial, side, new_total as f64 * scale);
            if ratio <= best_worst {
                row_total = new_total;
                best_worst = ratio;
                idx += 1;
            } else {
                break;
            }
        }

        // Row thickness, exact for the last row.
        let thickness = if idx == items.len() {
            remaining.length(row_across)
        } else {
            proportional_lengths(remaining.length(row_across), &[row_total, remaining_total - row_total])[0]
        };
        let (row_rect, rest) = remaining.take(row_across, thickness);

        let weights: Vec<u64> = items[start..idx].iter().map(|&(_, size)| size).collect();
        let cells = row_rect.split(row_across.flipped(), &weights);
        placed.extend(items[start..idx].iter().map(|&(node, _)| node).zip(cells));

        remaining = rest;
        remaining_total -= row_total;
    }
    placed
}

/// Worst aspect ratio of `areas` laid out as one row of breadth `side`.
fn worst_ratio(areas: &[f64], side: f64, total: f64) -> f64 {
    if side <= 0.0 || total <= 0.0 {
        return f64::MAX;
    }

    let thickness = total / side;
    let mut worst = 0.0_f64;
    for &area in areas {
        let length = area / thickness;
        let ratio = if length > thickness {
            length / thickness
        } else if length > 0.0 {
            thickness / length
        } else {
            f64::MAX
        };
        worst = worst.max(ratio);
    }
    worst
}
