/// Layout properties over generated trees, and view navigation over a
/// real scanned directory.
use dirmap_core::model::{DirTree, EntryStat, FileNode, FileType, NodeIndex};
use dirmap_core::scanner::{ScanSettings, Scanner};
use dirmap_treemap::{Rect, Treemap, TreemapSettings, TreemapView};
use std::fs;
use std::io::Write;
use tempfile::TempDir;

// ── Helpers ────────────────────────────────────────────────────────────

/// Deterministic xorshift64 so failures reproduce.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn range(&mut self, lo: u64, hi: u64) -> u64 {
        lo + self.next() % (hi - lo + 1)
    }
}

const SEEDS: [u64; 8] = [1, 7, 42, 1337, 0xdead_beef, 99_991, 31_337, 2_024];

fn file_stat(size: u64) -> EntryStat {
    EntryStat {
        byte_size: size,
        links: 1,
        file_type: FileType::Regular,
        ..EntryStat::default()
    }
}

/// A random tree up to `depth` levels deep. Some files are empty and some
/// directories end up empty, so zero-size skipping is exercised too.
fn random_tree(rng: &mut XorShift, depth: u32) -> (DirTree, NodeIndex) {
    fn fill(tree: &mut DirTree, rng: &mut XorShift, dir: NodeIndex, depth: u32) {
        for i in 0..rng.range(0, 6) {
            let size = if rng.range(0, 9) == 0 { 0 } else { rng.range(1, 50_000) };
            tree.insert_child(dir, FileNode::new_file(format!("f{i}.dat"), file_stat(size)));
        }
        if depth > 0 {
            for i in 0..rng.range(0, 3) {
                let sub = tree.insert_child(dir, FileNode::new_dir(format!("d{i}"), EntryStat::directory()));
                fill(tree, rng, sub, depth - 1);
            }
        }
        tree.finalize_local(dir);
    }

    let mut tree = DirTree::new();
    let root = tree.set_root(FileNode::new_dir("/gen", EntryStat::directory()));
    fill(&mut tree, rng, root, depth);
    (tree, root)
}

/// One directory holding `n` files whose sizes span six orders of
/// magnitude, so plenty of them round down to nothing.
fn flat_tree(rng: &mut XorShift, n: u64) -> (DirTree, NodeIndex) {
    let mut tree = DirTree::new();
    let root = tree.set_root(FileNode::new_dir("/flat", EntryStat::directory()));
    for i in 0..n {
        let size = 1u64 << rng.range(0, 20);
        tree.insert_child(root, FileNode::new_file(format!("f{i}"), file_stat(size)));
    }
    tree.finalize_local(root);
    (tree, root)
}

fn settings(squarify: bool) -> TreemapSettings {
    TreemapSettings {
        squarify,
        min_tile_size: 0,
        ..TreemapSettings::default()
    }
}

fn assert_exact_tiling(map: &Treemap, bounds: Rect) {
    let leaves: Vec<Rect> = map.leaves().map(|t| t.rect).collect();
    let area: i64 = leaves.iter().map(Rect::area).sum();
    assert_eq!(area, bounds.area(), "leaf area must equal the bounds");
    for (i, a) in leaves.iter().enumerate() {
        assert!(!a.is_empty());
        assert!(a.x >= bounds.x && a.y >= bounds.y);
        assert!(a.right() <= bounds.right() && a.bottom() <= bounds.bottom());
        for b in &leaves[i + 1..] {
            assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
        }
    }
}

// ── Properties ─────────────────────────────────────────────────────────

#[test]
fn leaves_tile_the_rectangle_exactly() {
    let bounds = Rect::new(3, 7, 317, 211);
    for seed in SEEDS {
        let mut rng = XorShift(seed);
        let (tree, root) = random_tree(&mut rng, 3);
        if tree.total_size(root) == 0 {
            continue;
        }
        for squarify in [false, true] {
            let map = Treemap::build(&tree, root, bounds, &settings(squarify)).unwrap();
            assert_exact_tiling(&map, bounds);
        }
    }
}

/// Aspect ratio of `node`'s tile in both maps, when both drew it.
fn drawn_in_both(a: &Treemap, b: &Treemap, node: NodeIndex) -> Option<(f64, f64)> {
    let ta = a.tile(a.tile_for_node(node)?);
    let tb = b.tile(b.tile_for_node(node)?);
    Some((ta.rect.aspect_ratio(), tb.rect.aspect_ratio()))
}

#[test]
fn squarified_tiles_are_no_worse_than_slices() {
    let bounds = Rect::new(0, 0, 800, 600);
    for seed in SEEDS {
        let mut rng = XorShift(seed);
        for _ in 0..25 {
            let n = rng.range(2, 40);
            let (tree, root) = flat_tree(&mut rng, n);

            let sliced = Treemap::build(&tree, root, bounds, &settings(false)).unwrap();
            let squarified = Treemap::build(&tree, root, bounds, &settings(true)).unwrap();
            assert_exact_tiling(&sliced, bounds);
            assert_exact_tiling(&squarified, bounds);

            // Slicing drops some small files outright; judge both on the rest.
            let (worst_squarified, worst_sliced) = tree
                .children(root)
                .filter_map(|node| drawn_in_both(&squarified, &sliced, node))
                .fold((1.0_f64, 1.0_f64), |(q, s), (a, b)| (q.max(a), s.max(b)));
            assert!(
                worst_squarified <= worst_sliced,
                "seed {seed}, {n} files: squarified {worst_squarified} vs sliced {worst_sliced}"
            );
        }
    }
}

#[test]
fn sub_pixel_files_are_dropped_in_both_modes() {
    let mut tree = DirTree::new();
    let root = tree.set_root(FileNode::new_dir("/s", EntryStat::directory()));
    let big = tree.insert_child(root, FileNode::new_file("big", file_stat(1_000_000)));
    let crumb = tree.insert_child(root, FileNode::new_file("crumb", file_stat(1)));
    tree.finalize_local(root);

    let bounds = Rect::new(0, 0, 64, 48);
    for squarify in [false, true] {
        let map = Treemap::build(&tree, root, bounds, &settings(squarify)).unwrap();
        assert!(map.tile_for_node(crumb).is_none(), "squarify {squarify}");
        assert_eq!(map.tile(map.tile_for_node(big).unwrap()).rect, bounds);
    }
}

#[test]
fn zero_size_children_get_no_tile() {
    let mut tree = DirTree::new();
    let root = tree.set_root(FileNode::new_dir("/z", EntryStat::directory()));
    let empty = tree.insert_child(root, FileNode::new_file("empty", file_stat(0)));
    let full = tree.insert_child(root, FileNode::new_file("full", file_stat(10)));
    tree.finalize_local(root);

    for squarify in [false, true] {
        let map = Treemap::build(&tree, root, Rect::new(0, 0, 50, 50), &settings(squarify)).unwrap();
        assert!(map.tile_for_node(empty).is_none());
        let tile = map.tile(map.tile_for_node(full).unwrap());
        assert_eq!(tile.rect, Rect::new(0, 0, 50, 50));
    }
}

// ── View navigation ────────────────────────────────────────────────────

fn write_file(path: &std::path::Path, n: usize) {
    fs::File::create(path).unwrap().write_all(&vec![1u8; n]).unwrap();
}

/// `root/{a/{x/deep.bin, top.bin}, b.txt}`
fn scanned() -> (TempDir, Scanner) {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("a/x")).unwrap();
    write_file(&tmp.path().join("a/x/deep.bin"), 30_000);
    write_file(&tmp.path().join("a/top.bin"), 20_000);
    write_file(&tmp.path().join("b.txt"), 10_000);

    let mut scanner = Scanner::new(ScanSettings::default()).unwrap();
    scanner.start_reading(tmp.path().to_str().unwrap()).unwrap();
    scanner.run_to_completion();
    (tmp, scanner)
}

#[test]
fn zoom_in_and_out_follow_the_selection() {
    let (tmp, mut scanner) = scanned();
    let base = tmp.path().to_str().unwrap().to_string();
    let mut view = TreemapView::new(TreemapSettings::default(), Rect::new(0, 0, 400, 300));
    assert!(view.rebuild_if_stale(scanner.tree()));
    assert!(!view.rebuild_if_stale(scanner.tree()));

    let tree = scanner.tree_mut();
    let root = tree.root().unwrap();
    let a = tree.locate(&format!("{base}/a"), false).unwrap();
    let x = tree.locate(&format!("{base}/a/x"), false).unwrap();
    let deep = tree.locate(&format!("{base}/a/x/deep.bin"), true).unwrap();

    // Selecting a deep file zooms one level at a time.
    tree.select(Some(deep));
    assert!(view.zoom_in(tree));
    assert_eq!(view.current_root(tree), Some(a));
    assert_eq!(view.treemap().unwrap().root_node(), a);
    assert!(view.zoom_in(tree));
    assert_eq!(view.current_root(tree), Some(x));

    // The file itself is not a directory to zoom into.
    assert!(!view.zoom_in(tree));
    assert_eq!(view.current_root(tree), Some(x));

    assert!(view.zoom_out(tree));
    assert_eq!(view.current_root(tree), Some(a));
    assert!(view.zoom_out(tree));
    assert_eq!(view.current_root(tree), Some(root));
    assert!(!view.can_zoom_out(tree));
    assert!(!view.zoom_out(tree));
}

#[test]
fn select_parent_walks_up_the_tiles() {
    let (tmp, mut scanner) = scanned();
    let base = tmp.path().to_str().unwrap().to_string();
    let mut view = TreemapView::new(
        TreemapSettings {
            min_tile_size: 0,
            ..TreemapSettings::default()
        },
        Rect::new(0, 0, 400, 300),
    );
    view.rebuild(scanner.tree());

    let tree = scanner.tree_mut();
    let deep = tree.locate(&format!("{base}/a/x/deep.bin"), true).unwrap();
    let x = tree.locate(&format!("{base}/a/x"), false).unwrap();
    tree.select(Some(deep));
    assert_eq!(view.select_parent(tree), Some(x));
    assert_eq!(tree.current_item(), Some(x));

    // Hit testing lands on a leaf inside the map.
    let hit = view.select_at(tree, 1, 1).unwrap();
    assert!(!tree.node(hit).is_dir());
    assert_eq!(view.select_at(tree, 400, 0), None);
}

#[test]
fn deleting_the_root_subtree_falls_back_on_rebuild() {
    let (tmp, mut scanner) = scanned();
    let base = tmp.path().to_str().unwrap().to_string();
    let events = scanner.tree_mut().subscribe_channel();
    let mut view = TreemapView::new(TreemapSettings::default(), Rect::new(0, 0, 200, 100));

    let tree = scanner.tree_mut();
    let deep = tree.locate(&format!("{base}/a/x/deep.bin"), true).unwrap();
    tree.select(Some(deep));
    view.rebuild(tree);
    assert!(view.zoom_in(tree));
    let a = tree.locate(&format!("{base}/a"), false).unwrap();
    assert_eq!(view.current_root(tree), Some(a));

    tree.delete_subtree(a);
    for event in events.try_iter() {
        view.handle_event(&event);
    }
    assert!(view.is_stale());
    assert!(view.rebuild_if_stale(tree));
    assert_eq!(view.current_root(tree), tree.root());
    assert_eq!(view.treemap().unwrap().root_node(), tree.root().unwrap());
}
