//! Plain-text and JSON output for the CLI.

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use dirmap_core::analysis::{analyse_file_types, top_files};
use dirmap_core::model::size::{format_count, format_size};
use dirmap_core::model::{DirTree, NodeIndex, ReadState};
use dirmap_treemap::{Rect, Treemap};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn format_mtime(mtime: i64) -> String {
    match Local.timestamp_opt(mtime, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// Totals of the subtree below `node`.
pub fn write_summary(out: &mut impl Write, tree: &DirTree, node: NodeIndex) -> std::io::Result<()> {
    writeln!(out, "{}", tree.full_path(node))?;
    writeln!(out, "  Total size:   {}", format_size(tree.total_size(node)))?;
    writeln!(out, "  Allocated:    {}", format_size(tree.total_blocks(node) * dirmap_core::model::BLOCK_SIZE))?;
    writeln!(out, "  Items:        {}", format_count(tree.total_items(node)))?;
    writeln!(out, "  Files:        {}", format_count(tree.total_files(node)))?;
    writeln!(out, "  Directories:  {}", format_count(tree.total_subdirs(node)))?;
    writeln!(out, "  Last changed: {}", format_mtime(tree.latest_mtime(node)))?;

    let (mut errors, mut aborted, mut excluded) = (0u64, 0u64, 0u64);
    for (idx, file) in tree.iter() {
        let Some(dir) = file.dir() else { continue };
        if file.is_dot_entry() || !tree.is_in_subtree(idx, node) {
            continue;
        }
        match tree.read_state(idx) {
            ReadState::Error => errors += 1,
            ReadState::Aborted => aborted += 1,
            ReadState::OnRequestOnly if dir.is_excluded => excluded += 1,
            _ => {}
        }
    }
    if errors + aborted + excluded > 0 {
        writeln!(
            out,
            "  Not read:     {errors} unreadable, {aborted} aborted, {excluded} excluded"
        )?;
    }
    Ok(())
}

pub fn write_top_files(out: &mut impl Write, tree: &DirTree, node: NodeIndex, n: usize) -> std::io::Result<()> {
    let files = top_files(tree, node, n);
    if files.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "Largest files:")?;
    for file in files {
        writeln!(out, "  {:>10}  {}", format_size(file.size), file.path)?;
    }
    Ok(())
}

pub fn write_file_types(out: &mut impl Write, tree: &DirTree) -> std::io::Result<()> {
    let stats = analyse_file_types(tree);
    if stats.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "By file type:")?;
    for stat in stats {
        writeln!(
            out,
            "  {:<12} {:>10}  {:>8} files",
            stat.category.label(),
            format_size(stat.total_size),
            format_count(stat.file_count)
        )?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct TileRecord {
    path: String,
    #[serde(flatten)]
    rect: Rect,
    depth: usize,
    is_dir: bool,
    size: u64,
    color: String,
}

/// Every tile of `map` as a JSON array.
pub fn write_tiles_json(path: &Path, tree: &DirTree, map: &Treemap) -> Result<()> {
    let records: Vec<TileRecord> = map
        .tiles()
        .iter()
        .map(|tile| TileRecord {
            path: tree.full_path(tile.node),
            rect: tile.rect,
            depth: tile.depth,
            is_dir: tile.is_dir,
            size: tree.total_size(tile.node),
            color: tile.color.to_string(),
        })
        .collect();

    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &records)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirmap_core::model::{EntryStat, FileNode, FileType};
    use dirmap_treemap::TreemapSettings;
    use tempfile::TempDir;

    fn tree() -> (DirTree, NodeIndex) {
        let mut tree = DirTree::new();
        let root = tree.set_root(FileNode::new_dir("/r", EntryStat::directory()));
        for (name, size) in [("a.mp4", 3000u64), ("b.rs", 1000)] {
            let stat = EntryStat {
                byte_size: size,
                links: 1,
                file_type: FileType::Regular,
                ..EntryStat::default()
            };
            tree.insert_child(root, FileNode::new_file(name, stat));
        }
        tree.finalize_local(root);
        (tree, root)
    }

    #[test]
    fn summary_lists_totals_and_largest_files() {
        let (tree, root) = tree();
        let mut out = Vec::new();
        write_summary(&mut out, &tree, root).unwrap();
        write_top_files(&mut out, &tree, root, 1).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("/r\n"));
        assert!(text.contains("Files:        2"));
        assert!(text.contains("/r/a.mp4"));
        assert!(!text.contains("/r/b.rs"));
        assert!(!text.contains("Not read"));
    }

    #[test]
    fn tiles_are_written_as_json() {
        let (tree, root) = tree();
        let map = Treemap::build(&tree, root, Rect::new(0, 0, 40, 10), &TreemapSettings::default()).unwrap();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiles.json");
        write_tiles_json(&path, &tree, &map).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let tiles = value.as_array().unwrap();
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[0]["path"], "/r");
        assert_eq!(tiles[0]["width"], 40);
        assert_eq!(tiles[1]["path"], "/r/a.mp4");
        assert_eq!(tiles[1]["width"], 30);
        assert!(tiles[1]["color"].as_str().unwrap().starts_with('#'));
    }
}
