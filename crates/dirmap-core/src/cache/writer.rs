/// Cache file writing.
use super::{format_line, CACHE_HEADER};
use crate::error::{CoreError, Result};
use crate::model::{DirTree, NodeIndex};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const ZSTD_LEVEL: i32 = 3;

/// Write `subtree` (a directory) to a compressed cache file.
///
/// Each directory line is followed by its plain files (dot-entry content
/// included), then its subdirectories in the same form.
pub fn write_cache(tree: &DirTree, subtree: NodeIndex, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let node = tree.get(subtree).ok_or(CoreError::EmptyTree)?;
    if !node.is_dir() || node.is_dot_entry() {
        return Err(CoreError::NotADirectory(tree.full_path(subtree)));
    }

    let file = File::create(path)?;
    let mut out = zstd::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)?;

    writeln!(out, "{CACHE_HEADER}")?;
    writeln!(
        out,
        "# Generated by dirmap {} at {}",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S %:z")
    )?;
    writeln!(out, "# Do not edit!")?;
    writeln!(out, "#")?;
    writeln!(out, "# Type\tpath\tsize\tmtime\t<optional fields>")?;
    writeln!(out)?;

    let mut lines: u64 = 0;
    let mut stack = vec![subtree];
    while let Some(dir) = stack.pop() {
        writeln!(out, "{}", format_line(&tree.full_path(dir), &tree.node(dir).stat()))?;
        lines += 1;

        let mut subdirs = Vec::new();
        let entries = tree.children(dir).chain(
            tree.dot_entry(dir)
                .into_iter()
                .flat_map(|dot| tree.children(dot)),
        );
        for child in entries {
            let node = tree.node(child);
            if node.is_dir() {
                subdirs.push(child);
            } else {
                writeln!(out, "{}", format_line(&node.name, &node.stat()))?;
                lines += 1;
            }
        }
        stack.extend(subdirs.into_iter().rev());
    }

    let mut inner = out.finish()?;
    inner.flush()?;
    info!("Wrote {lines} entries to cache {}", path.display());
    Ok(())
}
