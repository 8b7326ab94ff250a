/// Cache files: a zstd-compressed, line-oriented dump of a scanned subtree.
///
/// ```text
/// [dirmap 1.0 cache file]
/// # Generated by dirmap 0.1.0 at 2024-05-01 12:00:00 +02:00
/// D	/home/me	4K	0x6630a1b2
/// F	notes.txt	1234	0x6630a1b0
/// L	current	7	0x6630a1b1
/// D	/home/me/src	4K	0x6630a1b3	blocks: 8
/// F	main.rs	12K	0x6630a1b4	links: 2
/// ```
///
/// Directory lines carry the full path; every other line carries a name
/// relative to the directory line above it. Names and paths are
/// percent-encoded so whitespace never appears inside a field.
pub mod reader;
pub mod writer;

pub use reader::{CacheReadJob, CacheReader};
pub use writer::write_cache;

use crate::model::{EntryStat, FileType, BLOCK_SIZE};
use crate::model::size::{format_size_token, parse_size_token};

/// First line of every cache file.
pub const CACHE_HEADER: &str = "[dirmap 1.0 cache file]";

/// A file with this name inside a scanned directory is offered as a
/// replacement for scanning that directory.
pub const CACHE_FILE_NAME: &str = ".dirmap.cache.zst";

/// Data lines replayed per scheduler tick.
pub const LINES_PER_TICK: usize = 1000;

/// One parsed data line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLine {
    /// Decoded full path (directories) or name (everything else).
    pub name: String,
    pub stat: EntryStat,
}

impl CacheLine {
    pub fn is_dir(&self) -> bool {
        self.stat.file_type == FileType::Directory
    }
}

pub(crate) fn type_token(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Regular => "F",
        FileType::Directory => "D",
        FileType::Symlink => "L",
        FileType::BlockDevice => "BlockDev",
        FileType::CharDevice => "CharDev",
        FileType::Special => "FIFO",
    }
}

fn parse_type_token(token: &str) -> Option<FileType> {
    Some(match token {
        "F" => FileType::Regular,
        "D" => FileType::Directory,
        "L" => FileType::Symlink,
        "BlockDev" => FileType::BlockDevice,
        "CharDev" => FileType::CharDevice,
        "FIFO" | "Socket" => FileType::Special,
        _ => return None,
    })
}

/// Percent-encode `%`, whitespace and control characters.
pub fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch == '%' || ch.is_whitespace() || ch.is_control() {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Reverse of [`encode_name`]. `None` for truncated escapes or invalid UTF-8.
pub fn decode_name(encoded: &str) -> Option<String> {
    if !encoded.contains('%') {
        return Some(encoded.to_string());
    }
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Parse a data line. Comment and blank lines must be filtered out before.
pub fn parse_line(line: &str) -> Option<CacheLine> {
    let mut fields = line.split_whitespace();
    let file_type = parse_type_token(fields.next()?)?;
    let name = decode_name(fields.next()?)?;
    if name.is_empty() {
        return None;
    }
    let byte_size = parse_size_token(fields.next()?)?;
    let mtime = parse_mtime_token(fields.next()?)?;

    let mut stat = EntryStat {
        byte_size,
        blocks: byte_size.div_ceil(BLOCK_SIZE),
        links: 1,
        mtime,
        device: 0,
        file_type,
    };

    while let Some(key) = fields.next() {
        let value: u64 = fields.next()?.parse().ok()?;
        match key {
            "blocks:" => stat.blocks = value,
            "links:" => stat.links = value.max(1),
            _ => {}
        }
    }

    Some(CacheLine { name, stat })
}

/// `0x1f`, `-0x1f` or plain decimal seconds.
fn parse_mtime_token(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let Some(hex) = digits.strip_prefix("0x") else {
        return token.parse().ok();
    };
    if hex.starts_with(['+', '-']) {
        return None;
    }
    let value = u64::from_str_radix(hex, 16).ok()?;
    if negative {
        0_i64.checked_sub_unsigned(value)
    } else {
        i64::try_from(value).ok()
    }
}

/// Format a data line (without the trailing newline).
pub fn format_line(name: &str, stat: &EntryStat) -> String {
    let mut line = format!(
        "{}\t{}\t{}\t{}0x{:x}",
        type_token(stat.file_type),
        encode_name(name),
        format_size_token(stat.byte_size),
        if stat.mtime < 0 { "-" } else { "" },
        stat.mtime.unsigned_abs()
    );
    if stat.blocks != stat.byte_size.div_ceil(BLOCK_SIZE) {
        line.push_str(&format!("\tblocks: {}", stat.blocks));
    }
    if stat.links > 1 {
        line.push_str(&format!("\tlinks: {}", stat.links));
    }
    line
}

/// `true` for lines the reader skips without parsing.
pub(crate) fn is_ignorable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}
