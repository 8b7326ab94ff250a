/// File type categorisation based on file extensions.
///
/// Groups files into broad categories and computes size/count totals per
/// category. The treemap colours leaf tiles by the same categories.
use crate::model::DirTree;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    Documents,
    Images,
    Video,
    Audio,
    Archives,
    Code,
    Executables,
    System,
    Other,
}

impl FileCategory {
    pub const ALL: [FileCategory; 9] = [
        Self::Documents,
        Self::Images,
        Self::Video,
        Self::Audio,
        Self::Archives,
        Self::Code,
        Self::Executables,
        Self::System,
        Self::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Documents => "Documents",
            Self::Images => "Images",
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Archives => "Archives",
            Self::Code => "Code",
            Self::Executables => "Executables",
            Self::System => "System",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub category: FileCategory,
    pub total_size: u64,
    pub file_count: u64,
}

/// Extension of a file name without the dot. Hidden files like `.bashrc`
/// and names without a dot have none.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => "",
        Some(pos) => &name[pos + 1..],
    }
}

/// Categorise a file extension. Matching is case-insensitive; anything
/// longer than 16 bytes is `Other`.
pub fn categorise_extension(ext: &str) -> FileCategory {
    let bytes = ext.as_bytes();
    if bytes.len() > 16 {
        return FileCategory::Other;
    }

    let mut lower = [0u8; 16];
    for (dest, &src) in lower.iter_mut().zip(bytes.iter()) {
        *dest = src.to_ascii_lowercase();
    }
    let Ok(lower) = std::str::from_utf8(&lower[..bytes.len()]) else {
        return FileCategory::Other;
    };

    match lower {
        "doc" | "docx" | "pdf" | "txt" | "rtf" | "odt" | "ods" | "xls" | "xlsx" | "ppt"
        | "pptx" | "csv" | "md" | "epub" | "tex" => FileCategory::Documents,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" | "ico" | "tiff" | "tif"
        | "psd" | "xcf" | "raw" | "cr2" | "nef" | "heic" | "heif" => FileCategory::Images,
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" | "m4v" | "mpg" | "mpeg" | "3gp" => {
            FileCategory::Video
        }
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "wma" | "m4a" | "opus" => FileCategory::Audio,
        "zip" | "rar" | "7z" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "zst" | "iso" | "deb"
        | "rpm" | "dmg" => FileCategory::Archives,
        "rs" | "py" | "js" | "ts" | "jsx" | "tsx" | "c" | "cc" | "cpp" | "h" | "hpp" | "cs"
        | "java" | "go" | "rb" | "php" | "swift" | "kt" | "scala" | "html" | "css" | "scss"
        | "json" | "xml" | "yaml" | "yml" | "toml" | "sql" | "sh" | "pl" | "lua" => {
            FileCategory::Code
        }
        "exe" | "msi" | "dll" | "so" | "dylib" | "a" | "o" | "bin" | "app" | "jar" => {
            FileCategory::Executables
        }
        "sys" | "log" | "dat" | "tmp" | "bak" | "swp" | "lock" | "pid" | "db" | "cache" => {
            FileCategory::System
        }
        _ => FileCategory::Other,
    }
}

/// Per-category size and count totals for the whole tree, largest first.
pub fn analyse_file_types(tree: &DirTree) -> Vec<CategoryStats> {
    let mut map: HashMap<FileCategory, CategoryStats> = HashMap::with_capacity(9);

    for (_, node) in tree.iter() {
        if node.is_dir() {
            continue;
        }
        let category = categorise_extension(extension_of(&node.name));
        let entry = map.entry(category).or_insert(CategoryStats {
            category,
            total_size: 0,
            file_count: 0,
        });
        entry.total_size += node.size();
        entry.file_count += 1;
    }

    let mut results: Vec<CategoryStats> = map.into_values().collect();
    results.sort_by(|a, b| b.total_size.cmp(&a.total_size));
    results
}
