/// Human-readable size formatting, plus the compact size tokens used in
/// cache files.

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Format a byte count as a short human-readable string.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else if b < TB {
        format!("{:.2} GB", b / GB)
    } else {
        format!("{:.2} TB", b / TB)
    }
}

/// Format a count with thousand separators.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Size token for a cache line. A `G`/`M`/`K` suffix is used only when it
/// represents the value exactly.
pub fn format_size_token(bytes: u64) -> String {
    if bytes == 0 {
        return "0".to_string();
    }
    for (unit, suffix) in [(GIB, 'G'), (MIB, 'M'), (KIB, 'K')] {
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{suffix}", bytes / unit);
        }
    }
    bytes.to_string()
}

/// Parse a cache size token. Suffixes are case-insensitive and 1024-based.
pub fn parse_size_token(token: &str) -> Option<u64> {
    let token = token.trim();
    let (digits, multiplier) = match token.chars().last()? {
        'K' | 'k' => (&token[..token.len() - 1], KIB),
        'M' | 'm' => (&token[..token.len() - 1], MIB),
        'G' | 'g' => (&token[..token.len() - 1], GIB),
        _ => (token, 1),
    };
    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}
