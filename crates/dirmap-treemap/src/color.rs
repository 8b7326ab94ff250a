/// Tile colours.
///
/// File tiles take their hue from the extension's [`FileCategory`], so a
/// treemap and a file-type breakdown agree on what "blue" means.
use dirmap_core::analysis::{categorise_extension, extension_of, FileCategory};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Scale every channel by `factor`, clamped to the valid range.
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |c: u8| (c as f64 * factor).round().clamp(0.0, 255.0) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }

    /// Darken by scaling towards black.
    pub fn darken(self, amount: f64) -> Self {
        self.scaled(1.0 - amount.clamp(0.0, 1.0))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("invalid colour {value:?}, expected #rrggbb"))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// Fill for directory tiles.
pub const DEFAULT_DIR_FILL: Rgb = Rgb::new(0x8f, 0xbc, 0xbc);

/// Base colour per file category.
pub fn category_color(category: FileCategory) -> Rgb {
    match category {
        FileCategory::Documents => Rgb::new(0x89, 0xb4, 0xfa), // blue
        FileCategory::Images => Rgb::new(0xa6, 0xe3, 0xa1),    // green
        FileCategory::Video => Rgb::new(0xf3, 0x8b, 0xa8),     // pink
        FileCategory::Audio => Rgb::new(0xcb, 0xa6, 0xf7),     // mauve
        FileCategory::Archives => Rgb::new(0xf9, 0xe2, 0xaf),  // yellow
        FileCategory::Code => Rgb::new(0x94, 0xe2, 0xd5),      // teal
        FileCategory::Executables => Rgb::new(0xfa, 0xb3, 0x87), // peach
        FileCategory::System => Rgb::new(0x74, 0xc7, 0xec),    // sapphire
        FileCategory::Other => Rgb::new(0xb4, 0xbe, 0xfe),     // lavender
    }
}

/// Base colour for a file tile, picked by its name's extension.
pub fn color_for_name(name: &str) -> Rgb {
    category_color(categorise_extension(extension_of(name)))
}
