use crate::color::{Rgb, DEFAULT_DIR_FILL};
use serde::Deserialize;

/// Layout and shading options, usually the `[treemap]` table of the
/// config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TreemapSettings {
    /// Squarified rows instead of alternating slices.
    pub squarify: bool,
    /// Tiles narrower or lower than this many pixels are not subdivided.
    pub min_tile_size: i32,
    pub cushion_shading: bool,
    /// Brightness floor for shaded pixels, 0-255.
    pub ambient_light: u8,
    /// Cushion height multiplier applied per nesting level.
    pub height_scale_factor: f64,
    /// Cushion height of the top level.
    pub cushion_height: f64,
    pub light_x: f64,
    pub light_y: f64,
    pub light_z: f64,
    pub dir_fill: Rgb,
}

impl Default for TreemapSettings {
    fn default() -> Self {
        Self {
            squarify: true,
            min_tile_size: 3,
            cushion_shading: true,
            ambient_light: 40,
            height_scale_factor: 0.9,
            cushion_height: 1.0,
            light_x: 0.09759,
            light_y: 0.19518,
            light_z: 0.97590,
            dir_fill: DEFAULT_DIR_FILL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: TreemapSettings =
            serde_json::from_str(r##"{ "squarify": false, "dir_fill": "#102030" }"##).unwrap();
        assert!(!settings.squarify);
        assert_eq!(settings.dir_fill, Rgb::new(0x10, 0x20, 0x30));
        assert_eq!(settings.min_tile_size, 3);
        assert_eq!(settings.ambient_light, 40);
    }

    #[test]
    fn bad_colour_is_rejected() {
        let result: Result<TreemapSettings, _> = serde_json::from_str(r#"{ "dir_fill": "teal" }"#);
        assert!(result.is_err());
    }
}
