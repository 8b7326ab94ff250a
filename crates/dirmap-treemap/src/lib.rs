/// dirmap treemap: squarified and slice-and-dice layouts with cushion
/// shading, computed from a `dirmap-core` tree.
///
/// The crate has no windowing dependency. A host either reads the tile
/// rectangles directly or renders a [`Pixmap`].
pub mod color;
pub mod cushion;
pub mod layout;
pub mod rect;
pub mod render;
pub mod settings;
pub mod view;

pub use color::Rgb;
pub use cushion::{CushionSurface, Light};
pub use layout::{TileIndex, Treemap, TreemapTile};
pub use rect::{Orientation, Rect};
pub use render::Pixmap;
pub use settings::TreemapSettings;
pub use view::TreemapView;
