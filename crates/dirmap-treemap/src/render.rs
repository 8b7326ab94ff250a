/// Software rendering of a [`Treemap`] into an RGB pixel buffer.
use crate::color::Rgb;
use crate::cushion::Light;
use crate::layout::{Treemap, TreemapTile};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Packed 8-bit RGB image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Pixmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y as usize * self.width as usize + x as usize) * 3)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        let at = self.offset(x, y)?;
        Some(Rgb::new(self.data[at], self.data[at + 1], self.data[at + 2]))
    }

    /// Set one pixel; coordinates outside the image are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb) {
        if let Some(at) = self.offset(x, y) {
            self.data[at..at + 3].copy_from_slice(&[color.r, color.g, color.b]);
        }
    }

    /// Write as binary PPM (`P6`).
    pub fn write_ppm(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        out.write_all(&self.data)?;
        out.flush()?;
        info!("Wrote {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }
}

impl Treemap {
    /// Paint every leaf tile. Pixel (0, 0) is the top-left corner of the
    /// map's bounds.
    pub fn render(&self) -> Pixmap {
        let bounds = self.bounds();
        let mut pixmap = Pixmap::new(bounds.width.max(0) as u32, bounds.height.max(0) as u32);
        let light = Light::from_settings(self.settings());
        for tile in self.leaves() {
            paint_tile(&mut pixmap, tile, bounds.x, bounds.y, &light);
        }
        pixmap
    }
}

fn paint_tile(pixmap: &mut Pixmap, tile: &TreemapTile, origin_x: i32, origin_y: i32, light: &Light) {
    let rect = tile.rect;
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            let color = if tile.shaded {
                tile.color.scaled(tile.cushion.intensity(x, y, light) / 255.0)
            } else {
                tile.color
            };
            pixmap.set_pixel((x - origin_x) as u32, (y - origin_y) as u32, color);
        }
    }
}
