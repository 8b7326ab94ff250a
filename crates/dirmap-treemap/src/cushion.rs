/// Cushion shading (van Wijk and van de Wetering).
///
/// Every tile carries a height field `z = s2x·x² + s1x·x + s2y·y² + s1y·y`.
/// A child copies its parent's surface and adds a parabolic ridge over its
/// own extent, so the accumulated bumps outline the nesting. Ridges get
/// lower with depth by the height scale factor.
use crate::rect::{Orientation, Rect};
use crate::settings::TreemapSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CushionSurface {
    /// Linear coefficients, x then y.
    s1: [f64; 2],
    /// Quadratic coefficients, x then y.
    s2: [f64; 2],
    height: f64,
}

impl CushionSurface {
    pub fn new(height: f64) -> Self {
        Self {
            s1: [0.0; 2],
            s2: [0.0; 2],
            height,
        }
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Add a ridge of the current height over `[x1, x2]` along `orientation`.
    pub fn add_ridge(&mut self, orientation: Orientation, x1: f64, x2: f64) {
        let width = x2 - x1;
        if width <= 0.0 {
            return;
        }
        let axis = axis(orientation);
        let h4 = 4.0 * self.height;
        self.s1[axis] += h4 * (x2 + x1) / width;
        self.s2[axis] -= h4 / width;
    }

    /// Ridges over both extents of `rect`.
    pub fn add_ridges(&mut self, rect: Rect) {
        self.add_ridge(Orientation::Horizontal, rect.x as f64, rect.right() as f64);
        self.add_ridge(Orientation::Vertical, rect.y as f64, rect.bottom() as f64);
    }

    /// The surface a child tile starts from: same shape, lower ridges.
    pub fn child(&self, decay: f64) -> Self {
        Self {
            height: self.height * decay,
            ..*self
        }
    }

    /// Surface normal `(nx, ny)` at a pixel centre; the z component is 1.
    pub fn normal(&self, x: i32, y: i32) -> (f64, f64) {
        let px = x as f64 + 0.5;
        let py = y as f64 + 0.5;
        (
            -(2.0 * self.s2[0] * px + self.s1[0]),
            -(2.0 * self.s2[1] * py + self.s1[1]),
        )
    }

    /// Brightness of a pixel, from `light.ambient` up to 255.
    pub fn intensity(&self, x: i32, y: i32, light: &Light) -> f64 {
        let (nx, ny) = self.normal(x, y);
        let cos = (nx * light.x + ny * light.y + light.z) / (nx * nx + ny * ny + 1.0).sqrt();
        light.ambient + (light.diffuse * cos).max(0.0)
    }
}

fn axis(orientation: Orientation) -> usize {
    match orientation {
        Orientation::Horizontal => 0,
        Orientation::Vertical => 1,
    }
}

/// Directional light with an ambient floor. The direction is normalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub ambient: f64,
    pub diffuse: f64,
}

impl Light {
    pub fn new(x: f64, y: f64, z: f64, ambient: u8) -> Self {
        let len = (x * x + y * y + z * z).sqrt();
        let (x, y, z) = if len > 0.0 {
            (x / len, y / len, z / len)
        } else {
            (0.0, 0.0, 1.0)
        };
        let ambient = ambient as f64;
        Self {
            x,
            y,
            z,
            ambient,
            diffuse: 255.0 - ambient,
        }
    }

    pub fn from_settings(settings: &TreemapSettings) -> Self {
        Self::new(
            settings.light_x,
            settings.light_y,
            settings.light_z,
            settings.ambient_light,
        )
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::from_settings(&TreemapSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ridge_coefficients_follow_the_interval() {
        let mut surface = CushionSurface::new(0.5);
        surface.add_ridge(Orientation::Horizontal, 10.0, 30.0);
        assert!((surface.s1[0] - 4.0 * 0.5 * 40.0 / 20.0).abs() < 1e-12);
        assert!((surface.s2[0] + 4.0 * 0.5 / 20.0).abs() < 1e-12);
        assert_eq!(surface.s1[1], 0.0);
    }

    #[test]
    fn ridge_peaks_in_the_middle() {
        let mut surface = CushionSurface::new(1.0);
        surface.add_ridges(Rect::new(0, 0, 100, 100));
        // The centre pixels face almost straight up; the edges tilt away.
        let (nx, ny) = surface.normal(49, 49);
        assert!(nx.abs() < 0.05 && ny.abs() < 0.05);
        let (edge_x, _) = surface.normal(0, 50);
        assert!(edge_x < -1.0);
        let (far_x, _) = surface.normal(99, 50);
        assert!(far_x > 1.0);
    }

    #[test]
    fn intensity_stays_in_range_and_is_lit_towards_the_light() {
        let light = Light::default();
        let mut surface = CushionSurface::new(1.0);
        surface.add_ridges(Rect::new(0, 0, 64, 64));
        for y in 0..64 {
            for x in 0..64 {
                let i = surface.intensity(x, y, &light);
                assert!((40.0..=255.0 + 1e-9).contains(&i), "{i} at {x},{y}");
            }
        }
        // The light comes from +x/+y, so the slopes facing it are brighter.
        assert!(surface.intensity(60, 60, &light) > surface.intensity(3, 3, &light));
    }

    #[test]
    fn flat_surface_uses_the_light_z_component() {
        let light = Light::new(0.0, 0.0, 2.0, 40);
        assert_eq!(CushionSurface::new(1.0).intensity(5, 5, &light), 255.0);
    }

    #[test]
    fn children_are_lower() {
        let child = CushionSurface::new(1.0).child(0.9);
        assert!((child.height() - 0.9).abs() < 1e-12);
    }
}
