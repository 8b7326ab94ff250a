/// Integer pixel rectangles and proportional splitting.
use serde::Serialize;

/// Axis a rectangle is cut along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Cuts run vertically; slices sit side by side along x.
    Horizontal,
    /// Cuts run horizontally; slices are stacked along y.
    Vertical,
}

impl Orientation {
    /// Split the longer side first.
    pub fn for_rect(rect: Rect) -> Self {
        if rect.width >= rect.height {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One past the last column.
    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// One past the last row.
    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Longer side divided by shorter side; `f64::INFINITY` when empty.
    pub fn aspect_ratio(&self) -> f64 {
        if self.is_empty() {
            return f64::INFINITY;
        }
        let (w, h) = (self.width as f64, self.height as f64);
        w.max(h) / w.min(h)
    }

    /// Extent along `orientation`.
    pub fn length(&self, orientation: Orientation) -> i32 {
        match orientation {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }

    /// Cut off the first `len` pixels along `orientation`, returning the
    /// slice and the rest.
    pub fn take(&self, orientation: Orientation, len: i32) -> (Rect, Rect) {
        match orientation {
            Orientation::Horizontal => (
                Rect::new(self.x, self.y, len, self.height),
                Rect::new(self.x + len, self.y, self.width - len, self.height),
            ),
            Orientation::Vertical => (
                Rect::new(self.x, self.y, self.width, len),
                Rect::new(self.x, self.y + len, self.width, self.height - len),
            ),
        }
    }

    /// Slice the rectangle along `orientation` into parts proportional to
    /// `weights`. Offsets are rounded cumulatively so the parts always add
    /// up to the full extent; some parts may come out empty.
    pub fn split(&self, orientation: Orientation, weights: &[u64]) -> Vec<Rect> {
        let lengths = proportional_lengths(self.length(orientation), weights);
        let mut rest = *self;
        lengths
            .into_iter()
            .map(|len| {
                let (slice, remainder) = rest.take(orientation, len);
                rest = remainder;
                slice
            })
            .collect()
    }
}

/// Divide `extent` pixels in proportion to `weights`, rounding the running
/// offset rather than each length. The last entry absorbs the remainder.
pub fn proportional_lengths(extent: i32, weights: &[u64]) -> Vec<i32> {
    let extent = extent.max(0);
    let total: u128 = weights.iter().map(|&w| w as u128).sum();
    if total == 0 {
        let mut lengths = vec![0; weights.len()];
        if let Some(last) = lengths.last_mut() {
            *last = extent;
        }
        return lengths;
    }

    let mut lengths = Vec::with_capacity(weights.len());
    let mut cumulative: u128 = 0;
    let mut offset = 0;
    for &weight in weights {
        cumulative += weight as u128;
        let next = ((extent as u128 * cumulative + total / 2) / total) as i32;
        lengths.push(next - offset);
        offset = next;
    }
    lengths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_always_fill_the_extent() {
        for extent in [0, 1, 7, 100, 799] {
            for weights in [vec![1, 1, 1], vec![5, 0, 3], vec![1_000_000, 1], vec![2]] {
                let lengths = proportional_lengths(extent, &weights);
                assert_eq!(lengths.iter().sum::<i32>(), extent, "{extent} {weights:?}");
                assert!(lengths.iter().all(|&l| l >= 0));
            }
        }
    }

    #[test]
    fn zero_weights_get_no_space() {
        assert_eq!(proportional_lengths(90, &[1, 0, 2]), vec![30, 0, 60]);
    }

    #[test]
    fn split_stays_inside_and_is_contiguous() {
        let rect = Rect::new(10, 20, 101, 50);
        let parts = rect.split(Orientation::Horizontal, &[3, 1, 1]);
        assert_eq!(parts[0].x, 10);
        assert_eq!(parts[1].x, parts[0].right());
        assert_eq!(parts[2].right(), rect.right());
        assert!(parts.iter().all(|p| p.y == 20 && p.height == 50));

        let parts = rect.split(Orientation::Vertical, &[1, 1]);
        assert_eq!(parts[0].height + parts[1].height, 50);
        assert_eq!(parts[1].bottom(), rect.bottom());
    }

    #[test]
    fn hit_testing_and_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.contains(0, 0));
        assert!(a.contains(9, 9));
        assert!(!a.contains(10, 5));
        assert!(a.intersects(&Rect::new(9, 9, 5, 5)));
        assert!(!a.intersects(&Rect::new(10, 0, 5, 5)));
        assert!(!a.intersects(&Rect::new(2, 2, 0, 5)));
    }

    #[test]
    fn aspect_ratio_is_orientation_free() {
        assert_eq!(Rect::new(0, 0, 40, 10).aspect_ratio(), 4.0);
        assert_eq!(Rect::new(0, 0, 10, 40).aspect_ratio(), 4.0);
        assert!(Rect::new(0, 0, 0, 40).aspect_ratio().is_infinite());
    }
}
