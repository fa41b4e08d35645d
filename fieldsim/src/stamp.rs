//! Stamp addressing: sky offsets to integer pixel rectangles
//!
//! Pixel coordinates follow the field convention: the bottom-left pixel is
//! (1, 1) and pixel `i` spans offsets `(i - 1, i]` measured in pixels from the
//! field's minimum corner, so its center sits at `i - 0.5`.
//!
//! Every stamp is `2 * half + 1` pixels on a side and centered on the pixel
//! containing the source. Sub-pixel position is carried separately as a shift
//! from that pixel's center, in arcseconds.

/// Sky rectangle in arcseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyRegion {
    pub ra_min: f64,
    pub ra_max: f64,
    pub dec_min: f64,
    pub dec_max: f64,
}

impl SkyRegion {
    /// Check a position against the region grown by `margin` on every side (inclusive)
    pub fn contains_with_margin(&self, ra: f64, dec: f64, margin: f64) -> bool {
        ra >= self.ra_min - margin
            && ra <= self.ra_max + margin
            && dec >= self.dec_min - margin
            && dec <= self.dec_max + margin
    }

    /// Offset of a sky position from the minimum corner, in pixels
    pub fn pixel_offset(&self, ra: f64, dec: f64, pixel_scale: f64) -> (f64, f64) {
        (
            (ra - self.ra_min) / pixel_scale,
            (dec - self.dec_min) / pixel_scale,
        )
    }
}

/// Inclusive integer pixel rectangle
///
/// Empty when `xmin > xmax` or `ymin > ymax`; intersections of disjoint
/// rectangles produce such empty bounds rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StampBounds {
    pub xmin: i64,
    pub xmax: i64,
    pub ymin: i64,
    pub ymax: i64,
}

impl StampBounds {
    /// Create bounds from inclusive corners
    pub fn new(xmin: i64, xmax: i64, ymin: i64, ymax: i64) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    /// Bounds of a `width` x `height` field, `(1, 1)` at the bottom left
    pub fn field(width: usize, height: usize) -> Self {
        Self::new(1, width as i64, 1, height as i64)
    }

    /// Odd-sized bounds of `2 * half + 1` pixels around a center pixel
    pub fn centered(center: (i64, i64), half: (i64, i64)) -> Self {
        let (x, y) = center;
        let (xhalf, yhalf) = (half.0.max(0), half.1.max(0));
        Self::new(x - xhalf, x + xhalf, y - yhalf, y + yhalf)
    }

    pub fn is_empty(&self) -> bool {
        self.xmin > self.xmax || self.ymin > self.ymax
    }

    /// Number of columns, zero when empty
    pub fn width(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.xmax - self.xmin + 1) as usize
        }
    }

    /// Number of rows, zero when empty
    pub fn height(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.ymax - self.ymin + 1) as usize
        }
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    /// Array shape `(rows, cols)` of an image covering these bounds
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Overlap of two rectangles, possibly empty
    pub fn intersect(&self, other: &Self) -> Self {
        Self::new(
            self.xmin.max(other.xmin),
            self.xmax.min(other.xmax),
            self.ymin.max(other.ymin),
            self.ymax.min(other.ymax),
        )
    }

    /// Check whether two rectangles share at least one pixel
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn contains_point(&self, x: i64, y: i64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Central pixel; exact for the odd-sized stamps this module produces
    pub fn center(&self) -> (i64, i64) {
        (
            (self.xmin + self.xmax).div_euclid(2),
            (self.ymin + self.ymax).div_euclid(2),
        )
    }

    /// Array index `(row, col)` of a pixel inside these bounds
    pub fn index_of(&self, x: i64, y: i64) -> Option<(usize, usize)> {
        if self.contains_point(x, y) {
            Some(((y - self.ymin) as usize, (x - self.xmin) as usize))
        } else {
            None
        }
    }
}

/// Where a source lands in the field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampPlacement {
    /// Stamp rectangle in field pixel coordinates
    pub bounds: StampBounds,
    /// Pixel containing the source center
    pub center_pixel: (i64, i64),
    /// Stamp half sizes in pixels
    pub half_size: (i64, i64),
    /// Source center minus the center pixel's center, in arcseconds
    pub shift: (f64, f64),
}

impl StampPlacement {
    /// Place a source with the given angular half extents (arcsec) on the pixel grid.
    ///
    /// # Arguments
    /// * `region` - Sky rectangle of the field
    /// * `ra`, `dec` - Source position in arcseconds
    /// * `half_extent` - Half width and half height of the source box in arcseconds
    /// * `pixel_scale` - Arcseconds per pixel
    pub fn locate(
        region: &SkyRegion,
        ra: f64,
        dec: f64,
        half_extent: (f64, f64),
        pixel_scale: f64,
    ) -> Self {
        let (xoffset, yoffset) = region.pixel_offset(ra, dec, pixel_scale);

        let center_pixel = (xoffset.ceil() as i64, yoffset.ceil() as i64);

        let half_size = (
            (half_extent.0 / pixel_scale).ceil().max(0.0) as i64,
            (half_extent.1 / pixel_scale).ceil().max(0.0) as i64,
        );

        let shift = (
            (xoffset - (center_pixel.0 as f64 - 0.5)) * pixel_scale,
            (yoffset - (center_pixel.1 as f64 - 0.5)) * pixel_scale,
        );

        Self {
            bounds: StampBounds::centered(center_pixel, half_size),
            center_pixel,
            half_size,
            shift,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn region() -> SkyRegion {
        SkyRegion {
            ra_min: 0.0,
            ra_max: 20.0,
            dec_min: -10.0,
            dec_max: 10.0,
        }
    }

    #[test]
    fn test_margin_check_inclusive() {
        let r = region();
        assert!(r.contains_with_margin(-5.0, 0.0, 5.0));
        assert!(!r.contains_with_margin(-5.1, 0.0, 5.0));
        assert!(r.contains_with_margin(10.0, 15.0, 5.0));
        assert!(!r.contains_with_margin(10.0, 15.01, 5.0));
    }

    #[test]
    fn test_center_pixel_and_shift() {
        // 3.3 pixels in x lands in pixel 4 (spanning 3..4), 0.3 px left of its center
        let placement = StampPlacement::locate(&region(), 0.66, -10.0 + 0.9, (0.0, 0.0), 0.2);
        assert_eq!(placement.center_pixel, (4, 5));
        assert_relative_eq!(placement.shift.0, (3.3 - 3.5) * 0.2, epsilon = 1e-12);
        assert_relative_eq!(placement.shift.1, (4.5 - 4.5) * 0.2, epsilon = 1e-12);
        assert_eq!(placement.bounds, StampBounds::new(4, 4, 5, 5));
    }

    #[test]
    fn test_stamps_always_odd() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let ra = rng.gen_range(-30.0..50.0);
            let dec = rng.gen_range(-40.0..40.0);
            let hw = rng.gen_range(0.0..5.0);
            let hh = rng.gen_range(0.0..5.0);
            let placement = StampPlacement::locate(&region(), ra, dec, (hw, hh), 0.2);

            let b = placement.bounds;
            assert_eq!(b.width() % 2, 1);
            assert_eq!(b.height() % 2, 1);
            assert!(b.width() >= 1 && b.height() >= 1);
            assert_eq!(b.center(), placement.center_pixel);

            // Shift never exceeds half a pixel
            assert!(placement.shift.0.abs() <= 0.1 + 1e-12);
            assert!(placement.shift.1.abs() <= 0.1 + 1e-12);
        }
    }

    #[test]
    fn test_half_size_rounds_up() {
        let placement = StampPlacement::locate(&region(), 5.0, 0.0, (0.41, 0.4), 0.2);
        assert_eq!(placement.half_size, (3, 2));
        assert_eq!(placement.bounds.width(), 7);
        assert_eq!(placement.bounds.height(), 5);
    }

    #[test]
    fn test_intersection() {
        let field = StampBounds::field(10, 8);
        assert_eq!(field.shape(), (8, 10));

        let stamp = StampBounds::new(-2, 2, 6, 12);
        let overlap = stamp.intersect(&field);
        assert_eq!(overlap, StampBounds::new(1, 2, 6, 8));
        assert_eq!(overlap.area(), 6);
        assert!(stamp.overlaps(&field));

        let outside = StampBounds::new(11, 15, 1, 3);
        assert!(outside.intersect(&field).is_empty());
        assert_eq!(outside.intersect(&field).area(), 0);
        assert!(!outside.overlaps(&field));
    }

    #[test]
    fn test_index_of() {
        let b = StampBounds::new(-1, 3, 10, 12);
        assert_eq!(b.index_of(-1, 10), Some((0, 0)));
        assert_eq!(b.index_of(3, 12), Some((2, 4)));
        assert_eq!(b.index_of(4, 12), None);
    }

    #[test]
    fn test_negative_center_pixel() {
        let b = StampBounds::centered((-3, -7), (2, 1));
        assert_eq!(b, StampBounds::new(-5, -1, -8, -6));
        assert_eq!(b.center(), (-3, -7));
    }
}
