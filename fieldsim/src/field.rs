//! Field image accumulation
//!
//! The field is a fixed `width x height` rectangle addressed in field pixel
//! coordinates with `(1, 1)` at the bottom left. Array row 0 holds `y = 1`.

use ndarray::{s, Array2, ArrayView2};
use shared::image_proc::add_sky_poisson_noise;

use crate::stamp::StampBounds;

/// Accumulator for rendered stamps
#[derive(Debug, Clone, PartialEq)]
pub struct FieldImage {
    bounds: StampBounds,
    data: Array2<f64>,
}

impl FieldImage {
    /// Create an empty (all zero) field
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            bounds: StampBounds::field(width, height),
            data: Array2::zeros((height, width)),
        }
    }

    pub fn bounds(&self) -> StampBounds {
        self.bounds
    }

    pub fn width(&self) -> usize {
        self.bounds.width()
    }

    pub fn height(&self) -> usize {
        self.bounds.height()
    }

    /// Pixel values, shape `(height, width)`
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Value at field pixel `(x, y)`, `None` outside the field
    pub fn get(&self, x: i64, y: i64) -> Option<f64> {
        self.bounds
            .index_of(x, y)
            .map(|(row, col)| self.data[[row, col]])
    }

    /// Add the part of `stamp` that overlaps the field.
    ///
    /// `stamp` must have the shape of `stamp_bounds`. Pixels outside the
    /// field are dropped. Returns the overlap that was written, empty when the
    /// stamp misses the field.
    pub fn add_stamp(&mut self, stamp: &ArrayView2<f64>, stamp_bounds: &StampBounds) -> StampBounds {
        debug_assert_eq!(stamp.dim(), stamp_bounds.shape());

        let overlap = stamp_bounds.intersect(&self.bounds);
        if overlap.is_empty() {
            return overlap;
        }

        let src = stamp.slice(s![
            (overlap.ymin - stamp_bounds.ymin) as usize..=(overlap.ymax - stamp_bounds.ymin) as usize,
            (overlap.xmin - stamp_bounds.xmin) as usize..=(overlap.xmax - stamp_bounds.xmin) as usize
        ]);
        let mut dst = self.data.slice_mut(s![
            (overlap.ymin - self.bounds.ymin) as usize..=(overlap.ymax - self.bounds.ymin) as usize,
            (overlap.xmin - self.bounds.xmin) as usize..=(overlap.xmax - self.bounds.xmin) as usize
        ]);
        dst += &src;

        overlap
    }

    /// Copy of the field with sky-limited photon noise applied.
    ///
    /// `sky_level` is the per-pixel sky of the whole stack.
    pub fn with_sky_noise(&self, sky_level: f64, seed: u64) -> FieldImage {
        FieldImage {
            bounds: self.bounds,
            data: add_sky_poisson_noise(&self.data, sky_level, seed),
        }
    }

    /// Total flux in the field
    pub fn sum(&self) -> f64 {
        self.data.sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_stamp_inside_field() {
        let mut field = FieldImage::new(10, 8);
        let stamp = Array2::from_shape_fn((3, 5), |(r, c)| (r * 5 + c) as f64);
        let bounds = StampBounds::new(2, 6, 3, 5);

        let overlap = field.add_stamp(&stamp.view(), &bounds);
        assert_eq!(overlap, bounds);
        assert_eq!(field.get(2, 3), Some(0.0));
        assert_eq!(field.get(6, 3), Some(4.0));
        assert_eq!(field.get(2, 5), Some(10.0));
        assert_eq!(field.get(6, 5), Some(14.0));
        assert_relative_eq!(field.sum(), stamp.sum());
    }

    #[test]
    fn test_stamp_clipped_at_corner() {
        let mut field = FieldImage::new(4, 4);
        let stamp = Array2::from_elem((3, 3), 1.0);
        // Centered on (1, 1): only the 2x2 upper-right quarter lands
        let bounds = StampBounds::centered((1, 1), (1, 1));

        let overlap = field.add_stamp(&stamp.view(), &bounds);
        assert_eq!(overlap, StampBounds::new(1, 2, 1, 2));
        assert_relative_eq!(field.sum(), 4.0);
        assert_eq!(field.get(0, 0), None);
        assert_eq!(field.get(3, 3), Some(0.0));
    }

    #[test]
    fn test_stamp_outside_is_noop() {
        let mut field = FieldImage::new(4, 4);
        let stamp = Array2::from_elem((3, 3), 1.0);
        let overlap = field.add_stamp(&stamp.view(), &StampBounds::new(5, 7, 1, 3));
        assert!(overlap.is_empty());
        assert_eq!(field.sum(), 0.0);
    }

    #[test]
    fn test_overlapping_stamps_sum() {
        let mut field = FieldImage::new(10, 10);
        let a = Array2::from_elem((3, 3), 1.5);
        let b = Array2::from_elem((5, 5), 2.25);
        field.add_stamp(&a.view(), &StampBounds::centered((4, 4), (1, 1)));
        field.add_stamp(&b.view(), &StampBounds::centered((5, 5), (2, 2)));

        assert_relative_eq!(field.get(4, 4).unwrap(), 3.75);
        assert_relative_eq!(field.get(7, 7).unwrap(), 2.25);
        assert_relative_eq!(field.get(3, 3).unwrap(), 3.75);
        assert_relative_eq!(field.get(2, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_order_independent() {
        let mut rng = StdRng::seed_from_u64(5);
        let stamps: Vec<(Array2<f64>, StampBounds)> = (0..40)
            .map(|_| {
                let half = (rng.gen_range(0..4), rng.gen_range(0..4));
                let center = (rng.gen_range(-3..20), rng.gen_range(-3..20));
                let bounds = StampBounds::centered(center, half);
                let stamp = Array2::from_shape_fn(bounds.shape(), |_| rng.gen_range(0.0..10.0));
                (stamp, bounds)
            })
            .collect();

        let mut forward = FieldImage::new(16, 16);
        for (stamp, bounds) in &stamps {
            forward.add_stamp(&stamp.view(), bounds);
        }

        let mut order: Vec<usize> = (0..stamps.len()).collect();
        order.shuffle(&mut rng);
        let mut shuffled = FieldImage::new(16, 16);
        for i in order {
            shuffled.add_stamp(&stamps[i].0.view(), &stamps[i].1);
        }

        for (a, b) in forward.data().iter().zip(shuffled.data().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_noise_keeps_mean() {
        let mut field = FieldImage::new(64, 64);
        let stamp = Array2::from_elem((64, 64), 50.0);
        field.add_stamp(&stamp.view(), &field.bounds());

        let noisy = field.with_sky_noise(1000.0, 123);
        assert_eq!(noisy.bounds(), field.bounds());
        let mean = noisy.sum() / (64.0 * 64.0);
        assert!((mean - 50.0).abs() < 2.0, "mean {mean}");

        // Deterministic per seed, independent of the source field
        assert_eq!(noisy, field.with_sky_noise(1000.0, 123));
        assert_ne!(noisy, field.with_sky_noise(1000.0, 124));
    }
}
