//! Photon noise injection for simulated sky images.
//!
//! Models a sky-limited exposure: every pixel collects its own signal plus a
//! uniform sky background, the total is Poisson sampled, and the background
//! is subtracted again. The result has the noise of the full exposure but the
//! mean of the signal alone.

use crate::algo::process_rows_in_parallel_chunks;
use ndarray::Array2;
use rand_distr::{Distribution, Normal, Poisson};

/// Means at or above this are sampled with the Gaussian approximation
const GAUSSIAN_APPROX_MEAN: f64 = 20.0;

/// Add sky-background-limited Poisson noise to an image.
///
/// Each pixel value `v` is replaced by `Poisson(v + sky_level) - sky_level`.
/// Expected counts below zero are clamped to zero before sampling.
/// Sampling is deterministic for a given `seed` and image shape.
///
/// # Arguments
/// * `image` - Noiseless image in counts
/// * `sky_level` - Sky background per pixel in the same units
/// * `seed` - Base RNG seed
///
/// # Returns
/// A new noisy image with the same dimensions
pub fn add_sky_poisson_noise(image: &Array2<f64>, sky_level: f64, seed: u64) -> Array2<f64> {
    let mut noisy = image.clone();
    process_rows_in_parallel_chunks(&mut noisy, seed, None, |band, rng| {
        band.iter_mut().for_each(|pixel| {
            let expected = (*pixel + sky_level).max(0.0);
            let sampled = if expected <= 0.0 {
                0.0
            } else if expected < GAUSSIAN_APPROX_MEAN {
                match Poisson::new(expected) {
                    Ok(poisson) => poisson.sample(rng),
                    Err(_) => expected,
                }
            } else {
                match Normal::new(expected, expected.sqrt()) {
                    Ok(normal) => normal.sample(rng).round().max(0.0),
                    Err(_) => expected,
                }
            };
            *pixel = sampled - sky_level;
        });
    });
    noisy
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_deterministic_for_seed() {
        let image = Array2::from_elem((40, 30), 5.0);
        let a = add_sky_poisson_noise(&image, 100.0, 123);
        let b = add_sky_poisson_noise(&image, 100.0, 123);
        assert_eq!(a, b);

        let c = add_sky_poisson_noise(&image, 100.0, 124);
        assert_ne!(a, c);
    }

    #[test]
    fn test_mean_preserved_variance_from_sky() {
        let signal = 50.0;
        let sky = 400.0;
        let image = Array2::from_elem((200, 200), signal);

        let noisy = add_sky_poisson_noise(&image, sky, 7);
        let mean = noisy.mean().unwrap();
        let variance = noisy.mapv(|v| (v - mean).powi(2)).mean().unwrap();

        assert_relative_eq!(mean, signal, epsilon = 1.0);
        assert_relative_eq!(variance, signal + sky, max_relative = 0.05);
    }

    #[test]
    fn test_small_means_are_integer_counts() {
        let image = Array2::from_elem((20, 20), 0.5);
        let noisy = add_sky_poisson_noise(&image, 1.0, 3);
        for v in noisy.iter() {
            let counts = v + 1.0;
            assert!(counts >= 0.0);
            assert_relative_eq!(counts, counts.round(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_sky_zero_image_stays_zero() {
        let image = Array2::zeros((8, 8));
        let noisy = add_sky_poisson_noise(&image, 0.0, 1);
        assert!(noisy.iter().all(|&v| v == 0.0));
    }
}
