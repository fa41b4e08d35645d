//! Analytic source profile and its sky-plane transform
//!
//! A source is a circular exponential disk, sheared into its intrinsic
//! ellipse, sheared again by the constant lensing shear, then shifted to its
//! sub-pixel position. Each shear is the area-preserving map
//!
//! ```text
//! S(g) = 1 / sqrt(1 - |g|²) · [[1 + g1, g2], [g2, 1 - g1]]
//! ```
//!
//! so the composite transform conserves flux.

use nalgebra::{Matrix2, Vector2};
use shared::algo::invert_matrix;

use super::{RenderError, RenderParameters};
use crate::geometry::{exponential_scale_radius, ShearEllipse};

/// Circular exponential disk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDisk {
    pub flux: f64,
    pub scale_radius: f64,
}

impl ExponentialDisk {
    pub fn from_half_light_radius(flux: f64, half_light_radius: f64) -> Self {
        Self {
            flux,
            scale_radius: exponential_scale_radius(half_light_radius),
        }
    }

    /// Surface brightness at radius `r` (flux per square arcsecond)
    pub fn intensity(&self, r: f64) -> f64 {
        let rs = self.scale_radius;
        self.flux / (2.0 * std::f64::consts::PI * rs * rs) * (-r / rs).exp()
    }
}

/// Area-preserving shear matrix for reduced shear `(g1, g2)`
pub fn shear_matrix(g1: f64, g2: f64) -> Result<Matrix2<f64>, RenderError> {
    let g_sq = g1 * g1 + g2 * g2;
    if !(g_sq < 1.0) {
        return Err(RenderError::InvalidShear { g1, g2 });
    }
    let norm = 1.0 / (1.0 - g_sq).sqrt();
    Ok(Matrix2::new(1.0 + g1, g2, g2, 1.0 - g1) * norm)
}

/// Affine map from the circular profile frame to sky offsets from the stamp center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTransform {
    forward: Matrix2<f64>,
    inverse: Matrix2<f64>,
    center: Vector2<f64>,
}

impl SourceTransform {
    /// Build the transform for one set of render parameters
    pub fn new(params: &RenderParameters) -> Result<Self, RenderError> {
        if !(params.axis_ratio > 0.0) {
            return Err(RenderError::InvalidAxisRatio(params.axis_ratio));
        }
        let intrinsic = ShearEllipse::from_axis_ratio(params.axis_ratio, params.position_angle);
        let forward = shear_matrix(params.g1, params.g2)? * shear_matrix(intrinsic.gp, intrinsic.gx)?;
        let inverse = invert_matrix(&forward)?;

        Ok(Self {
            forward,
            inverse,
            center: Vector2::new(params.xc, params.yc),
        })
    }

    pub fn forward(&self) -> &Matrix2<f64> {
        &self.forward
    }

    /// Map a sky offset (arcsec from the stamp's central pixel center) into the profile frame
    pub fn to_profile_frame(&self, x: f64, y: f64) -> Vector2<f64> {
        self.inverse * (Vector2::new(x, y) - self.center)
    }
}

/// A fully placed source ready to be sampled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedSource {
    pub disk: ExponentialDisk,
    pub transform: SourceTransform,
}

impl TransformedSource {
    pub fn new(params: &RenderParameters) -> Result<Self, RenderError> {
        Ok(Self {
            disk: ExponentialDisk::from_half_light_radius(params.flux, params.half_light_radius),
            transform: SourceTransform::new(params)?,
        })
    }

    /// Surface brightness at a sky offset from the stamp center
    pub fn surface_brightness(&self, x: f64, y: f64) -> f64 {
        let p = self.transform.to_profile_frame(x, y);
        self.disk.intensity(p.norm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn params(q: f64, beta: f64, g1: f64, g2: f64) -> RenderParameters {
        RenderParameters {
            flux: 1000.0,
            xc: 0.0,
            yc: 0.0,
            half_light_radius: 0.5,
            axis_ratio: q,
            position_angle: beta,
            g1,
            g2,
        }
    }

    #[test]
    fn test_shear_preserves_area() {
        for (g1, g2) in [(0.0, 0.0), (0.3, -0.2), (-0.6, 0.1), (0.0, 0.9)] {
            let m = shear_matrix(g1, g2).unwrap();
            assert_relative_eq!(m.determinant(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_invalid_shear() {
        assert!(matches!(
            shear_matrix(0.8, 0.6),
            Err(RenderError::InvalidShear { .. })
        ));
        assert!(matches!(
            SourceTransform::new(&params(1.0, 0.0, 1.2, 0.0)),
            Err(RenderError::InvalidShear { .. })
        ));
        assert!(matches!(
            SourceTransform::new(&params(0.0, 0.0, 0.0, 0.0)),
            Err(RenderError::InvalidAxisRatio(_))
        ));
    }

    #[test]
    fn test_axis_ratio_recovered() {
        // A unit circle maps to an ellipse with the requested axis ratio
        let q = 0.4;
        let t = SourceTransform::new(&params(q, 0.3, 0.0, 0.0)).unwrap();
        let svd = t.forward().svd(false, false);
        let s = svd.singular_values;
        let (major, minor) = (s[0].max(s[1]), s[0].min(s[1]));
        assert_relative_eq!(minor / major, q, epsilon = 1e-12);
    }

    #[test]
    fn test_major_axis_follows_position_angle() {
        let beta = PI / 6.0;
        let source = TransformedSource::new(&params(0.5, beta, 0.0, 0.0)).unwrap();
        let r = 0.4;
        let along = source.surface_brightness(r * beta.cos(), r * beta.sin());
        let across = source.surface_brightness(-r * beta.sin(), r * beta.cos());
        assert!(along > across);
    }

    #[test]
    fn test_center_shift() {
        let mut p = params(1.0, 0.0, 0.0, 0.0);
        p.xc = 0.07;
        p.yc = -0.03;
        let source = TransformedSource::new(&p).unwrap();
        let peak = source.surface_brightness(0.07, -0.03);
        assert_relative_eq!(peak, source.disk.intensity(0.0), epsilon = 1e-12);
        assert!(source.surface_brightness(0.0, 0.0) < peak);
    }

    #[test]
    fn test_exponential_half_light() {
        // Enclosed flux of an exponential: 1 - (1 + x) e^-x at x = r / rs
        let disk = ExponentialDisk::from_half_light_radius(1.0, 0.5);
        let x = 0.5 / disk.scale_radius;
        assert_relative_eq!(1.0 - (1.0 + x) * (-x).exp(), 0.5, epsilon = 1e-5);
    }
}
