//! Instrument response: Moffat point spread function and square pixel
//!
//! The Moffat profile
//!
//! ```text
//! I(r) = (β - 1) / (π r0²) · (1 + r² / r0²)^(-β)
//! ```
//!
//! integrates to one. Its enclosed flux has the closed form
//! `1 - (1 + r² / r0²)^(1 - β)`, which gives the truncation radius used when
//! sampling it as a convolution kernel.

use ndarray::Array2;

use crate::geometry::moffat_scale_radius;

/// Fraction of PSF flux allowed to fall outside the sampled kernel
pub const DEFAULT_KERNEL_LOSS: f64 = 1e-3;

/// Circular Moffat PSF, sizes in arcseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoffatPsf {
    fwhm: f64,
    beta: f64,
    r0: f64,
}

impl MoffatPsf {
    /// Moffat PSF with the given FWHM; `None` for `fwhm <= 0` or `beta <= 1`
    pub fn new(fwhm: f64, beta: f64) -> Option<Self> {
        if !(fwhm > 0.0) || !(beta > 1.0) {
            return None;
        }
        Some(Self {
            fwhm,
            beta,
            r0: moffat_scale_radius(fwhm, beta),
        })
    }

    pub fn fwhm(&self) -> f64 {
        self.fwhm
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Scale radius r0
    pub fn scale_radius(&self) -> f64 {
        self.r0
    }

    /// Normalized surface brightness at radius `r`
    pub fn intensity(&self, r: f64) -> f64 {
        let u = r / self.r0;
        (self.beta - 1.0) / (std::f64::consts::PI * self.r0 * self.r0)
            * (1.0 + u * u).powf(-self.beta)
    }

    /// Fraction of flux within radius `r`
    pub fn enclosed_flux(&self, r: f64) -> f64 {
        let u = r / self.r0;
        1.0 - (1.0 + u * u).powf(1.0 - self.beta)
    }

    /// Radius outside which only `loss` of the flux remains
    pub fn truncation_radius(&self, loss: f64) -> f64 {
        self.r0 * (loss.powf(1.0 / (1.0 - self.beta)) - 1.0).max(0.0).sqrt()
    }

    /// Sample the PSF as a square kernel normalized to unit sum.
    ///
    /// # Arguments
    /// * `spacing` - Sample spacing in arcseconds
    /// * `half_size` - Kernel half size in samples; the kernel is `2 * half_size + 1` wide
    pub fn kernel(&self, spacing: f64, half_size: usize) -> Array2<f64> {
        let size = 2 * half_size + 1;
        let center = half_size as f64;
        let mut kernel = Array2::from_shape_fn((size, size), |(row, col)| {
            let dx = (col as f64 - center) * spacing;
            let dy = (row as f64 - center) * spacing;
            self.intensity(dx.hypot(dy))
        });

        let total = kernel.sum();
        if total > 0.0 {
            kernel /= total;
        }
        kernel
    }
}

/// Square pixel response, integrating the incident light over one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelResponse {
    /// Pixel side length in arcseconds
    pub pixel_scale: f64,
}

impl PixelResponse {
    pub fn new(pixel_scale: f64) -> Self {
        Self { pixel_scale }
    }

    /// Side length of one of `oversample²` sub-pixels
    pub fn sub_pixel_scale(&self, oversample: usize) -> f64 {
        self.pixel_scale / oversample as f64
    }

    /// Sum `oversample x oversample` blocks of a sub-pixel image into pixels.
    ///
    /// Trailing sub-pixels that do not fill a whole block are ignored.
    pub fn bin(&self, sub_pixels: &Array2<f64>, oversample: usize) -> Array2<f64> {
        let (rows, cols) = sub_pixels.dim();
        let (out_rows, out_cols) = (rows / oversample, cols / oversample);
        Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
            sub_pixels
                .slice(ndarray::s![
                    r * oversample..(r + 1) * oversample,
                    c * oversample..(c + 1) * oversample
                ])
                .sum()
        })
    }
}
