//! Image-processing primitives operating on `ndarray` images.
//!
//! - **convolve**: direct and FFT-based 2D convolution
//! - **noise**: Poisson photon noise on top of a sky background

pub mod convolve;
pub mod noise;

pub use convolve::{convolve2d, fft_convolve_same, ConvolveMode, ConvolveOptions};
pub use noise::add_sky_poisson_noise;
