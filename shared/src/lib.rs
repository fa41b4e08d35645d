//! Shared image-processing primitives for the field simulator.
//!
//! Generic building blocks with no knowledge of catalogs or stamps:
//! seeded parallel array processing, small-matrix helpers, 2D convolution
//! and photon noise injection.

pub mod algo;
pub mod image_proc;
