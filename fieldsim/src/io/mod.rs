//! File output
//!
//! FITS writing for field images and stamp cubes.

pub mod fits;

pub use fits::{output_path, read_hdu_data, read_key_i64, FitsArchive, FitsMetadata};
