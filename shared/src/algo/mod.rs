//! Numerical helpers used by the image-processing and rendering code.

pub mod matrix2;
pub mod parallel;

pub use matrix2::{invert_matrix, SingularMatrixError};
pub use parallel::process_rows_in_parallel_chunks;
