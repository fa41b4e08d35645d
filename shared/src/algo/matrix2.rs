//! Inversion of the 2x2 shear transforms that map sky offsets back into a
//! source's profile frame.
//!
//! Composite shears are area preserving, so a healthy transform has a
//! determinant near one. A vanishing or non-finite determinant means the
//! inputs were degenerate and is reported instead of producing infinities.

use nalgebra::Matrix2;
use thiserror::Error;

/// A 2x2 transform with no usable inverse
#[derive(Error, Debug, Clone, PartialEq)]
#[error("singular matrix: determinant={determinant:.6e}")]
pub struct SingularMatrixError {
    pub determinant: f64,
}

const DETERMINANT_EPSILON: f64 = 1e-12;

/// Inverse through the adjugate: `[[d, -b], [-c, a]] / det`.
pub fn invert_matrix(matrix: &Matrix2<f64>) -> Result<Matrix2<f64>, SingularMatrixError> {
    let (a, b) = (matrix[(0, 0)], matrix[(0, 1)]);
    let (c, d) = (matrix[(1, 0)], matrix[(1, 1)]);
    let determinant = a * d - b * c;

    if !determinant.is_finite() || determinant.abs() < DETERMINANT_EPSILON {
        return Err(SingularMatrixError { determinant });
    }

    Ok(Matrix2::new(d, -b, -c, a) / determinant)
}
